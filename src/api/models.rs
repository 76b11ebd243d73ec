use crate::api::{ModelInfo, ModelsResponse};
use crate::core::builtin_providers::Provider;
use crate::utils::auth::add_auth_headers;
use crate::utils::url::construct_api_url;
use std::cmp::Ordering;

/// Query `GET {base}/models` for providers that support listing.
pub async fn fetch_models(
    client: &reqwest::Client,
    provider: &Provider,
    api_key: Option<&str>,
) -> Result<ModelsResponse, Box<dyn std::error::Error>> {
    if !provider.supports_model_list {
        return Err(format!("{} does not support listing models", provider.display_name).into());
    }
    let request = client
        .get(construct_api_url(&provider.base_url, "models"))
        .header("Content-Type", "application/json");
    let response = add_auth_headers(request, provider, api_key).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(format!("API request failed with status {status}: {error_text}").into());
    }

    Ok(response.json::<ModelsResponse>().await?)
}

/// Newest first. OpenAI-style `created` timestamps rank ahead of
/// Anthropic-style `created_at` strings; undated models sort by id, descending.
pub fn sort_models(models: &mut [ModelInfo]) {
    models.sort_by(|a, b| match (a.created, b.created) {
        (Some(a_created), Some(b_created)) => b_created.cmp(&a_created),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => match (&a.created_at, &b.created_at) {
            (Some(a_at), Some(b_at)) => b_at.cmp(a_at),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => b.id.cmp(&a.id),
        },
    });
}
