//! Provider authentication and transport headers.

use crate::core::builtin_providers::{AuthMode, Provider};

/// Attach the provider's auth header (when a key is present) and its extra
/// catalog headers.
pub fn add_auth_headers(
    mut request: reqwest::RequestBuilder,
    provider: &Provider,
    api_key: Option<&str>,
) -> reqwest::RequestBuilder {
    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        request = match provider.auth_mode {
            AuthMode::Anthropic => request.header("x-api-key", key),
            AuthMode::Bearer => request.header("Authorization", format!("Bearer {key}")),
        };
    }
    for (name, value) in &provider.headers {
        request = request.header(name.as_str(), value.as_str());
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builtin_providers;

    fn build(provider: &Provider, key: Option<&str>) -> reqwest::Request {
        let client = reqwest::Client::new();
        add_auth_headers(client.get("https://example.com"), provider, key)
            .build()
            .unwrap()
    }

    #[test]
    fn bearer_providers_use_authorization() {
        let request = build(builtin_providers::get("openai").unwrap(), Some("sk-1"));
        assert_eq!(request.headers()["authorization"], "Bearer sk-1");
        assert!(request.headers().get("x-api-key").is_none());
    }

    #[test]
    fn anthropic_uses_api_key_header_and_version() {
        let request = build(builtin_providers::get("anthropic").unwrap(), Some("ak"));
        assert_eq!(request.headers()["x-api-key"], "ak");
        assert_eq!(request.headers()["anthropic-version"], "2023-06-01");
        assert!(request.headers().get("authorization").is_none());
    }

    #[test]
    fn missing_key_sends_no_auth_header() {
        let request = build(builtin_providers::get("ollama").unwrap(), None);
        assert!(request.headers().get("authorization").is_none());
    }
}
