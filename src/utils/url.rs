//! Endpoint URL assembly.

/// Strip trailing slashes so endpoints can be appended without doubling them.
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Join a provider base URL and an endpoint path.
///
/// ```
/// use parley::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:11434/v1/", "/models"),
///     "http://localhost:11434/v1/models"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        normalize_base_url(base_url),
        endpoint.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_removed() {
        assert_eq!(normalize_base_url("https://api.openai.com/v1"), "https://api.openai.com/v1");
        assert_eq!(normalize_base_url("https://api.openai.com/v1///"), "https://api.openai.com/v1");
        assert_eq!(normalize_base_url(" https://x.test/ "), "https://x.test");
        assert_eq!(normalize_base_url("///"), "");
    }

    #[test]
    fn endpoints_join_with_a_single_slash() {
        for (base, endpoint) in [
            ("https://api.groq.com/openai/v1", "chat/completions"),
            ("https://api.groq.com/openai/v1/", "chat/completions"),
            ("https://api.groq.com/openai/v1", "/chat/completions"),
            ("https://api.groq.com/openai/v1//", "//chat/completions"),
        ] {
            assert_eq!(
                construct_api_url(base, endpoint),
                "https://api.groq.com/openai/v1/chat/completions"
            );
        }
    }
}
