//! Shared utilities for provider adapters: error conversion, provider
//! detection from a model string, and API key resolution from environment.

use forge_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Truncate `s` to at most `max_chars` characters (not bytes), for embedding
/// untrusted response bodies in error messages.
pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &s[..byte_idx]),
        None => s.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    Google,
    DeepSeek,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Google => "google",
            ProviderKind::DeepSeek => "deepseek",
        }
    }

    /// The environment variable(s) holding this provider's API key, in
    /// lookup order (google has a legacy fallback name).
    pub fn env_vars(self) -> &'static [&'static str] {
        match self {
            ProviderKind::Anthropic => &["ANTHROPIC_API_KEY"],
            ProviderKind::OpenAi => &["OPENAI_API_KEY"],
            ProviderKind::Google => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
            ProviderKind::DeepSeek => &["DEEPSEEK_API_KEY"],
        }
    }
}

/// Detect the provider from a model string prefix. Total: every input maps
/// to exactly one provider, defaulting to anthropic when nothing matches.
pub fn detect_provider(model: &str) -> ProviderKind {
    if model.starts_with("claude-") {
        ProviderKind::Anthropic
    } else if model.starts_with("gemini-") {
        ProviderKind::Google
    } else if model.starts_with("deepseek-") {
        ProviderKind::DeepSeek
    } else if model.starts_with("gpt-") || model.starts_with("o1") || model.starts_with("o3") || model.starts_with("o4") {
        ProviderKind::OpenAi
    } else {
        ProviderKind::Anthropic
    }
}

/// Resolve the API key for a provider from its environment variable(s).
pub fn resolve_api_key(kind: ProviderKind) -> Result<String> {
    for var in kind.env_vars() {
        if let Ok(val) = std::env::var(var) {
            if !val.is_empty() {
                return Ok(val);
            }
        }
    }
    Err(Error::Auth(format!(
        "no API key set for provider '{}': expected one of {:?}",
        kind.as_str(),
        kind.env_vars()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_provider_is_total() {
        assert_eq!(detect_provider("claude-sonnet-4-6"), ProviderKind::Anthropic);
        assert_eq!(detect_provider("gemini-1.5-pro"), ProviderKind::Google);
        assert_eq!(detect_provider("deepseek-chat"), ProviderKind::DeepSeek);
        assert_eq!(detect_provider("gpt-4o"), ProviderKind::OpenAi);
        assert_eq!(detect_provider("o1-preview"), ProviderKind::OpenAi);
        assert_eq!(detect_provider("o3-mini"), ProviderKind::OpenAi);
        assert_eq!(detect_provider("o4-mini"), ProviderKind::OpenAi);
        assert_eq!(detect_provider("some-unknown-model"), ProviderKind::Anthropic);
    }

    #[test]
    fn resolve_api_key_missing_reports_expected_vars() {
        std::env::remove_var("ANTHROPIC_API_KEY");
        let err = resolve_api_key(ProviderKind::Anthropic).unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn truncate_short_string_unchanged() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn truncate_long_string_adds_ellipsis() {
        assert_eq!(truncate("hello world", 5), "hello...");
    }

    #[test]
    fn resolve_api_key_google_falls_back_to_gemini() {
        std::env::remove_var("GOOGLE_API_KEY");
        std::env::set_var("GEMINI_API_KEY", "gemini-secret");
        let key = resolve_api_key(ProviderKind::Google).unwrap();
        assert_eq!(key, "gemini-secret");
        std::env::remove_var("GEMINI_API_KEY");
    }
}
