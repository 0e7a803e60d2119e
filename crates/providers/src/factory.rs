//! Construct the right [`LlmProvider`] for a model string.

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;
use crate::util::{detect_provider, resolve_api_key, ProviderKind};
use forge_domain::error::Result;

/// Build a provider adapter for `model`, resolving its API key from the
/// environment. `model` is used as the adapter's default model as well.
pub fn provider_for_model(model: &str) -> Result<Box<dyn LlmProvider>> {
    let kind = detect_provider(model);
    let api_key = resolve_api_key(kind)?;

    let provider: Box<dyn LlmProvider> = match kind {
        ProviderKind::Anthropic => Box::new(AnthropicProvider::new(api_key, model.to_string())?),
        ProviderKind::OpenAi | ProviderKind::Google | ProviderKind::DeepSeek => {
            Box::new(OpenAiCompatProvider::new(kind, api_key, Some(model.to_string()))?)
        }
    };

    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_model_without_api_key_fails_with_anthropic_env_var() {
        std::env::remove_var("ANTHROPIC_API_KEY");
        let err = provider_for_model("claude-sonnet-4-6").unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }
}
