//! Text-generation provider construction.

pub mod openai_compat;

use secrecy::SecretString;

use memora_core::llm::box_provider::BoxLlmProvider;
use memora_types::config::LlmConfig;
use memora_types::llm::LlmError;

use self::openai_compat::{OpenAiCompatibleProvider, default_base_url};

/// Build a [`BoxLlmProvider`] from configuration and a resolved API key.
///
/// `config.base_url` wins; otherwise the provider name picks a well-known
/// endpoint, and unknown names without a base URL are rejected.
pub fn create_provider(config: &LlmConfig, api_key: Option<&str>) -> Result<BoxLlmProvider, LlmError> {
    let key = api_key
        .filter(|k| !k.is_empty())
        .ok_or(LlmError::AuthenticationFailed)?;
    let secret = SecretString::from(key.to_string());

    let base_url = match config.base_url.as_deref() {
        Some(url) => url,
        None => default_base_url(&config.provider_name).ok_or_else(|| {
            LlmError::InvalidRequest(format!(
                "unknown provider '{}' requires base_url",
                config.provider_name
            ))
        })?,
    };

    let provider =
        OpenAiCompatibleProvider::new(&config.provider_name, base_url, &secret, &config.model);
    Ok(BoxLlmProvider::new(provider))
}

/// Read the API key from the environment variable named in `config` and
/// build the provider. Returns `None` (with a warning) when the key is
/// missing or construction fails, so callers run in rule-based mode.
pub fn provider_from_env(config: &LlmConfig) -> Option<BoxLlmProvider> {
    let key = std::env::var(&config.api_key_env).ok();
    match create_provider(config, key.as_deref()) {
        Ok(provider) => {
            tracing::debug!(provider = %config.provider_name, model = %config.model, "LLM provider ready");
            Some(provider)
        }
        Err(e) => {
            tracing::warn!(
                provider = %config.provider_name,
                env = %config.api_key_env,
                "LLM provider unavailable ({e}); using rule-based mode"
            );
            None
        }
    }
}
