//! BoxLlmProvider -- object-safe dynamic dispatch wrapper for LlmProvider.
//!
//! 1. `LlmProviderDyn` is an object-safe mirror of `LlmProvider` with boxed futures
//! 2. Every `T: LlmProvider` gets `LlmProviderDyn` through a blanket impl
//! 3. `BoxLlmProvider` wraps `Box<dyn LlmProviderDyn>` and delegates

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use memora_types::llm::{CompletionRequest, CompletionResponse, LlmError};

use super::provider::LlmProvider;

/// Object-safe version of [`LlmProvider`] with boxed futures.
pub trait LlmProviderDyn: Send + Sync {
    fn name(&self) -> &str;

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>>;
}

impl<T: LlmProvider> LlmProviderDyn for T {
    fn name(&self) -> &str {
        LlmProvider::name(self)
    }

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>> {
        Box::pin(self.complete(request))
    }
}

/// Type-erased LLM provider, selected at runtime from configuration.
pub struct BoxLlmProvider {
    inner: Box<dyn LlmProviderDyn + Send + Sync>,
}

impl BoxLlmProvider {
    pub fn new<T: LlmProvider + 'static>(provider: T) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Send a completion request and receive the full response.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        self.inner.complete_boxed(request).await
    }

    /// Like [`Self::complete`], but gives up with `LlmError::Timeout` once
    /// `limit` has elapsed.
    pub async fn complete_with_timeout(
        &self,
        request: &CompletionRequest,
        limit: Duration,
    ) -> Result<CompletionResponse, LlmError> {
        match tokio::time::timeout(limit, self.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                after_ms: limit.as_millis() as u64,
            }),
        }
    }
}

impl std::fmt::Debug for BoxLlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxLlmProvider")
            .field("name", &self.name())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Script, ScriptedProvider};
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "test-model".to_string(),
            messages: vec![],
            system: None,
            max_tokens: 64,
            temperature: Some(0.0),
        }
    }

    #[tokio::test]
    async fn test_box_provider_delegates() {
        let provider = ScriptedProvider::boxed(Script::Reply("hello".to_string()));
        assert_eq!(provider.name(), "scripted");
        let response = provider.complete(&request()).await.unwrap();
        assert_eq!(response.content, "hello");
        assert_eq!(response.model, "test-model");
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_with_timeout_expires() {
        let provider = ScriptedProvider::boxed(Script::Stall(Duration::from_secs(60)));
        let err = provider
            .complete_with_timeout(&request(), Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Timeout { after_ms: 500 }));
    }

    #[tokio::test]
    async fn test_complete_with_timeout_passes_errors_through() {
        let provider = ScriptedProvider::boxed(Script::Fail);
        let err = provider
            .complete_with_timeout(&request(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Provider { .. }));
    }
}
