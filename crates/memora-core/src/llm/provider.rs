//! LlmProvider trait definition.

use memora_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// A black-box text generator: ordered role/content turns in, one string out.
///
/// Uses native async fn in traits (RPITIT). Wrap in
/// [`super::box_provider::BoxLlmProvider`] for dynamic dispatch.
///
/// Implementations live in memora-infra (e.g., `OpenAiCompatibleProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
