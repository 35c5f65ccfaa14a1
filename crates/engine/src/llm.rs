use async_trait::async_trait;

use stencil_core::TransportError;

/// One text-generation call: the fixed system role plus the assembled user
/// prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
}

/// The injected text-generation capability. Implementations classify every
/// failure as a [`TransportError`] so the attempt loop can absorb it.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError>;
}
