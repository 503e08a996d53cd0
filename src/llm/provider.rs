use async_trait::async_trait;
use crate::types::{AppResult, LLMRequest, LLMResponse};

/// A chat-completion backend. One attempt per call; retries and timeouts are
/// the invoker's job.
#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;

    /// Confirm the backend is reachable before a run starts
    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }

    fn name(&self) -> &str;
}
