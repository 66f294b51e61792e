use crate::types::Result;
use async_trait::async_trait;

/// Generic LLM client trait for provider abstraction
///
/// Implementations return the raw completion text; callers own parsing.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate with a system prompt, asking for a JSON object reply
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Generate a completion from a prompt
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}
