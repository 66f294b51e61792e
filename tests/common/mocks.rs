//! Mock implementations for testing.
//!
//! Shared across test files so the hint endpoints can run without a real
//! LLM provider.

use async_trait::async_trait;
use codepath::llm::LlmClient;
use codepath::types::{AppError, Result, Upstream};
use parking_lot::Mutex;

/// Well-formed tutor reply.
pub const HINT_REPLY: &str = r#"{"hint":"Think about the empty array","explanation":"reduce needs an initial value","code_snippet":null,"next_steps":["Pass 0 as the second argument"],"confidence_score":0.85,"detected_issue_type":"missing base case"}"#;

enum Behavior {
    Reply(String),
    Fail { timed_out: bool },
}

/// Mock LLM client with a configurable reply.
///
/// ```ignore
/// let llm = MockLlmClient::new(HINT_REPLY);
/// llm.fail(true); // every call now times out
/// ```
pub struct MockLlmClient {
    behavior: Mutex<Behavior>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new(reply: &str) -> Self {
        Self {
            behavior: Mutex::new(Behavior::Reply(reply.to_string())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn reply_with(&self, reply: &str) {
        *self.behavior.lock() = Behavior::Reply(reply.to_string());
    }

    /// Make every following call fail as an upstream error.
    pub fn fail(&self, timed_out: bool) {
        *self.behavior.lock() = Behavior::Fail { timed_out };
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());

        match &*self.behavior.lock() {
            Behavior::Reply(reply) => Ok(reply.clone()),
            Behavior::Fail { timed_out } => Err(AppError::Upstream {
                service: Upstream::Llm,
                message: "Mock LLM failure".to_string(),
                timed_out: *timed_out,
            }),
        }
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}
