//! LLM client used for hint generation.
//!
//! - [`LlmClient`] - the trait handlers and services depend on
//! - [`OpenAiCompatClient`] - any OpenAI-compatible `chat/completions`
//!   endpoint (Gemini's compatibility endpoint by default)
//!
//! Tests substitute their own `LlmClient`.

/// Core LLM client trait.
pub mod client;
/// OpenAI-compatible HTTP client.
pub mod openai;

pub use client::LlmClient;
pub use openai::OpenAiCompatClient;
