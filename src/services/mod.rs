//! Upstream-facing services: sandboxed code execution and AI hints.

/// Tutoring hints built on an [`LlmClient`](crate::llm::LlmClient).
pub mod hints;
/// Piston code-execution client and stderr parsing.
pub mod piston;

pub use hints::{Difficulty, HintRequest, HintResponse, HintService};
pub use piston::{CodeError, CodeFile, CodeRequest, CodeResponse, CodeStage, PistonClient};
