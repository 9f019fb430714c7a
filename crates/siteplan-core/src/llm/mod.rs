//! Generative-text collaborator interface.
//!
//! The planner only needs "prompt in, text out". Implementations must absorb
//! their own failures and return [`ERROR_SENTINEL`] instead, so the task
//! graph generator's fallback path is the single place failures surface.

use async_trait::async_trait;
use thiserror::Error;

mod openai;

pub use openai::{OpenAiConfig, OpenAiGenerator};

/// Text returned in place of a completion when the service call fails.
pub const ERROR_SENTINEL: &str = "Error: Could not generate response";

/// A source of free-text completions.
///
/// Object-safe so it can be shared as `Arc<dyn TextGenerator>`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete `prompt` at the given sampling temperature.
    ///
    /// Never fails; transport or service errors yield [`ERROR_SENTINEL`].
    async fn complete(&self, prompt: &str, temperature: f32) -> String;
}

// Compile-time assertion: TextGenerator must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn TextGenerator) {}
};

/// Errors from a single completion request, before they are absorbed.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
