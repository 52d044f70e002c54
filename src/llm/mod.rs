pub mod openai;
pub mod utils;

use async_trait::async_trait;
use thiserror::Error;

pub use openai::{OpenAiConfig, OpenAiTextModel};

/// Failures talking to the text model.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("text model is not configured: {0}")]
    NotConfigured(String),

    #[error("text model request failed: {0}")]
    Request(String),

    #[error("text model returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("text model response invalid: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Request(_) => true,
            LlmError::Status { status, .. } => *status == 429 || *status >= 500,
            LlmError::NotConfigured(_) | LlmError::InvalidResponse(_) => false,
        }
    }
}

/// A chat model reduced to one system/user exchange.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}
