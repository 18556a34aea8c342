pub mod chat;

use crate::cli::Args;
use thiserror::Error;

pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub completion_model: Option<String>,
    pub vision_model: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            completion_model: None,
            vision_model: None,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            api_key: Some(args.chat_api_key.clone()).filter(|k| !k.is_empty()),
            base_url: args.chat_base_url.clone(),
            completion_model: args.chat_model.clone(),
            vision_model: args.vision_model.clone(),
            timeout_secs: args.chat_timeout_secs,
        }
    }
}

/// Failure surface of the completion relay. Every variant is displayable to
/// the UI; the failed turn is never dropped or retried behind the caller's
/// back.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("OpenAI API key is not configured. Set OPENAI_API_KEY or pass --chat-api-key.")]
    MissingApiKey,

    #[error("messages cannot be empty")]
    EmptyRequest,

    #[error("request to the completion API timed out")]
    Timeout,

    #[error("failed to reach the completion API: {0}")]
    Transport(String),

    #[error("completion API error ({status}): {body}")]
    Upstream {
        status: u16,
        body: String,
    },

    #[error("completion API returned no usable message content")]
    EmptyCompletion,
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RelayError::Timeout
        } else {
            RelayError::Transport(err.to_string())
        }
    }
}
