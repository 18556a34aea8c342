pub mod openai;

use async_trait::async_trait;
use std::error::Error as StdError;
use std::sync::Arc;

use self::openai::OpenAIChatClient;
use super::{ LlmConfig, RelayError };
use crate::models::chat::{ ChatTurn, TokenUsage };

/// One uploaded attachment, handed to the relay as raw bytes plus the
/// declared media type.
#[derive(Clone, Debug)]
pub struct AttachedFile {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl AttachedFile {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// One assistant turn plus the usage counters the upstream reported, if any.
#[derive(Clone, Debug)]
pub struct Completion {
    pub message: ChatTurn,
    pub usage: Option<TokenUsage>,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Relay the conversation (role and content only, timestamps stripped)
    /// and return the assistant's reply. An empty turn sequence is rejected
    /// before any upstream call.
    async fn complete(
        &self,
        turns: &[ChatTurn],
        model: Option<&str>
    ) -> Result<Completion, RelayError>;

    /// Same as `complete`, with attachments folded into the final turn.
    /// Any image attachment forces the vision-capable model regardless of
    /// the requested one.
    async fn complete_with_files(
        &self,
        turns: &[ChatTurn],
        files: &[AttachedFile],
        model: Option<&str>
    ) -> Result<Completion, RelayError>;

    fn default_model(&self) -> String;

    fn has_api_key(&self) -> bool;
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
    let client = OpenAIChatClient::from_config(config)?;
    Ok(Arc::new(client))
}
