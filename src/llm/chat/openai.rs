use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::info;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;
use std::time::Duration;

use super::{ AttachedFile, ChatClient, Completion };
use crate::llm::{ LlmConfig, RelayError, DEFAULT_COMPLETION_MODEL, DEFAULT_VISION_MODEL };
use crate::models::chat::{ ChatTurn, Role, TokenUsage };

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Text sent in place of a prompt when an image arrives with no user text.
const IMAGE_ONLY_PROMPT: &str = "Describe the attached image";

pub struct OpenAIChatClient {
    http: HttpClient,
    api_key: Option<String>,
    model: String,
    vision_model: String,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAIMessage {
    role: String,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text {
        text: String,
    },
    ImageUrl {
        image_url: ImageUrl,
    },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: Option<OpenAIResponseMessage>,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

impl OpenAIChatClient {
    pub fn new(
        api_key: Option<String>,
        model: Option<String>,
        vision_model: Option<String>,
        base_url: Option<String>,
        timeout: Duration
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let api_key = api_key.filter(|key| !key.is_empty());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key.as_deref() {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|e|
                    format!("Invalid API key format: {}", e)
                )?
            );
        }

        let http = HttpClient::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)?;

        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_COMPLETION_MODEL.to_string()),
            vision_model: vision_model.unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        Self::new(
            config.api_key.clone(),
            config.completion_model.clone(),
            config.vision_model.clone(),
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs)
        )
    }

    fn ensure_ready(&self, turns: &[ChatTurn]) -> Result<(), RelayError> {
        if turns.is_empty() {
            return Err(RelayError::EmptyRequest);
        }
        if self.api_key.is_none() {
            return Err(RelayError::MissingApiKey);
        }
        Ok(())
    }

    async fn dispatch(&self, request: &OpenAIChatRequest) -> Result<Completion, RelayError> {
        let response = self.http
            .post(self.base_url.trim_end_matches('/'))
            .json(request)
            .send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RelayError::Upstream { status: status.as_u16(), body });
        }

        let parsed: OpenAIResponse = serde_json
            ::from_str(&body)
            .map_err(|_| RelayError::Upstream { status: status.as_u16(), body: body.clone() })?;

        let content = parsed.choices
            .first()
            .and_then(|choice| choice.message.as_ref())
            .and_then(|message| message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or(RelayError::EmptyCompletion)?;

        let usage = parsed.usage.map(|usage| TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        });

        Ok(Completion {
            message: ChatTurn { role: Role::Assistant, content, timestamp: None },
            usage,
        })
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(
        &self,
        turns: &[ChatTurn],
        model: Option<&str>
    ) -> Result<Completion, RelayError> {
        self.ensure_ready(turns)?;
        let model = model.unwrap_or(&self.model);
        let request = plain_request(model, turns);
        info!("Relaying {} turn(s) with model {}", turns.len(), model);
        self.dispatch(&request).await
    }

    async fn complete_with_files(
        &self,
        turns: &[ChatTurn],
        files: &[AttachedFile],
        model: Option<&str>
    ) -> Result<Completion, RelayError> {
        self.ensure_ready(turns)?;

        let model = if files.iter().any(AttachedFile::is_image) {
            info!("Image attachment present, switching to vision model {}", self.vision_model);
            self.vision_model.as_str()
        } else {
            model.unwrap_or(&self.model)
        };

        let Some((last, preceding)) = turns.split_last() else {
            return Err(RelayError::EmptyRequest);
        };
        let request = files_request(model, preceding, last, files);
        info!("Relaying {} turn(s) and {} file(s) with model {}", turns.len(), files.len(), model);
        self.dispatch(&request).await
    }

    fn default_model(&self) -> String {
        self.model.clone()
    }

    fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Plain-text request: role and content only, timestamps stripped.
fn plain_request(model: &str, turns: &[ChatTurn]) -> OpenAIChatRequest {
    OpenAIChatRequest {
        model: model.to_string(),
        messages: turns.iter().map(text_message).collect(),
        temperature: Some(0.7),
        max_tokens: Some(1000),
    }
}

/// Attachment request: preceding turns stay plain text, the final turn
/// becomes multi-part content with one data-URL image part per image.
/// Non-image attachments are ignored.
fn files_request(
    model: &str,
    preceding: &[ChatTurn],
    last: &ChatTurn,
    files: &[AttachedFile]
) -> OpenAIChatRequest {
    let mut messages: Vec<OpenAIMessage> = preceding.iter().map(text_message).collect();

    let mut parts = Vec::new();
    let text = last.content.trim();
    if !text.is_empty() {
        parts.push(ContentPart::Text { text: text.to_string() });
    } else if !files.is_empty() {
        parts.push(ContentPart::Text { text: IMAGE_ONLY_PROMPT.to_string() });
    }

    for file in files.iter().filter(|file| file.is_image()) {
        let url = format!("data:{};base64,{}", file.content_type, BASE64.encode(&file.data));
        parts.push(ContentPart::ImageUrl { image_url: ImageUrl { url } });
    }

    messages.push(OpenAIMessage {
        role: Role::User.as_str().to_string(),
        content: MessageContent::Parts(parts),
    });

    OpenAIChatRequest {
        model: model.to_string(),
        messages,
        temperature: None,
        max_tokens: Some(4096),
    }
}

fn text_message(turn: &ChatTurn) -> OpenAIMessage {
    OpenAIMessage {
        role: turn.role.as_str().to_string(),
        content: MessageContent::Text(turn.content.clone()),
    }
}
