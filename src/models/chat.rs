use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize };

pub const HISTORY_VERSION: &str = "1.0";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in a conversation. The timestamp is optional while the turn
/// is in flight and always set once it has been persisted or relayed back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), timestamp: None }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into(), timestamp: None }
    }
}

/// One saved conversation. Turns are serialized under `messages` to match
/// the persisted blob schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    #[serde(rename = "messages")]
    pub turns: Vec<ChatTurn>,
    pub model: String,
    pub total_tokens: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

/// Store-level settings. Every field carries its own default so a blob
/// written before a field existed still decodes, merged field-by-field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySettings {
    /// Cap on `chats`; enforced at insertion by trimming the oldest entries.
    #[serde(default = "default_max_chats")]
    pub max_chats_in_history: usize,
    /// Advisory flag; enforcement lives in the caller.
    #[serde(default = "default_auto_save")]
    pub auto_save_enabled: bool,
    /// Sessions untouched for this many days are eligible for eviction.
    /// 0 disables expiry.
    #[serde(default = "default_auto_delete_days")]
    pub auto_delete_after_days: u32,
}

fn default_max_chats() -> usize {
    100
}

fn default_auto_save() -> bool {
    true
}

fn default_auto_delete_days() -> u32 {
    30
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_chats_in_history: default_max_chats(),
            auto_save_enabled: default_auto_save(),
            auto_delete_after_days: default_auto_delete_days(),
        }
    }
}

/// The persisted root object. `chats` is ordered most-recently-created
/// first; `current_chat_id` is a weak reference into it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistory {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub current_chat_id: Option<String>,
    #[serde(default)]
    pub chats: Vec<ChatSession>,
    #[serde(default)]
    pub settings: HistorySettings,
}

fn default_version() -> String {
    HISTORY_VERSION.to_string()
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self {
            version: default_version(),
            current_chat_id: None,
            chats: Vec::new(),
            settings: HistorySettings::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ChatTurn>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message: ChatTurn,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub model: String,
    pub api_key_configured: bool,
    pub available_models: Vec<String>,
}
