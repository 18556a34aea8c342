use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Address for the HTTP API server (host:port)
    #[arg(long, env = "SERVER_ADDR", default_value = "0.0.0.0:8080")]
    pub server_addr: String,

    // --- History Store Args ---
    /// Chat history store type (file, memory)
    #[arg(long, env = "HISTORY_TYPE", default_value = "file")]
    pub history_type: String,

    /// Path of the history blob used by the file store
    #[arg(long, env = "HISTORY_PATH", default_value = "minichat-history.json")]
    pub history_path: String,

    /// Storage quota for the history blob in bytes (0 = unlimited)
    #[arg(long, env = "HISTORY_MAX_BYTES", default_value = "0")]
    pub history_max_bytes: usize,

    // --- Chat LLM Provider Args ---
    /// API key for the completion provider
    #[arg(long, env = "OPENAI_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Base URL for the chat completions endpoint
    #[arg(long, env = "CHAT_BASE_URL")] // No default, the client falls back to the OpenAI endpoint
    pub chat_base_url: Option<String>,

    /// Model name for chat completion (e.g., gpt-4o-mini)
    #[arg(long, env = "CHAT_MODEL")]
    pub chat_model: Option<String>,

    /// Vision-capable model forced when image attachments are present
    #[arg(long, env = "VISION_MODEL")]
    pub vision_model: Option<String>,

    /// Timeout in seconds for a single completion request
    #[arg(long, env = "CHAT_TIMEOUT_SECS", default_value = "60")]
    pub chat_timeout_secs: u64,
}
