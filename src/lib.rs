pub mod cli;
pub mod models;
pub mod history;
pub mod llm;
pub mod server;
pub mod transcript;

use cli::Args;
use history::initialize_history_store;
use llm::chat::new_client;
use llm::{ LlmConfig, DEFAULT_COMPLETION_MODEL, DEFAULT_VISION_MODEL };
use log::info;
use server::Server;
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("History Store Type: {}", args.history_type);
    info!("History Path: {}", args.history_path);
    info!("History Quota Bytes: {}", args.history_max_bytes);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or(DEFAULT_COMPLETION_MODEL));
    info!("Vision Model: {}", args.vision_model.as_deref().unwrap_or(DEFAULT_VISION_MODEL));
    info!("API Key Configured: {}", !args.chat_api_key.is_empty());
    info!("-------------------------");

    let store = initialize_history_store(&args)?;
    let client = new_client(&LlmConfig::from_args(&args))?;
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, client, store);
    server.run().await?;

    Ok(())
}
