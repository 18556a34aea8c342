pub mod api;

use crate::history::ChatStore;
use crate::llm::chat::ChatClient;
use std::error::Error;
use std::sync::Arc;

pub struct Server {
    addr: String,
    client: Arc<dyn ChatClient>,
    store: ChatStore,
}

impl Server {
    pub fn new(addr: String, client: Arc<dyn ChatClient>, store: ChatStore) -> Self {
        Self {
            addr,
            client,
            store,
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(&self.addr, self.client.clone(), self.store.clone()).await
    }
}
