//! Runtime services and shared state for the handbook-bot.

use tracing::instrument;

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    service::{chat::ChatClient, index::IndexClient, llm::LlmClient, store::StoreClient},
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the history store, LLM, vector index, and chat clients,
/// constructed once from configuration and passed by injection rather than
/// held as ambient singletons. It is designed to be trivially cloneable,
/// allowing it to be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The history store client instance.
    pub store: StoreClient,
    /// The LLM client instance.
    pub llm: LlmClient,
    /// The vector index client instance.
    pub index: IndexClient,
    /// The chat client instance.
    pub chat: ChatClient,
}

impl Runtime {
    /// Create a new runtime instance.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        // Initialize the history store.
        let store = StoreClient::surreal(&config).await?;

        // Initialize the LLM client.
        let llm = LlmClient::openai(&config);

        // Initialize the vector index client.
        let index = IndexClient::pinecone(&config)?;

        // Initialize the slack client.
        let chat = ChatClient::slack(&config, store.clone(), llm.clone(), index.clone()).await?;

        Ok(Self { config, store, llm, index, chat })
    }

    pub async fn start(&self) -> Void {
        self.chat.start().await
    }
}
