//! SurrealDB implementation of the history store.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surrealdb::{Surreal, engine::any::Any, opt::auth::Root};
use tracing::{info, instrument};

use crate::base::{
    config::Config,
    types::{ConversationState, Res, Turn, Void},
};

use super::{GenericHistoryStore, StoreClient};

// Extra methods on `StoreClient` applied by the surreal implementation.

impl StoreClient {
    /// Connect to the configured SurrealDB endpoint.
    pub async fn surreal(config: &Config) -> Res<Self> {
        let store = SurrealHistoryStore::connect(&config.db_endpoint, Some((&config.db_username, &config.db_password))).await?;
        Ok(Self { inner: Arc::new(store) })
    }

    /// In-memory store, used by tests.
    pub async fn surreal_memory() -> Res<Self> {
        let store = SurrealHistoryStore::connect("mem://", None).await?;
        Ok(Self { inner: Arc::new(store) })
    }
}

// Structs.

/// Stored record for a channel conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConversationRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<surrealdb::sql::Thing>,
    history: Vec<Turn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

// Specific implementations.

/// SurrealDB history store implementation.
#[derive(Clone)]
pub struct SurrealHistoryStore {
    db: Surreal<Any>,
}

impl SurrealHistoryStore {
    /// Connect to an endpoint (`ws://`, `wss://`, or `mem://`).
    #[instrument(name = "SurrealHistoryStore::connect", skip_all)]
    async fn connect(endpoint: &str, auth: Option<(&str, &str)>) -> Res<Self> {
        let db = surrealdb::engine::any::connect(endpoint).await?;

        if let Some((username, password)) = auth {
            db.signin(Root { username, password }).await?;
        }

        db.use_ns("handbook").use_db("bot").await?;

        info!("History store initialized successfully.");

        Ok(Self { db })
    }
}

#[async_trait]
impl GenericHistoryStore for SurrealHistoryStore {
    #[instrument(skip(self))]
    async fn get_conversation(&self, channel_id: &str) -> Res<Option<ConversationState>> {
        let record: Option<ConversationRecord> = self.db.select(("conversation", channel_id)).await?;

        Ok(record.map(|r| ConversationState { history: r.history, model: r.model }))
    }

    #[instrument(skip(self, state))]
    async fn put_conversation(&self, channel_id: &str, state: &ConversationState) -> Void {
        let record = ConversationRecord {
            id: None,
            history: state.history.clone(),
            model: state.model.clone(),
            updated_at: chrono::Utc::now(),
        };

        let _: Option<ConversationRecord> = self.db.upsert(("conversation", channel_id)).content(record).await?;

        Ok(())
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_channel_has_no_conversation() {
        let store = StoreClient::surreal_memory().await.unwrap();

        let state = store.get_conversation("C_ABSENT").await.unwrap();

        assert!(state.is_none());
    }

    #[tokio::test]
    async fn put_then_get_round_trips_history_in_order() {
        let store = StoreClient::surreal_memory().await.unwrap();

        let state = ConversationState {
            history: vec![Turn::user("what is the refund policy?"), Turn::assistant("Refunds take 5 days.")],
            model: Some("gpt-3.5-turbo".to_string()),
        };

        store.put_conversation("C1", &state).await.unwrap();
        let loaded = store.get_conversation("C1").await.unwrap().unwrap();

        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn put_overwrites_with_last_writer_wins() {
        let store = StoreClient::surreal_memory().await.unwrap();

        let first = ConversationState { history: vec![Turn::user("one")], model: None };
        let second = ConversationState { history: vec![Turn::user("one"), Turn::assistant("two")], model: None };

        store.put_conversation("C1", &first).await.unwrap();
        store.put_conversation("C1", &second).await.unwrap();

        let loaded = store.get_conversation("C1").await.unwrap().unwrap();
        assert_eq!(loaded.history.len(), 2);
    }
}
