//! Conversation history storage.
//!
//! This module defines the `GenericHistoryStore` trait that can be implemented
//! for different key-value backends, with a default implementation for
//! SurrealDB. The store is an external collaborator: it provides per-channel
//! atomicity (last writer wins) and owns conversation lifecycle; the bot only
//! reads and appends.

pub mod surreal;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{ConversationState, Res, Void};

// Traits.

/// Generic history store trait that clients must implement.
#[async_trait]
pub trait GenericHistoryStore: Send + Sync + 'static {
    /// Fetch the conversation for a channel, if one has been started.
    async fn get_conversation(&self, channel_id: &str) -> Res<Option<ConversationState>>;

    /// Persist the conversation for a channel.
    async fn put_conversation(&self, channel_id: &str, state: &ConversationState) -> Void;
}

// Structs.

/// History store client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct StoreClient {
    inner: Arc<dyn GenericHistoryStore>,
}

impl Deref for StoreClient {
    type Target = dyn GenericHistoryStore;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl StoreClient {
    pub fn new(inner: Arc<dyn GenericHistoryStore>) -> Self {
        Self { inner }
    }
}
