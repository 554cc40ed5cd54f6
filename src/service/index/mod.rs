//! Vector index service for k-nearest-neighbor passage search.
//!
//! This module defines the `GenericVectorIndex` trait that can be implemented
//! for different vector databases, with a default implementation for the
//! Pinecone REST API.

pub mod pinecone;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;

use crate::base::types::Res;

// Structs.

/// A scored match returned by the vector index.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoredMatch {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

// Traits.

/// Generic vector index trait that clients must implement.
#[async_trait]
pub trait GenericVectorIndex: Send + Sync + 'static {
    /// k-nearest-neighbor query against a namespace.
    ///
    /// Returns up to `top_k` scored matches with metadata.
    async fn query(&self, vector: &[f32], top_k: usize, namespace: &str) -> Res<Vec<ScoredMatch>>;
}

/// Vector index client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct IndexClient {
    inner: Arc<dyn GenericVectorIndex>,
}

impl Deref for IndexClient {
    type Target = dyn GenericVectorIndex;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl IndexClient {
    pub fn new(inner: Arc<dyn GenericVectorIndex>) -> Self {
        Self { inner }
    }
}
