//! Pinecone implementation of the vector index, via its REST query API.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::base::{config::Config, types::Res};

use super::{GenericVectorIndex, IndexClient, ScoredMatch};

// Extra methods on `IndexClient` applied by the pinecone implementation.

impl IndexClient {
    pub fn pinecone(config: &Config) -> Res<Self> {
        let client = PineconeIndexClient::new(config)?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Wire types.

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_values: bool,
    include_metadata: bool,
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<ScoredMatch>,
}

// Specific implementations.

/// Pinecone vector index client implementation.
#[derive(Clone)]
pub struct PineconeIndexClient {
    http: reqwest::Client,
    query_url: String,
    api_key: String,
}

impl PineconeIndexClient {
    /// Create a new Pinecone index client.
    #[instrument(name = "PineconeIndexClient::new", skip_all)]
    pub fn new(config: &Config) -> Res<Self> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(config.request_timeout_secs)).build()?;
        let query_url = format!("{}/query", config.index_host.trim_end_matches('/'));

        Ok(Self {
            http,
            query_url,
            api_key: config.index_api_key.clone(),
        })
    }
}

#[async_trait]
impl GenericVectorIndex for PineconeIndexClient {
    #[instrument(skip(self, vector))]
    async fn query(&self, vector: &[f32], top_k: usize, namespace: &str) -> Res<Vec<ScoredMatch>> {
        let request = QueryRequest {
            vector,
            top_k,
            include_values: false,
            include_metadata: true,
            namespace,
        };

        let response = self.http.post(&self.query_url).header("Api-Key", &self.api_key).json(&request).send().await?.error_for_status()?;

        let body: QueryResponse = response.json().await?;

        debug!("Vector index returned {} matches.", body.matches.len());

        Ok(body.matches)
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_request_uses_the_pinecone_wire_shape() {
        let vector = vec![0.1, 0.2];
        let request = QueryRequest {
            vector: &vector,
            top_k: 5,
            include_values: false,
            include_metadata: true,
            namespace: "handbook-namespace",
        };

        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["topK"], 5);
        assert_eq!(json["includeMetadata"], true);
        assert_eq!(json["includeValues"], false);
        assert_eq!(json["namespace"], "handbook-namespace");
    }

    #[test]
    fn query_response_parses_matches_with_metadata() {
        let body = r#"{
            "matches": [
                { "id": "chunk-1", "score": 0.92, "metadata": { "text": "Refunds take 5 days." } },
                { "id": "chunk-2" }
            ],
            "namespace": "handbook-namespace"
        }"#;

        let response: QueryResponse = serde_json::from_str(body).unwrap();

        assert_eq!(response.matches.len(), 2);
        assert_eq!(response.matches[0].metadata["text"], "Refunds take 5 days.");
        assert!(response.matches[1].metadata.is_empty());
    }
}
