//! Knowledge retrieval: embed the query, search the index, dedup the passages.

use std::collections::HashSet;

use tracing::{debug, instrument};

use crate::{
    base::{
        config::Config,
        types::{Res, RetrievedPassage},
    },
    service::{
        index::{IndexClient, ScoredMatch},
        llm::LlmClient,
    },
};

/// Retrieves knowledge-base passages relevant to a query.
#[derive(Clone)]
pub struct Retriever {
    llm: LlmClient,
    index: IndexClient,
    namespace: String,
    text_key: String,
}

impl Retriever {
    pub fn new(config: &Config, llm: LlmClient, index: IndexClient) -> Self {
        Self {
            llm,
            index,
            namespace: config.index_namespace.clone(),
            text_key: config.passage_text_key.clone(),
        }
    }

    /// Retrieve up to `k` passages relevant to `query`, deduplicated by content.
    #[instrument(skip(self, query))]
    pub async fn retrieve(&self, query: &str, k: usize) -> Res<Vec<RetrievedPassage>> {
        // OpenAI recommends replacing newlines with spaces in embedding inputs.
        let query = query.replace('\n', " ");

        let vector = self.llm.embed(&query).await?;
        let matches = self.index.query(&vector, k, &self.namespace).await?;

        let passages = matches.into_iter().filter_map(|m| passage_from_match(m, &self.text_key)).collect();

        let passages = dedup_passages(passages);
        debug!("Retrieved {} passages after dedup.", passages.len());

        Ok(passages)
    }
}

/// Extract the passage text from match metadata; matches without it are dropped.
fn passage_from_match(m: ScoredMatch, text_key: &str) -> Option<RetrievedPassage> {
    let content = m.metadata.get(text_key)?.as_str()?.to_string();

    Some(RetrievedPassage { content, metadata: m.metadata })
}

/// Deduplicate passages by content, preserving first-seen order.
///
/// Overlapping source documents commonly produce identical chunks.
pub fn dedup_passages(passages: Vec<RetrievedPassage>) -> Vec<RetrievedPassage> {
    let mut seen = HashSet::new();

    passages.into_iter().filter(|p| seen.insert(p.content.clone())).collect()
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn scored_match(id: &str, metadata: serde_json::Value) -> ScoredMatch {
        ScoredMatch {
            id: id.to_string(),
            score: 0.9,
            metadata: metadata.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn passage_text_comes_from_the_configured_metadata_key() {
        let m = scored_match("chunk-1", serde_json::json!({ "text": "Refunds take 5 days.", "source": "handbook.md" }));

        let passage = passage_from_match(m, "text").unwrap();

        assert_eq!(passage.content, "Refunds take 5 days.");
        assert_eq!(passage.metadata["source"], "handbook.md");
    }

    #[test]
    fn matches_without_passage_text_are_dropped() {
        let m = scored_match("chunk-1", serde_json::json!({ "source": "handbook.md" }));

        assert!(passage_from_match(m, "text").is_none());
    }

    #[test]
    fn identical_content_with_different_metadata_collapses_to_one() {
        let passages = vec![
            RetrievedPassage {
                content: "Refunds take 5 days.".to_string(),
                metadata: serde_json::json!({ "source": "a.md" }).as_object().cloned().unwrap(),
            },
            RetrievedPassage {
                content: "Refunds take 5 days.".to_string(),
                metadata: serde_json::json!({ "source": "b.md" }).as_object().cloned().unwrap(),
            },
            RetrievedPassage {
                content: "Exchanges are free.".to_string(),
                metadata: serde_json::Map::new(),
            },
        ];

        let deduped = dedup_passages(passages);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].content, "Refunds take 5 days.");
        assert_eq!(deduped[0].metadata["source"], "a.md");
        assert_eq!(deduped[1].content, "Exchanges are free.");
    }
}
