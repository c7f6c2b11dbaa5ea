pub mod generation;
pub mod prompt;

use std::sync::Arc;

use tracing::{debug, instrument};

use common::{
    error::AppError,
    storage::vector::{ScoredPoint, VectorStore},
    utils::embedding::EmbeddingClient,
};

/// One ranked chunk returned for a query, carrying its stored payload.
/// Ephemeral; produced per request and never persisted.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub score: f32,
    pub text: String,
    pub url: String,
    pub title: String,
}

/// Embeds a query and ranks stored chunks against it.
pub struct RetrievalEngine {
    embedding: Arc<EmbeddingClient>,
    store: Arc<VectorStore>,
    score_threshold: f32,
}

impl RetrievalEngine {
    pub fn new(
        embedding: Arc<EmbeddingClient>,
        store: Arc<VectorStore>,
        score_threshold: f32,
    ) -> Self {
        Self {
            embedding,
            store,
            score_threshold,
        }
    }

    /// Returns the top-k chunks for a query, best first. An empty result is a
    /// valid outcome (nothing indexed yet); embedding or search failures
    /// propagate to the caller.
    #[instrument(skip_all, fields(top_k))]
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalResult>, AppError> {
        let query_vector = self.embedding.embed_one(query).await?;
        let hits = self
            .store
            .search(&query_vector, top_k, self.score_threshold)
            .await?;

        debug!(hits = hits.len(), "retrieval complete");
        Ok(hits.into_iter().map(hit_to_result).collect())
    }
}

/// Maps a raw hit onto a result. Stored payloads are not trusted: missing or
/// mistyped fields become empty strings instead of failing the request.
fn hit_to_result(hit: ScoredPoint) -> RetrievalResult {
    let payload = hit.payload.unwrap_or(serde_json::Value::Null);
    let field = |name: &str| {
        payload
            .get(name)
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_owned()
    };

    RetrievalResult {
        score: hit.score,
        text: field("text"),
        url: field("url"),
        title: field("title"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_complete_payloads() {
        let hit = ScoredPoint {
            score: 0.81,
            payload: Some(json!({
                "url": "https://news.example/a",
                "title": "A",
                "text": "alpha text"
            })),
        };
        let result = hit_to_result(hit);
        assert!((result.score - 0.81).abs() < f32::EPSILON);
        assert_eq!(result.title, "A");
        assert_eq!(result.url, "https://news.example/a");
        assert_eq!(result.text, "alpha text");
    }

    #[test]
    fn missing_or_mistyped_payload_fields_default_to_empty() {
        let hit = ScoredPoint {
            score: 0.5,
            payload: Some(json!({ "title": 42 })),
        };
        let result = hit_to_result(hit);
        assert!(result.title.is_empty());
        assert!(result.url.is_empty());
        assert!(result.text.is_empty());

        let hit = ScoredPoint {
            score: 0.5,
            payload: None,
        };
        let result = hit_to_result(hit);
        assert!(result.title.is_empty());
    }
}
