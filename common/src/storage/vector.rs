use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{error::AppError, utils::config::AppConfig};

/// Payload stored alongside each vector. All fields default so a point with
/// partial payload still deserializes.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArticlePayload {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
}

/// A point as upserted into the collection.
#[derive(Debug, Clone, Serialize)]
pub struct IndexPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: ArticlePayload,
}

/// A raw search hit. The payload stays untyped here; callers map fields
/// defensively.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredPoint {
    pub score: f32,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

/// Derives the point id for a chunk from its document url and position.
/// Re-ingesting the same document yields the same ids, so upserts overwrite
/// instead of duplicating.
pub fn deterministic_point_id(url: &str, chunk_index: usize) -> String {
    let digest = Sha256::digest(format!("{url}#{chunk_index}").as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}

/// Adapter for a Qdrant collection over its REST API.
pub struct VectorStore {
    http: reqwest::Client,
    base_url: String,
    collection: String,
    dimensions: u32,
}

impl VectorStore {
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(
            &config.qdrant_url,
            config.qdrant_api_key.as_deref(),
            &config.qdrant_collection,
            config.tuning.embedding_dimensions,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        collection: &str,
        dimensions: u32,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            headers.insert(
                "api-key",
                HeaderValue::from_str(key.trim())
                    .map_err(|_| AppError::Validation("invalid vector store API key".into()))?,
            );
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            collection: collection.to_owned(),
            dimensions,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    /// Creates the collection if it does not exist. A failed existence check
    /// is treated the same as "not found", and a concurrent create (409) as
    /// success.
    pub async fn ensure_collection(&self) -> Result<(), AppError> {
        match self.http.get(self.collection_url()).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(collection = %self.collection, "collection already exists");
                return Ok(());
            }
            Ok(response) => {
                debug!(
                    collection = %self.collection,
                    status = %response.status(),
                    "collection existence check returned non-success; creating"
                );
            }
            Err(err) => {
                warn!(
                    collection = %self.collection,
                    error = %err,
                    "collection existence check failed; attempting create"
                );
            }
        }

        let body = json!({
            "vectors": { "size": self.dimensions, "distance": "Cosine" }
        });
        let response = self
            .http
            .put(self.collection_url())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::CONFLICT {
            debug!(collection = %self.collection, dimensions = self.dimensions, "collection ready");
            Ok(())
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            Err(AppError::VectorStore(format!(
                "failed to create collection {} ({status}): {body}",
                self.collection
            )))
        }
    }

    /// Upserts a batch of points, keyed by id. Batches are independent; a
    /// failure here never disturbs previously committed batches.
    pub async fn upsert(&self, points: &[IndexPoint]) -> Result<(), AppError> {
        if points.is_empty() {
            return Ok(());
        }

        let url = format!("{}/points?wait=true", self.collection_url());
        let response = self
            .http
            .put(url)
            .json(&json!({ "points": points }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(AppError::VectorStore(format!(
                "upsert of {} points failed ({status}): {body}",
                points.len()
            )));
        }

        debug!(points = points.len(), collection = %self.collection, "upserted batch");
        Ok(())
    }

    /// Top-k similarity search. A zero threshold is omitted from the request,
    /// which means "return top-k regardless of relevance".
    pub async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<ScoredPoint>, AppError> {
        let mut body = json!({
            "vector": query_vector,
            "limit": limit,
            "with_payload": true,
        });
        if score_threshold > 0.0 {
            body["score_threshold"] = json!(score_threshold);
        }

        let url = format!("{}/points/search", self.collection_url());
        let response = self.http.post(url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(AppError::VectorStore(format!(
                "search failed ({status}): {body}"
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::VectorStore(format!("unreadable search response: {e}")))?;

        Ok(parsed.result)
    }

    /// Cheap reachability probe used by the readiness endpoint.
    pub async fn healthcheck(&self) -> Result<(), AppError> {
        let url = format!("{}/collections", self.base_url);
        let response = self.http.get(url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::VectorStore(format!(
                "vector store returned {}",
                response.status()
            )))
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_ids_are_stable() {
        let first = deterministic_point_id("https://x/1", 3);
        let second = deterministic_point_id("https://x/1", 3);
        assert_eq!(first, second);
        // Canonical hyphenated UUID form, accepted by the store as a point id.
        assert_eq!(first.len(), 36);
        assert!(Uuid::parse_str(&first).is_ok());
    }

    #[test]
    fn point_ids_differ_across_urls_and_indexes() {
        let base = deterministic_point_id("https://x/1", 3);
        assert_ne!(base, deterministic_point_id("https://x/1", 4));
        assert_ne!(base, deterministic_point_id("https://x/2", 3));
    }

    #[test]
    fn partial_payload_deserializes_with_defaults() {
        let payload: ArticlePayload =
            serde_json::from_value(json!({ "title": "only a title" })).expect("must deserialize");
        assert_eq!(payload.title, "only a title");
        assert!(payload.url.is_empty());
        assert!(payload.text.is_empty());
    }
}
