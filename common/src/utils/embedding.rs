use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::AppError, utils::config::AppConfig};

/// Client for an OpenAI-compatible embeddings endpoint. One remote call per
/// `embed_batch` invocation; batch sizing is the caller's job, and failed
/// calls are not retried here.
pub struct EmbeddingClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    dimensions: u32,
}

impl EmbeddingClient {
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(
            &config.openai_api_key,
            &config.openai_base_url,
            &config.embedding_model,
            config.tuning.embedding_dimensions,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        dimensions: u32,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        if api_key.trim().is_empty() {
            return Err(AppError::Validation("missing embedding API key".into()));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| AppError::Validation("embedding API key is not a valid header".into()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_owned(),
            dimensions,
        })
    }

    pub fn dimensions(&self) -> u32 {
        self.dimensions
    }

    /// Embeds a batch of texts, one vector per input in input order.
    pub async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.dimensions,
        };

        let response = self.http.post(&self.endpoint).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(AppError::Embedding(format!(
                "embedding request failed ({status}): {body}"
            )));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("unreadable embedding response: {e}")))?;

        if parsed.data.len() != inputs.len() {
            return Err(AppError::Embedding(format!(
                "service returned {} embeddings for {} inputs",
                parsed.data.len(),
                inputs.len()
            )));
        }
        parsed.data.sort_by_key(|entry| entry.index);

        debug!(
            inputs = inputs.len(),
            model = %self.model,
            "embedded batch"
        );

        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }

    /// Embeds a single string, typically a user query.
    pub async fn embed_one(&self, input: &str) -> Result<Vec<f32>, AppError> {
        let mut vectors = self.embed_batch(&[input.to_owned()]).await?;
        vectors
            .pop()
            .ok_or_else(|| AppError::Embedding("no embedding data received".into()))
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: u32,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
