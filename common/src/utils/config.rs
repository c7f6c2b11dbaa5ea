use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::AppError;

/// Knobs for the chunk/embed/retrieve/generate path. Defaults mirror the
/// values the service ships with; any of them can be overridden from the
/// config file.
#[derive(Clone, Deserialize, Debug)]
#[serde(default)]
pub struct RagTuning {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_chunks: usize,
    pub batch_size: usize,
    pub max_attempts: u32,
    pub retry_delays_ms: Vec<u64>,
    pub top_k: usize,
    pub score_threshold: f32,
    pub embedding_dimensions: u32,
    pub max_document_chars: usize,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for RagTuning {
    fn default() -> Self {
        Self {
            chunk_size: 1200,
            chunk_overlap: 200,
            max_chunks: 100,
            batch_size: 32,
            max_attempts: 4,
            retry_delays_ms: vec![400, 800, 1600, 3200],
            top_k: 4,
            score_threshold: 0.0,
            embedding_dimensions: 1536,
            max_document_chars: 100_000,
            temperature: 0.2,
            max_output_tokens: 1024,
        }
    }
}

impl RagTuning {
    /// Rejects settings that would make the chunk cursor stall or the retry
    /// loop degenerate. An overlap at or above the chunk size is a
    /// configuration error, not something to clamp around.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.chunk_size == 0 {
            return Err(AppError::Validation("chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Validation(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.max_chunks == 0 {
            return Err(AppError::Validation("max_chunks must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(AppError::Validation("batch_size must be positive".into()));
        }
        if self.max_attempts == 0 {
            return Err(AppError::Validation("max_attempts must be positive".into()));
        }
        if self.retry_delays_ms.is_empty() {
            return Err(AppError::Validation(
                "retry_delays_ms must contain at least one delay".into(),
            ));
        }
        if self.embedding_dimensions == 0 {
            return Err(AppError::Validation(
                "embedding_dimensions must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_query_model")]
    pub query_model: String,
    #[serde(default = "default_fallback_query_model")]
    pub fallback_query_model: String,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default)]
    pub qdrant_api_key: Option<String>,
    #[serde(default = "default_collection")]
    pub qdrant_collection: String,
    pub http_port: u16,
    /// JSON-lines file with the documents to index. Required for the worker,
    /// unused by a server-only process.
    #[serde(default)]
    pub documents_path: Option<String>,
    /// Re-run ingestion this often; absent means a single pass.
    #[serde(default)]
    pub ingest_interval_secs: Option<u64>,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub tuning: RagTuning,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_query_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_fallback_query_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_collection() -> String {
    "articles".to_string()
}

fn default_session_ttl_secs() -> u64 {
    1800
}

fn default_request_timeout_secs() -> u64 {
    30
}

pub fn get_config() -> Result<AppConfig, AppError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    let config: AppConfig = config.try_deserialize()?;
    config.tuning.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tuning_is_valid() {
        RagTuning::default().validate().expect("defaults must pass");
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let tuning = RagTuning {
            chunk_size: 100,
            chunk_overlap: 100,
            ..RagTuning::default()
        };
        assert!(matches!(
            tuning.validate(),
            Err(AppError::Validation(msg)) if msg.contains("chunk_overlap")
        ));

        let tuning = RagTuning {
            chunk_size: 100,
            chunk_overlap: 150,
            ..RagTuning::default()
        };
        assert!(tuning.validate().is_err());
    }

    #[test]
    fn empty_retry_schedule_is_rejected() {
        let tuning = RagTuning {
            retry_delays_ms: Vec::new(),
            ..RagTuning::default()
        };
        assert!(tuning.validate().is_err());
    }
}
