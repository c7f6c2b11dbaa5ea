use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use common::{
    error::AppError,
    storage::vector::{deterministic_point_id, ArticlePayload, IndexPoint, VectorStore},
    utils::{config::RagTuning, embedding::EmbeddingClient},
};

use crate::{
    chunker::{self, ChunkerSettings},
    source::Document,
};

/// Remote operations the pipeline depends on. The default implementation is
/// backed by the real clients; tests swap in scripted ones.
#[async_trait]
pub trait PipelineServices: Send + Sync {
    async fn ensure_collection(&self) -> Result<(), AppError>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError>;
    async fn upsert(&self, points: Vec<IndexPoint>) -> Result<(), AppError>;
}

pub struct DefaultPipelineServices {
    embedding: Arc<EmbeddingClient>,
    store: Arc<VectorStore>,
}

impl DefaultPipelineServices {
    pub fn new(embedding: Arc<EmbeddingClient>, store: Arc<VectorStore>) -> Self {
        Self { embedding, store }
    }
}

#[async_trait]
impl PipelineServices for DefaultPipelineServices {
    async fn ensure_collection(&self) -> Result<(), AppError> {
        self.store.ensure_collection().await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        self.embedding.embed_batch(texts).await
    }

    async fn upsert(&self, points: Vec<IndexPoint>) -> Result<(), AppError> {
        self.store.upsert(&points).await
    }
}

/// Outcome of one ingestion pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestionReport {
    pub documents_indexed: usize,
    pub documents_failed: usize,
    pub points_upserted: usize,
}

/// Drives documents through truncate -> chunk -> batched embed -> batched
/// upsert. Point ids are derived from (url, chunk index), so re-running a
/// pass overwrites rather than duplicates; that makes re-ingestion the
/// recovery path for partially failed documents.
pub struct IngestionPipeline {
    services: Arc<dyn PipelineServices>,
    chunker: ChunkerSettings,
    tuning: RagTuning,
}

impl IngestionPipeline {
    pub fn new(
        embedding: Arc<EmbeddingClient>,
        store: Arc<VectorStore>,
        tuning: RagTuning,
    ) -> Result<Self, AppError> {
        Self::with_services(Arc::new(DefaultPipelineServices::new(embedding, store)), tuning)
    }

    pub fn with_services(
        services: Arc<dyn PipelineServices>,
        tuning: RagTuning,
    ) -> Result<Self, AppError> {
        tuning.validate()?;
        let chunker = ChunkerSettings::from_tuning(&tuning)?;
        Ok(Self {
            services,
            chunker,
            tuning,
        })
    }

    /// Runs one ingestion pass. A failing document aborts only its own
    /// remaining batches; batches already upserted for it stay committed and
    /// the pass moves on to the next document.
    pub async fn run(&self, documents: &[Document]) -> Result<IngestionReport, AppError> {
        self.services.ensure_collection().await?;

        let mut report = IngestionReport::default();
        for document in documents {
            match self.ingest_document(document).await {
                Ok(points) => {
                    report.documents_indexed += 1;
                    report.points_upserted += points;
                    info!(url = %document.url, points, "document indexed");
                }
                Err(err) => {
                    report.documents_failed += 1;
                    error!(url = %document.url, error = %err, "document ingestion failed; continuing");
                }
            }
        }

        Ok(report)
    }

    async fn ingest_document(&self, document: &Document) -> Result<usize, AppError> {
        let text = self.truncated_text(document);
        let chunks = chunker::chunk(&text, self.chunker);

        let expected_dimensions = self.tuning.embedding_dimensions as usize;
        let mut upserted = 0;
        for (batch_index, batch) in chunks.chunks(self.tuning.batch_size).enumerate() {
            let vectors = self.services.embed_batch(batch).await?;
            if let Some(vector) = vectors.iter().find(|v| v.len() != expected_dimensions) {
                return Err(AppError::Embedding(format!(
                    "embedding dimension {} does not match the collection size {expected_dimensions}",
                    vector.len()
                )));
            }
            let points: Vec<IndexPoint> = batch
                .iter()
                .zip(vectors)
                .enumerate()
                .map(|(offset, (chunk_text, vector))| {
                    let chunk_index = batch_index * self.tuning.batch_size + offset;
                    IndexPoint {
                        id: deterministic_point_id(&document.url, chunk_index),
                        vector,
                        payload: ArticlePayload {
                            url: document.url.clone(),
                            title: document.title.clone(),
                            text: chunk_text.clone(),
                        },
                    }
                })
                .collect();
            self.services.upsert(points).await?;
            upserted += batch.len();
        }

        Ok(upserted)
    }

    /// Caps document length before chunking. Losing the tail of an oversized
    /// document is accepted policy, logged rather than failed.
    fn truncated_text(&self, document: &Document) -> String {
        let cap = self.tuning.max_document_chars;
        if document.text.chars().count() <= cap {
            return document.text.clone();
        }
        warn!(url = %document.url, cap, "document exceeds length cap; truncating");
        document.text.chars().take(cap).collect()
    }
}
