pub mod chunker;
pub mod pipeline;
pub mod source;

use std::path::PathBuf;
use std::sync::Arc;

pub use pipeline::{IngestionPipeline, IngestionReport, PipelineServices};
pub use source::Document;

use common::error::AppError;
use tokio::time::{sleep, Duration};
use tracing::info;

/// Loads documents and runs ingestion passes. With an interval the loop runs
/// forever, refreshing the index on each tick; without one it performs a
/// single pass and returns. Re-reading the file each pass picks up new
/// documents, and idempotent point ids make repeated passes safe.
pub async fn run_worker_loop(
    pipeline: Arc<IngestionPipeline>,
    documents_path: PathBuf,
    interval: Option<Duration>,
) -> Result<(), AppError> {
    loop {
        let documents = source::load_documents(&documents_path)?;
        info!(documents = documents.len(), path = %documents_path.display(), "starting ingestion pass");

        let report = pipeline.run(&documents).await?;
        info!(
            indexed = report.documents_indexed,
            failed = report.documents_failed,
            points = report.points_upserted,
            "ingestion pass complete"
        );

        match interval {
            Some(delay) => sleep(delay).await,
            None => return Ok(()),
        }
    }
}
