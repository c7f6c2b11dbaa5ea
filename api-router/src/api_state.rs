use std::sync::Arc;

use tokio::time::Duration;

use common::{
    error::AppError,
    storage::{session::SessionStore, vector::VectorStore},
    utils::{config::AppConfig, embedding::EmbeddingClient, llm::LlmClient},
};
use retrieval_pipeline::{
    generation::{GenerationOrchestrator, RetryPolicy},
    RetrievalEngine,
};

#[derive(Clone)]
pub struct ApiState {
    pub config: AppConfig,
    pub retrieval: Arc<RetrievalEngine>,
    pub generation: Arc<GenerationOrchestrator>,
    pub sessions: Arc<SessionStore>,
    pub store: Arc<VectorStore>,
}

impl ApiState {
    /// Builds every remote client once from configuration and wires the
    /// request-path components on top of them.
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let embedding = Arc::new(EmbeddingClient::from_config(config)?);
        let store = Arc::new(VectorStore::from_config(config)?);
        let llm = Arc::new(LlmClient::from_config(config)?);

        let retrieval = Arc::new(RetrievalEngine::new(
            embedding,
            Arc::clone(&store),
            config.tuning.score_threshold,
        ));
        let generation = Arc::new(GenerationOrchestrator::new(
            llm,
            config.query_model.clone(),
            config.fallback_query_model.clone(),
            RetryPolicy::from_tuning(&config.tuning),
        ));
        let sessions = Arc::new(SessionStore::new(Duration::from_secs(
            config.session_ttl_secs,
        )));

        Ok(Self {
            config: config.clone(),
            retrieval,
            generation,
            sessions,
            store,
        })
    }
}
