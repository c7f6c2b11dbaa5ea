use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use common::{
    error::AppError,
    utils::{
        config::RagTuning,
        llm::{GenerationCallError, LlmClient},
    },
};

/// A single generation attempt against one model. Implemented by the real
/// HTTP client; tests script their own.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, GenerationCallError>;
}

#[async_trait]
impl GenerationBackend for LlmClient {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, GenerationCallError> {
        LlmClient::complete(self, model, prompt).await
    }
}

/// Attempt budget and delay schedule for one model. Attempts are 1-based;
/// the schedule's last entry is reused for attempts past its length.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delays_ms: Vec<u64>,
}

impl RetryPolicy {
    pub fn from_tuning(tuning: &RagTuning) -> Self {
        Self {
            max_attempts: tuning.max_attempts,
            delays_ms: tuning.retry_delays_ms.clone(),
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let index = (attempt.saturating_sub(1) as usize).min(self.delays_ms.len() - 1);
        Duration::from_millis(self.delays_ms[index])
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    RetrySameModel(Duration),
    NextModel,
    Fail,
}

/// Pure decision function for the retry/fallback state machine: retriable
/// errors are retried on the same model until the attempt budget runs out,
/// everything else moves straight to the next candidate. With no candidate
/// left the run fails with the error at hand.
pub fn next_action(
    error: &GenerationCallError,
    attempt: u32,
    has_fallback: bool,
    policy: &RetryPolicy,
) -> NextAction {
    if error.is_retriable() && attempt < policy.max_attempts {
        return NextAction::RetrySameModel(policy.delay(attempt));
    }
    if has_fallback {
        NextAction::NextModel
    } else {
        NextAction::Fail
    }
}

/// Calls the generation service under a two-tier resilience policy: bounded
/// retries within a model, then fallback to the next candidate model.
pub struct GenerationOrchestrator {
    backend: Arc<dyn GenerationBackend>,
    models: Vec<String>,
    policy: RetryPolicy,
}

impl GenerationOrchestrator {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        primary_model: String,
        fallback_model: String,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            models: vec![primary_model, fallback_model],
            policy,
        }
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let mut last_error: Option<GenerationCallError> = None;

        for (model_index, model) in self.models.iter().enumerate() {
            let has_fallback = model_index + 1 < self.models.len();
            let mut attempt = 1u32;

            loop {
                match self.backend.complete(model, prompt).await {
                    Ok(text) => {
                        info!(model = %model, attempt, "generation succeeded");
                        return Ok(text);
                    }
                    Err(err) => {
                        warn!(model = %model, attempt, error = %err, "generation attempt failed");
                        let action = next_action(&err, attempt, has_fallback, &self.policy);
                        last_error = Some(err);
                        match action {
                            NextAction::RetrySameModel(delay) => {
                                sleep(delay).await;
                                attempt += 1;
                            }
                            NextAction::NextModel => break,
                            NextAction::Fail => {
                                return Err(Self::exhausted(last_error));
                            }
                        }
                    }
                }
            }
        }

        Err(Self::exhausted(last_error))
    }

    fn exhausted(last_error: Option<GenerationCallError>) -> AppError {
        let detail = last_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "no generation attempt was made".to_owned());
        AppError::Generation(format!("all candidate models exhausted: {detail}"))
    }
}
