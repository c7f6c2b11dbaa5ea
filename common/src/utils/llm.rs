use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    StatusCode,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{error::AppError, utils::config::AppConfig};

/// One remote generation call gone wrong. Keeps the HTTP status around so the
/// orchestrator can decide between retrying and falling back.
#[derive(Error, Debug)]
pub enum GenerationCallError {
    #[error("generation request failed ({status}): {body}")]
    Status { status: StatusCode, body: String },
    #[error("generation transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed generation response: {0}")]
    Malformed(String),
}

impl GenerationCallError {
    /// Transient errors: rate limits, the 5xx family, and transport-level
    /// timeouts/connect failures. Everything else aborts the current model.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS
                    || matches!(status.as_u16(), 500 | 502 | 503 | 504)
            }
            Self::Transport(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            Self::Malformed(_) => false,
        }
    }
}

/// Fixed sampling configuration carried on every generation call.
#[derive(Debug, Clone, Copy)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl SamplingConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            temperature: config.tuning.temperature,
            max_output_tokens: config.tuning.max_output_tokens,
        }
    }
}

/// Client for an OpenAI-compatible chat-completions endpoint. Performs one
/// request per call; retry and fallback policy live with the caller.
pub struct LlmClient {
    http: reqwest::Client,
    endpoint: String,
    sampling: SamplingConfig,
}

impl LlmClient {
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(
            &config.openai_api_key,
            &config.openai_base_url,
            SamplingConfig::from_config(config),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn new(
        api_key: &str,
        base_url: &str,
        sampling: SamplingConfig,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        if api_key.trim().is_empty() {
            return Err(AppError::Validation("missing generation API key".into()));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|_| {
                AppError::Validation("generation API key is not a valid header".into())
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            sampling,
        })
    }

    /// Sends a single user-role prompt to the given model and returns the
    /// plain-text completion.
    pub async fn complete(&self, model: &str, prompt: &str) -> Result<String, GenerationCallError> {
        let request = ChatRequest {
            model,
            temperature: self.sampling.temperature,
            max_tokens: self.sampling.max_output_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self.http.post(&self.endpoint).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(GenerationCallError::Status { status, body });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationCallError::Malformed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GenerationCallError::Malformed("response carried no choices".into()))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_retriable() {
        for code in [429u16, 500, 502, 503, 504] {
            let err = GenerationCallError::Status {
                status: StatusCode::from_u16(code).expect("valid status"),
                body: String::new(),
            };
            assert!(err.is_retriable(), "{code} should be retriable");
        }
    }

    #[test]
    fn client_errors_are_permanent() {
        for code in [400u16, 401, 403, 404, 422] {
            let err = GenerationCallError::Status {
                status: StatusCode::from_u16(code).expect("valid status"),
                body: String::new(),
            };
            assert!(!err.is_retriable(), "{code} should abort the model");
        }
    }

    #[test]
    fn malformed_responses_are_permanent() {
        let err = GenerationCallError::Malformed("missing choices".into());
        assert!(!err.is_retriable());
    }
}
