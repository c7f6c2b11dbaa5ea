use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use common::storage::session::{SessionTurn, TurnRole};
use retrieval_pipeline::{prompt::build_grounded_prompt, RetrievalResult};

use crate::{api_state::ApiState, error::ApiError};

pub const SESSION_COOKIE: &str = "rag_session";

/// Shown when nothing relevant is indexed; generation is skipped entirely.
const EMPTY_CONTEXT_REPLY: &str =
    "I could not find anything in the indexed articles that relates to your question. \
     Try rephrasing it, or ask about another topic.";

/// Shown instead of a hard failure when a backend misbehaves mid-request.
const DEGRADED_REPLY: &str =
    "I ran into a temporary problem while preparing an answer. Please try again in a moment.";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatSource {
    pub id: String,
    pub title: String,
    pub url: String,
    pub score: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: String,
    pub sources: Vec<ChatSource>,
    pub session_id: String,
}

/// How a chat request resolved. Degraded outcomes deliberately replace
/// backend failures with a stable reply; the cause is logged server-side.
enum ChatOutcome {
    Answered {
        reply: String,
        sources: Vec<ChatSource>,
    },
    EmptyContext,
    Degraded,
}

pub async fn chat(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(input): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = input.message.trim().to_owned();
    if message.is_empty() {
        return Err(ApiError::ValidationError("message must not be empty".into()));
    }

    let (session_id, is_new_session) = resolve_session_id(&headers);

    let (reply, sources) = match answer_message(&state, &message).await {
        ChatOutcome::Answered { reply, sources } => (reply, sources),
        ChatOutcome::EmptyContext => (EMPTY_CONTEXT_REPLY.to_owned(), Vec::new()),
        ChatOutcome::Degraded => (DEGRADED_REPLY.to_owned(), Vec::new()),
    };

    state
        .sessions
        .append(
            &session_id,
            SessionTurn {
                role: TurnRole::User,
                content: message,
            },
        )
        .await;
    state
        .sessions
        .append(
            &session_id,
            SessionTurn {
                role: TurnRole::Assistant,
                content: reply.clone(),
            },
        )
        .await;

    let mut response_headers = HeaderMap::new();
    if is_new_session {
        if let Ok(value) = HeaderValue::from_str(&format!(
            "{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax"
        )) {
            response_headers.insert(header::SET_COOKIE, value);
        }
    }

    Ok((
        response_headers,
        Json(ChatResponse {
            reply,
            sources,
            session_id,
        }),
    ))
}

/// Runs retrieve -> prompt -> generate and classifies the result. Backend
/// errors never escape as HTTP failures; the caller maps each variant to a
/// stable user-facing reply.
async fn answer_message(state: &ApiState, message: &str) -> ChatOutcome {
    let results = match state.retrieval.retrieve(message, state.config.tuning.top_k).await {
        Ok(results) => results,
        Err(err) => {
            error!(error = %err, "retrieval failed; serving degraded reply");
            return ChatOutcome::Degraded;
        }
    };

    if results.is_empty() {
        info!("no retrieval results; serving empty-context reply");
        return ChatOutcome::EmptyContext;
    }

    let prompt = build_grounded_prompt(message, &results);
    match state.generation.generate(&prompt).await {
        Ok(reply) => ChatOutcome::Answered {
            reply,
            sources: source_labels(&results),
        },
        Err(err) => {
            error!(error = %err, "generation failed; serving degraded reply");
            ChatOutcome::Degraded
        }
    }
}

/// Labels results S1, S2, ... in ranking order, matching the citation labels
/// the prompt hands to the model.
fn source_labels(results: &[RetrievalResult]) -> Vec<ChatSource> {
    results
        .iter()
        .enumerate()
        .map(|(position, result)| ChatSource {
            id: format!("S{}", position + 1),
            title: result.title.clone(),
            url: result.url.clone(),
            score: result.score,
        })
        .collect()
}

/// Reads the session cookie, issuing a fresh id when absent.
fn resolve_session_id(headers: &HeaderMap) -> (String, bool) {
    match existing_session_id(headers) {
        Some(id) => (id, false),
        None => (Uuid::new_v4().to_string(), true),
    }
}

fn existing_session_id(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_owned())
    })
}

pub async fn chat_history(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Json<Vec<SessionTurn>> {
    match existing_session_id(&headers) {
        Some(session_id) => Json(state.sessions.history(&session_id).await),
        None => Json(Vec::new()),
    }
}

pub async fn delete_chat_session(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> StatusCode {
    if let Some(session_id) = existing_session_id(&headers) {
        state.sessions.delete(&session_id).await;
    }
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(score: f32, title: &str) -> RetrievalResult {
        RetrievalResult {
            score,
            title: title.to_owned(),
            text: format!("{title} body"),
            url: format!("https://news.example/{title}"),
        }
    }

    #[test]
    fn sources_are_labelled_in_ranking_order() {
        let results = vec![result(0.81, "A"), result(0.77, "B"), result(0.65, "C")];
        let sources = source_labels(&results);

        let labels: Vec<(&str, &str)> = sources
            .iter()
            .map(|s| (s.id.as_str(), s.title.as_str()))
            .collect();
        assert_eq!(labels, vec![("S1", "A"), ("S2", "B"), ("S3", "C")]);
        assert!((sources[0].score - 0.81).abs() < f32::EPSILON);
    }

    #[test]
    fn session_cookie_is_parsed_from_the_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; rag_session=abc-123; other=1"),
        );
        assert_eq!(existing_session_id(&headers), Some("abc-123".to_owned()));

        let (id, is_new) = resolve_session_id(&headers);
        assert_eq!(id, "abc-123");
        assert!(!is_new);
    }

    #[test]
    fn missing_cookie_issues_a_fresh_session() {
        let headers = HeaderMap::new();
        assert_eq!(existing_session_id(&headers), None);

        let (id, is_new) = resolve_session_id(&headers);
        assert!(is_new);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn empty_cookie_value_counts_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("rag_session="));
        assert_eq!(existing_session_id(&headers), None);
    }
}
