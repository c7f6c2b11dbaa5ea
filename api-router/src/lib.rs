use api_state::ApiState;
use axum::{
    extract::FromRef,
    routing::{delete, get, post},
    Router,
};
use routes::{
    chat::{chat, chat_history, delete_chat_session},
    liveness::live,
    readiness::ready,
};

pub mod api_state;
pub mod error;
mod routes;

/// Router for API functionality, version 1
pub fn api_routes_v1<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Probe endpoints (for k8s/systemd) plus the chat surface
    Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live))
        .route("/chat", post(chat))
        .route("/chat/history", get(chat_history))
        .route("/chat/session", delete(delete_chat_session))
}
