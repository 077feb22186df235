use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub backend: &'static str,
    pub mailer: &'static str,
    pub watched_topics: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        backend: state.backend.name(),
        mailer: state.mailer.name(),
        watched_topics: state.feed.active_topics().len(),
    })
}
