use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::bracket::{BracketIssue, RoundColumn};
use crate::models::TournamentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BracketState {
    /// No matches created yet
    Empty,
    Ready,
}

#[derive(Debug, Serialize)]
pub struct BracketResponse {
    pub tournament_id: TournamentId,
    pub tournament_title: String,
    pub state: BracketState,
    pub total_rounds: u32,
    pub rounds: Vec<RoundColumn>,
    pub issues: Vec<BracketIssue>,
    pub refreshed_at: DateTime<Utc>,
}

pub async fn get_bracket(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
) -> Result<Json<BracketResponse>, ApiError> {
    let tournament = state
        .backend
        .get_tournament(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Tournament '{}' not found", id)))?;

    let snapshot = state.brackets.get_or_fetch(&id).await?;
    let bracket = &snapshot.bracket;

    Ok(Json(BracketResponse {
        tournament_id: id,
        tournament_title: tournament.title,
        state: if bracket.is_empty() {
            BracketState::Empty
        } else {
            BracketState::Ready
        },
        total_rounds: bracket.total_rounds,
        rounds: bracket.rounds.clone(),
        issues: snapshot.issues.clone(),
        refreshed_at: snapshot.refreshed_at,
    }))
}
