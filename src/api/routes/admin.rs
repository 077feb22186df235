use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::admin::{self, AdminProfileEdit, CreateMatch, UserWithRoles};
use crate::api::auth::Session;
use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::{
    AppRole, Match, MatchId, MatchUpdate, Profile, Tournament, TournamentDraft, TournamentId,
    UserId, UserRole,
};

pub async fn list_tournaments(
    State(state): State<AppState>,
    Session(session): Session,
) -> Result<Json<Vec<Tournament>>, ApiError> {
    Ok(Json(
        admin::list_tournaments(state.backend.as_ref(), &session).await?,
    ))
}

pub async fn create_tournament(
    State(state): State<AppState>,
    Session(session): Session,
    Json(draft): Json<TournamentDraft>,
) -> Result<(StatusCode, Json<Tournament>), ApiError> {
    let tournament = admin::create_tournament(state.backend.as_ref(), &session, draft).await?;
    Ok((StatusCode::CREATED, Json(tournament)))
}

pub async fn update_tournament(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<TournamentId>,
    Json(draft): Json<TournamentDraft>,
) -> Result<Json<Tournament>, ApiError> {
    Ok(Json(
        admin::update_tournament(state.backend.as_ref(), &session, &id, draft).await?,
    ))
}

pub async fn delete_tournament(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<TournamentId>,
) -> Result<StatusCode, ApiError> {
    admin::delete_tournament(state.backend.as_ref(), &session, &id).await?;
    state.brackets.forget(&id).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_matches(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<TournamentId>,
) -> Result<Json<Vec<Match>>, ApiError> {
    Ok(Json(
        admin::list_matches(state.backend.as_ref(), &session, &id).await?,
    ))
}

pub async fn create_match(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<TournamentId>,
    options: Option<Json<CreateMatch>>,
) -> Result<(StatusCode, Json<Match>), ApiError> {
    let options = options.map(|Json(o)| o).unwrap_or_default();
    let m = admin::create_match(state.backend.as_ref(), &session, &id, options).await?;
    Ok((StatusCode::CREATED, Json(m)))
}

pub async fn update_match(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<MatchId>,
    Json(update): Json<MatchUpdate>,
) -> Result<Json<Match>, ApiError> {
    Ok(Json(
        admin::update_match(state.backend.as_ref(), &session, &id, update).await?,
    ))
}

pub async fn delete_match(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<MatchId>,
) -> Result<StatusCode, ApiError> {
    admin::delete_match(state.backend.as_ref(), &session, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct UserSearchParams {
    #[serde(default)]
    pub q: String,
}

pub async fn list_users(
    State(state): State<AppState>,
    Session(session): Session,
    Query(params): Query<UserSearchParams>,
) -> Result<Json<Vec<UserWithRoles>>, ApiError> {
    Ok(Json(
        admin::list_users(state.backend.as_ref(), &session, &params.q).await?,
    ))
}

pub async fn update_user_profile(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<UserId>,
    Json(edit): Json<AdminProfileEdit>,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(
        admin::update_user_profile(state.backend.as_ref(), &session, &id, edit).await?,
    ))
}

fn parse_role(role: &str) -> Result<AppRole, ApiError> {
    role.parse()
        .map_err(|_| ApiError::BadRequest(format!("Unknown role '{}'", role)))
}

pub async fn grant_role(
    State(state): State<AppState>,
    Session(session): Session,
    Path((id, role)): Path<(UserId, String)>,
) -> Result<(StatusCode, Json<UserRole>), ApiError> {
    let role = parse_role(&role)?;
    let row = admin::grant_role(state.backend.as_ref(), &session, &id, role).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn revoke_role(
    State(state): State<AppState>,
    Session(session): Session,
    Path((id, role)): Path<(UserId, String)>,
) -> Result<StatusCode, ApiError> {
    let role = parse_role(&role)?;
    admin::revoke_role(state.backend.as_ref(), &session, &id, role).await?;
    Ok(StatusCode::NO_CONTENT)
}
