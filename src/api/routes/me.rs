use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::api::auth::Session;
use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::Profile;
use crate::profile::{self, ProfileForm};
use crate::registration::{self, Dashboard};
use crate::session::AuthUser;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub signed_in: bool,
    pub user: Option<AuthUser>,
    pub is_admin: bool,
    pub is_owner: bool,
}

pub async fn session(Session(session): Session) -> Json<SessionResponse> {
    Json(SessionResponse {
        signed_in: session.user().is_some(),
        user: session.user().cloned(),
        is_admin: session.is_admin(),
        is_owner: session.is_owner(),
    })
}

pub async fn dashboard(
    State(state): State<AppState>,
    Session(session): Session,
) -> Result<Json<Dashboard>, ApiError> {
    let user = session.require_user()?;
    Ok(Json(
        registration::dashboard(state.backend.as_ref(), &user.id).await?,
    ))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Session(session): Session,
) -> Result<Json<Profile>, ApiError> {
    let user = session.require_user()?;
    Ok(Json(
        profile::load_profile(state.backend.as_ref(), &user.id).await?,
    ))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Session(session): Session,
    Json(form): Json<ProfileForm>,
) -> Result<Json<Profile>, ApiError> {
    let user = session.require_user()?;
    Ok(Json(
        profile::update_profile(state.backend.as_ref(), &user.id, &form).await?,
    ))
}

/// Raw image bytes in the body, type in `Content-Type`.
pub async fn upload_avatar(
    State(state): State<AppState>,
    Session(session): Session,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Profile>, ApiError> {
    let user = session.require_user()?;
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Content-Type header is required".to_string()))?;

    Ok(Json(
        profile::upload_avatar(state.backend.as_ref(), &user.id, body.to_vec(), content_type)
            .await?,
    ))
}
