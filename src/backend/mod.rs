//! Data backend abstraction.
//!
//! Every row lives in a hosted database-as-a-service. This trait is the only
//! way the rest of the crate reaches it:
//! - `RestBackend`: PostgREST-style HTTP API with auth and object storage
//! - `MemoryBackend`: in-process tables for local runs and tests

mod memory;
mod rest;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    AppRole, Match, MatchId, MatchUpdate, NewMatch, Profile, ProfileUpdate, Registration,
    Tournament, TournamentDraft, TournamentId, UserId, UserRole,
};
use crate::session::AuthUser;

pub use memory::MemoryBackend;
pub use rest::{RestBackend, RestBackendConfig};

/// Bucket holding profile pictures.
pub const AVATAR_BUCKET: &str = "avatars";

/// Errors that can occur talking to the data backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid or expired access token")]
    Unauthorized,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("API key is not a valid header value")]
    InvalidApiKey,
}

/// Ordering for tournament listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TournamentOrder {
    /// Soonest first, as on the landing page.
    #[default]
    StartDateAsc,
    /// Newest first, as in the admin console.
    CreatedDesc,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TournamentQuery {
    pub order: TournamentOrder,
    pub limit: Option<usize>,
}

/// Trait for data backends.
#[async_trait]
pub trait DataBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Resolve a bearer access token to the signed-in user.
    async fn user_for_token(&self, token: &str) -> Result<AuthUser, BackendError>;

    async fn list_tournaments(&self, query: TournamentQuery)
        -> Result<Vec<Tournament>, BackendError>;

    async fn get_tournament(&self, id: &TournamentId) -> Result<Option<Tournament>, BackendError>;

    async fn insert_tournament(
        &self,
        draft: TournamentDraft,
        created_by: Option<UserId>,
    ) -> Result<Tournament, BackendError>;

    async fn update_tournament(
        &self,
        id: &TournamentId,
        draft: TournamentDraft,
    ) -> Result<Tournament, BackendError>;

    async fn set_current_players(&self, id: &TournamentId, count: u32)
        -> Result<(), BackendError>;

    async fn delete_tournament(&self, id: &TournamentId) -> Result<(), BackendError>;

    /// All matches of a tournament. No ordering is guaranteed.
    async fn list_matches(&self, tournament_id: &TournamentId) -> Result<Vec<Match>, BackendError>;

    async fn get_match(&self, id: &MatchId) -> Result<Option<Match>, BackendError>;

    async fn insert_match(&self, new: NewMatch) -> Result<Match, BackendError>;

    async fn update_match(&self, id: &MatchId, update: &MatchUpdate)
        -> Result<Match, BackendError>;

    async fn delete_match(&self, id: &MatchId) -> Result<(), BackendError>;

    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>, BackendError>;

    /// All profiles, newest first.
    async fn list_profiles(&self) -> Result<Vec<Profile>, BackendError>;

    async fn update_profile(
        &self,
        user_id: &UserId,
        update: &ProfileUpdate,
    ) -> Result<Profile, BackendError>;

    async fn find_registration(
        &self,
        tournament_id: &TournamentId,
        user_id: &UserId,
    ) -> Result<Option<Registration>, BackendError>;

    /// A user's registrations, newest first.
    async fn list_registrations_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Registration>, BackendError>;

    async fn insert_registration(
        &self,
        registration: Registration,
    ) -> Result<Registration, BackendError>;

    async fn roles_for_user(&self, user_id: &UserId) -> Result<Vec<AppRole>, BackendError>;

    async fn list_roles(&self) -> Result<Vec<UserRole>, BackendError>;

    async fn grant_role(&self, user_id: &UserId, role: AppRole) -> Result<UserRole, BackendError>;

    async fn revoke_role(&self, user_id: &UserId, role: AppRole) -> Result<(), BackendError>;

    /// Store an object and return its public URL. Existing objects at the
    /// same path are replaced.
    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError>;
}
