//! REST API endpoints.
//!
//! Axum-based HTTP API for tournaments, brackets, registration, the player
//! dashboard, the contact form and the admin console.

pub mod auth;
pub mod routes;
pub mod state;

use std::path::Path;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::admin::AdminError;
use crate::backend::BackendError;
use crate::config::ServerConfig;
use crate::contact::ContactError;
use crate::profile::{ProfileError, MAX_AVATAR_BYTES};
use crate::registration::RegistrationError;
use crate::session::SessionError;
use crate::validation::FieldError;

use state::AppState;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let message = self.to_string();
        let fields = match self {
            ApiError::Validation(fields) => fields,
            _ => Vec::new(),
        };
        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                fields,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<BackendError> for ApiError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::NotFound(what) => ApiError::NotFound(what),
            BackendError::Conflict(what) => ApiError::Conflict(what),
            BackendError::Unauthorized => ApiError::Unauthorized(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotSignedIn => ApiError::Unauthorized(e.to_string()),
            SessionError::Forbidden(msg) => ApiError::Forbidden(msg.to_string()),
        }
    }
}

impl From<RegistrationError> for ApiError {
    fn from(e: RegistrationError) -> Self {
        match e {
            RegistrationError::NotSignedIn => ApiError::Unauthorized(e.to_string()),
            RegistrationError::MissingField(_) => ApiError::BadRequest(e.to_string()),
            RegistrationError::TournamentNotFound(_) => ApiError::NotFound(e.to_string()),
            RegistrationError::TournamentFull | RegistrationError::AlreadyRegistered => {
                ApiError::Conflict(e.to_string())
            }
            RegistrationError::Backend(inner) => inner.into(),
        }
    }
}

impl From<AdminError> for ApiError {
    fn from(e: AdminError) -> Self {
        match e {
            AdminError::NotSignedIn => ApiError::Unauthorized(e.to_string()),
            AdminError::Forbidden(msg) => ApiError::Forbidden(msg),
            AdminError::NotFound(what) => ApiError::NotFound(what),
            AdminError::Conflict(msg) => ApiError::Conflict(msg),
            AdminError::Invalid(msg) => ApiError::BadRequest(msg),
            AdminError::Backend(inner) => inner.into(),
        }
    }
}

impl From<ProfileError> for ApiError {
    fn from(e: ProfileError) -> Self {
        match e {
            ProfileError::Invalid(fields) => ApiError::Validation(fields),
            ProfileError::NotFound(_) => ApiError::NotFound(e.to_string()),
            ProfileError::UnsupportedImage(_) | ProfileError::AvatarSize => {
                ApiError::BadRequest(e.to_string())
            }
            ProfileError::Backend(inner) => inner.into(),
        }
    }
}

impl From<ContactError> for ApiError {
    fn from(e: ContactError) -> Self {
        match e {
            ContactError::Invalid(fields) => ApiError::Validation(fields),
            ContactError::Mail(_) => ApiError::Internal(e.to_string()),
        }
    }
}

/// Pagination parameters.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 50,
        }
    }
}

impl Pagination {
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(50).clamp(1, 100),
        }
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// The slice of `items` on this page.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = (self.offset() as usize).min(items.len());
        let end = (start + self.page_size as usize).min(items.len());
        &items[start..end]
    }
}

/// Pagination metadata in responses.
#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub page_size: u32,
    pub total_items: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationMeta {
    pub fn new(pagination: &Pagination, total_items: u32) -> Self {
        let total_pages = total_items.div_ceil(pagination.page_size);
        Self {
            page: pagination.page,
            page_size: pagination.page_size,
            total_items,
            total_pages,
            has_next: pagination.page < total_pages,
            has_prev: pagination.page > 1,
        }
    }
}

fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origin == "*" {
        return cors.allow_origin(Any);
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => cors.allow_origin(value),
        Err(_) => {
            warn!("Ignoring invalid CORS origin {:?}, allowing any", origin);
            cors.allow_origin(Any)
        }
    }
}

/// Serve a prebuilt single-page frontend; unknown paths get `index.html`.
fn static_files(dir: &Path) -> ServeDir<ServeFile> {
    ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")))
}

/// Build the application router.
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    use routes::{admin, bracket, contact, health, me, tournaments};

    let api = Router::new()
        .route("/api/health", get(health::health))
        .route("/api/tournaments", get(tournaments::list_tournaments))
        .route("/api/tournaments/:id", get(tournaments::get_tournament))
        .route("/api/tournaments/:id/bracket", get(bracket::get_bracket))
        .route("/api/tournaments/:id/register", post(tournaments::register))
        .route(
            "/api/tournaments/:id/registration",
            get(tournaments::registration_status),
        )
        .route("/api/me/session", get(me::session))
        .route("/api/me/dashboard", get(me::dashboard))
        .route("/api/me/profile", get(me::get_profile).put(me::update_profile))
        .route(
            "/api/me/avatar",
            put(me::upload_avatar).layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES + 1024)),
        )
        .route("/api/contact", post(contact::submit))
        .route(
            "/api/admin/tournaments",
            get(admin::list_tournaments).post(admin::create_tournament),
        )
        .route(
            "/api/admin/tournaments/:id",
            put(admin::update_tournament).delete(admin::delete_tournament),
        )
        .route(
            "/api/admin/tournaments/:id/matches",
            get(admin::list_matches).post(admin::create_match),
        )
        .route(
            "/api/admin/matches/:id",
            put(admin::update_match).delete(admin::delete_match),
        )
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/:id/profile", put(admin::update_user_profile))
        .route(
            "/api/admin/users/:id/roles/:role",
            post(admin::grant_role).delete(admin::revoke_role),
        )
        .with_state(state);

    let app = match server.static_dir {
        Some(ref dir) => api.fallback_service(static_files(dir)),
        None => api,
    };

    app.layer(cors_layer(&server.cors_origin))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::util::ServiceExt;

    use super::state::AppState;
    use crate::backend::MemoryBackend;
    use crate::config::{AppConfig, ServerConfig};
    use crate::contact::LogMailer;
    use crate::realtime::ChangeFeed;

    pub struct TestApp {
        pub backend: Arc<MemoryBackend>,
        pub mailer: Arc<LogMailer>,
        pub state: AppState,
    }

    impl TestApp {
        pub fn new() -> Self {
            let feed = ChangeFeed::new();
            let backend = Arc::new(MemoryBackend::new().with_feed(feed.clone()));
            let mailer = Arc::new(LogMailer::new());
            let state = AppState::new(
                backend.clone(),
                feed,
                mailer.clone(),
                AppConfig::default().contact_settings(),
            );
            Self {
                backend,
                mailer,
                state,
            }
        }

        pub fn router(&self) -> axum::Router {
            super::build_router(self.state.clone(), &ServerConfig::default())
        }

        pub async fn call(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header("authorization", format!("Bearer {}", token));
            }
            let body = match body {
                Some(json) => {
                    builder = builder.header("content-type", "application/json");
                    Body::from(json.to_string())
                }
                None => Body::empty(),
            };
            let resp = self
                .router()
                .oneshot(builder.body(body).unwrap())
                .await
                .unwrap();
            let status = resp.status();
            let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
                .await
                .unwrap();
            let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
            (status, json)
        }

        pub async fn get_json(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
            self.call("GET", uri, token, None).await
        }
    }
}
