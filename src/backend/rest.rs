//! HTTP backend for a hosted PostgREST database with auth and storage.
//!
//! Rows are read and written through `/rest/v1/{table}` with PostgREST
//! filter syntax (`column=eq.value`), access tokens are resolved through
//! `/auth/v1/user`, and uploads go to `/storage/v1/object/{bucket}/{path}`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use url::Url;

use super::{BackendError, DataBackend, TournamentOrder, TournamentQuery};
use crate::models::{
    AppRole, Match, MatchId, MatchStatus, MatchUpdate, NewMatch, Profile, ProfileUpdate,
    Registration, Tournament, TournamentDraft, TournamentId, UserId, UserRole,
};
use crate::session::AuthUser;

/// Connection settings for [`RestBackend`].
#[derive(Debug, Clone)]
pub struct RestBackendConfig {
    /// Project URL, e.g. `https://abc.supabase.co`
    pub base_url: Url,

    /// Key sent as `apikey` and as the default bearer token
    pub api_key: String,

    pub timeout: Duration,
}

pub struct RestBackend {
    client: Client,
    base_url: Url,
}

/// PostgREST error body.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
}

impl RestBackend {
    pub fn new(config: RestBackendConfig) -> Result<Self, BackendError> {
        let key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| BackendError::InvalidApiKey)?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|_| BackendError::InvalidApiKey)?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: with_trailing_slash(config.base_url),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.base_url.join(path)?)
    }

    fn table(&self, table: &str) -> Result<Url, BackendError> {
        self.endpoint(&format!("rest/v1/{}", table))
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, BackendError> {
        let url = self.table(table)?;
        debug!("GET {} {:?}", url, params);
        let response = self
            .client
            .get(url)
            .query(&[("select", "*")])
            .query(params)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let url = self.table(table)?;
        debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        let rows: Vec<T> = check(response).await?.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("{} insert returned no row", table)))
    }

    async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, String)],
        body: &B,
    ) -> Result<Vec<T>, BackendError> {
        let url = self.table(table)?;
        debug!("PATCH {} {:?}", url, params);
        let response = self
            .client
            .patch(url)
            .query(params)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Delete matching rows, returning how many went away.
    async fn delete(&self, table: &str, params: &[(&str, String)]) -> Result<usize, BackendError> {
        let url = self.table(table)?;
        debug!("DELETE {} {:?}", url, params);
        let response = self
            .client
            .delete(url)
            .query(params)
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = check(response).await?.json().await?;
        Ok(rows.len())
    }

    fn public_url(&self, bucket: &str, path: &str) -> Result<Url, BackendError> {
        self.endpoint(&format!("storage/v1/object/public/{}/{}", bucket, path))
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

/// Map non-success responses onto [`BackendError`].
async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized,
        StatusCode::NOT_FOUND => BackendError::NotFound(message),
        StatusCode::CONFLICT => BackendError::Conflict(message),
        _ => BackendError::Status {
            status: status.as_u16(),
            message,
        },
    })
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|e| e.message.or(e.msg).or(e.error_description))
        .unwrap_or_else(|| body.to_string())
}

fn first_or_not_found<T>(rows: Vec<T>, what: String) -> Result<T, BackendError> {
    rows.into_iter()
        .next()
        .ok_or(BackendError::NotFound(what))
}

#[async_trait]
impl DataBackend for RestBackend {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn user_for_token(&self, token: &str) -> Result<AuthUser, BackendError> {
        let url = self.endpoint("auth/v1/user")?;
        let response = self.client.get(url).bearer_auth(token).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn list_tournaments(
        &self,
        query: TournamentQuery,
    ) -> Result<Vec<Tournament>, BackendError> {
        let order = match query.order {
            TournamentOrder::StartDateAsc => "start_date.asc",
            TournamentOrder::CreatedDesc => "created_at.desc",
        };
        let mut params = vec![("order", order.to_string())];
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }
        self.select("tournaments", &params).await
    }

    async fn get_tournament(&self, id: &TournamentId) -> Result<Option<Tournament>, BackendError> {
        let rows = self.select("tournaments", &[("id", eq(id))]).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_tournament(
        &self,
        draft: TournamentDraft,
        created_by: Option<UserId>,
    ) -> Result<Tournament, BackendError> {
        let mut body = serde_json::to_value(&draft)?;
        body["created_by"] = serde_json::to_value(&created_by)?;
        self.insert("tournaments", &body).await
    }

    async fn update_tournament(
        &self,
        id: &TournamentId,
        draft: TournamentDraft,
    ) -> Result<Tournament, BackendError> {
        let mut body = serde_json::to_value(&draft)?;
        body["updated_at"] = json!(Utc::now());
        let rows = self.patch("tournaments", &[("id", eq(id))], &body).await?;
        first_or_not_found(rows, format!("tournament {}", id))
    }

    async fn set_current_players(
        &self,
        id: &TournamentId,
        count: u32,
    ) -> Result<(), BackendError> {
        let body = json!({ "current_players": count, "updated_at": Utc::now() });
        let rows: Vec<Tournament> = self.patch("tournaments", &[("id", eq(id))], &body).await?;
        first_or_not_found(rows, format!("tournament {}", id)).map(|_| ())
    }

    async fn delete_tournament(&self, id: &TournamentId) -> Result<(), BackendError> {
        match self.delete("tournaments", &[("id", eq(id))]).await? {
            0 => Err(BackendError::NotFound(format!("tournament {}", id))),
            _ => Ok(()),
        }
    }

    async fn list_matches(&self, tournament_id: &TournamentId) -> Result<Vec<Match>, BackendError> {
        self.select(
            "matches",
            &[
                ("tournament_id", eq(tournament_id)),
                ("order", "round.asc,match_number.asc".to_string()),
            ],
        )
        .await
    }

    async fn get_match(&self, id: &MatchId) -> Result<Option<Match>, BackendError> {
        let rows = self.select("matches", &[("id", eq(id))]).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_match(&self, new: NewMatch) -> Result<Match, BackendError> {
        self.insert("matches", &new).await
    }

    async fn update_match(
        &self,
        id: &MatchId,
        update: &MatchUpdate,
    ) -> Result<Match, BackendError> {
        let mut body = serde_json::to_value(update)?;
        let now = Utc::now();
        body["updated_at"] = json!(now);
        if update.status == Some(MatchStatus::Completed) {
            body["completed_at"] = json!(now);
        }
        let rows = self.patch("matches", &[("id", eq(id))], &body).await?;
        first_or_not_found(rows, format!("match {}", id))
    }

    async fn delete_match(&self, id: &MatchId) -> Result<(), BackendError> {
        match self.delete("matches", &[("id", eq(id))]).await? {
            0 => Err(BackendError::NotFound(format!("match {}", id))),
            _ => Ok(()),
        }
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>, BackendError> {
        let rows = self.select("profiles", &[("id", eq(user_id))]).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, BackendError> {
        self.select("profiles", &[("order", "created_at.desc".to_string())])
            .await
    }

    async fn update_profile(
        &self,
        user_id: &UserId,
        update: &ProfileUpdate,
    ) -> Result<Profile, BackendError> {
        let mut body = serde_json::to_value(update)?;
        body["updated_at"] = json!(Utc::now());
        let rows = self.patch("profiles", &[("id", eq(user_id))], &body).await?;
        first_or_not_found(rows, format!("profile {}", user_id))
    }

    async fn find_registration(
        &self,
        tournament_id: &TournamentId,
        user_id: &UserId,
    ) -> Result<Option<Registration>, BackendError> {
        let rows = self
            .select(
                "tournament_registrations",
                &[
                    ("tournament_id", eq(tournament_id)),
                    ("user_id", eq(user_id)),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn list_registrations_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Registration>, BackendError> {
        self.select(
            "tournament_registrations",
            &[
                ("user_id", eq(user_id)),
                ("order", "registered_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn insert_registration(
        &self,
        registration: Registration,
    ) -> Result<Registration, BackendError> {
        self.insert("tournament_registrations", &registration).await
    }

    async fn roles_for_user(&self, user_id: &UserId) -> Result<Vec<AppRole>, BackendError> {
        let rows: Vec<UserRole> = self.select("user_roles", &[("user_id", eq(user_id))]).await?;
        Ok(rows.into_iter().map(|r| r.role).collect())
    }

    async fn list_roles(&self) -> Result<Vec<UserRole>, BackendError> {
        self.select("user_roles", &[]).await
    }

    async fn grant_role(&self, user_id: &UserId, role: AppRole) -> Result<UserRole, BackendError> {
        self.insert("user_roles", &json!({ "user_id": user_id, "role": role }))
            .await
    }

    async fn revoke_role(&self, user_id: &UserId, role: AppRole) -> Result<(), BackendError> {
        self.delete(
            "user_roles",
            &[("user_id", eq(user_id)), ("role", eq(role))],
        )
        .await
        .map(|_| ())
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError> {
        let url = self.endpoint(&format!("storage/v1/object/{}/{}", bucket, path))?;
        debug!("Uploading {} bytes to {}", bytes.len(), url);
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        check(response).await?;
        Ok(self.public_url(bucket, path)?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::HeaderMap as AxumHeaders;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;

    async fn spawn_fake(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Url::parse(&format!("http://{}", addr)).unwrap()
    }

    fn backend(base_url: Url) -> RestBackend {
        RestBackend::new(RestBackendConfig {
            base_url,
            api_key: "anon-key".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_trailing_slash_keeps_project_path() {
        let url = with_trailing_slash(Url::parse("https://example.com/project").unwrap());
        assert_eq!(
            url.join("rest/v1/matches").unwrap().as_str(),
            "https://example.com/project/rest/v1/matches"
        );
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"message": "duplicate key", "code": "23505"}"#),
            "duplicate key"
        );
        assert_eq!(error_message(r#"{"msg": "bad jwt"}"#), "bad jwt");
        assert_eq!(error_message("plain text"), "plain text");
    }

    #[test]
    fn test_eq_filter() {
        assert_eq!(eq(AppRole::Owner), "eq.owner");
        assert_eq!(eq(&TournamentId::from("t-1")), "eq.t-1");
    }

    #[test]
    fn test_invalid_api_key_rejected() {
        let result = RestBackend::new(RestBackendConfig {
            base_url: Url::parse("https://example.com").unwrap(),
            api_key: "bad\nkey".to_string(),
            timeout: Duration::from_secs(5),
        });
        assert!(matches!(result, Err(BackendError::InvalidApiKey)));
    }

    #[tokio::test]
    async fn test_list_matches_sends_filter_and_key() {
        let router = Router::new().route(
            "/rest/v1/matches",
            get(
                |headers: AxumHeaders, Query(params): Query<HashMap<String, String>>| async move {
                    assert_eq!(headers.get("apikey").unwrap(), "anon-key");
                    assert_eq!(params.get("tournament_id").unwrap(), "eq.t-1");
                    assert_eq!(params.get("select").unwrap(), "*");
                    Json(json!([
                        {"id": "m-2", "tournament_id": "t-1", "round": 1, "match_number": 2,
                         "player1_score": null, "player2_score": null, "status": "scheduled"},
                        {"id": "m-1", "tournament_id": "t-1", "round": 1, "match_number": 1,
                         "player1_score": 2, "player2_score": 1, "status": "completed"}
                    ]))
                },
            ),
        );
        let base = spawn_fake(router).await;

        let matches = backend(base).list_matches(&"t-1".into()).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[1].status, MatchStatus::Completed);
        assert_eq!(matches[0].player1_score, 0);
    }

    #[tokio::test]
    async fn test_user_for_token_maps_401() {
        let router = Router::new().route(
            "/auth/v1/user",
            get(|headers: AxumHeaders| async move {
                let auth = headers.get("authorization").unwrap().to_str().unwrap();
                if auth == "Bearer good-token" {
                    (
                        axum::http::StatusCode::OK,
                        Json(json!({"id": "u-1", "email": "a@example.com", "role": "authenticated"})),
                    )
                } else {
                    (
                        axum::http::StatusCode::UNAUTHORIZED,
                        Json(json!({"msg": "invalid JWT"})),
                    )
                }
            }),
        );
        let base = spawn_fake(router).await;
        let backend = backend(base);

        let user = backend.user_for_token("good-token").await.unwrap();
        assert_eq!(user.id.as_str(), "u-1");
        assert!(matches!(
            backend.user_for_token("stale").await,
            Err(BackendError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_conflict_status_maps_to_conflict() {
        let router = Router::new().route(
            "/rest/v1/user_roles",
            axum::routing::post(|| async {
                (
                    axum::http::StatusCode::CONFLICT,
                    Json(json!({"message": "duplicate key value violates unique constraint"})),
                )
            }),
        );
        let base = spawn_fake(router).await;

        let result = backend(base).grant_role(&"u-1".into(), AppRole::Admin).await;
        match result {
            Err(BackendError::Conflict(message)) => assert!(message.contains("duplicate key")),
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_public_url() {
        let b = backend(Url::parse("https://example.com").unwrap());
        assert_eq!(
            b.public_url("avatars", "u-1/abc.png").unwrap().as_str(),
            "https://example.com/storage/v1/object/public/avatars/u-1/abc.png"
        );
    }
}
