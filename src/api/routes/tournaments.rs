use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::auth::Session;
use crate::api::state::AppState;
use crate::api::{ApiError, Pagination, PaginationMeta};
use crate::backend::TournamentQuery;
use crate::models::{Registration, Tournament, TournamentId};
use crate::registration::{self, RegistrationForm};

#[derive(Debug, Deserialize)]
pub struct ListTournamentsParams {
    /// Cap on rows fetched, e.g. 3 for the landing page
    pub limit: Option<usize>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct TournamentListResponse {
    pub tournaments: Vec<Tournament>,
    pub pagination: PaginationMeta,
}

/// Tournaments by start date, soonest first.
pub async fn list_tournaments(
    State(state): State<AppState>,
    Query(params): Query<ListTournamentsParams>,
) -> Result<Json<TournamentListResponse>, ApiError> {
    let tournaments = state
        .backend
        .list_tournaments(TournamentQuery {
            limit: params.limit,
            ..Default::default()
        })
        .await?;

    let pagination = Pagination::new(params.page, params.page_size);
    let meta = PaginationMeta::new(&pagination, tournaments.len() as u32);

    Ok(Json(TournamentListResponse {
        tournaments: pagination.slice(&tournaments).to_vec(),
        pagination: meta,
    }))
}

#[derive(Debug, Serialize)]
pub struct TournamentDetail {
    #[serde(flatten)]
    pub tournament: Tournament,
    pub seats_left: u32,
    pub is_full: bool,
}

pub async fn get_tournament(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
) -> Result<Json<TournamentDetail>, ApiError> {
    let tournament = state
        .backend
        .get_tournament(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Tournament '{}' not found", id)))?;

    Ok(Json(TournamentDetail {
        seats_left: tournament.seats_left(),
        is_full: tournament.is_full(),
        tournament,
    }))
}

pub async fn register(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<TournamentId>,
    Json(form): Json<RegistrationForm>,
) -> Result<(StatusCode, Json<Registration>), ApiError> {
    let registration =
        registration::register(state.backend.as_ref(), &session, &id, &form).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

#[derive(Debug, Serialize)]
pub struct RegistrationStatus {
    pub signed_in: bool,
    pub registered: bool,
    /// Prefill for the registration form, from the player's profile
    pub form: Option<RegistrationForm>,
}

pub async fn registration_status(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<TournamentId>,
) -> Result<Json<RegistrationStatus>, ApiError> {
    let Some(user_id) = session.user_id() else {
        return Ok(Json(RegistrationStatus {
            signed_in: false,
            registered: false,
            form: None,
        }));
    };

    let registered = registration::is_registered(state.backend.as_ref(), &id, user_id).await?;
    let form = state
        .backend
        .get_profile(user_id)
        .await?
        .map(|p| RegistrationForm::from_profile(&p));

    Ok(Json(RegistrationStatus {
        signed_in: true,
        registered,
        form,
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::TestApp;
    use crate::models::{Tournament, TournamentDraft};
    use axum::http::StatusCode;
    use serde_json::json;

    fn draft(title: &str, start: &str, max_players: u32) -> TournamentDraft {
        TournamentDraft {
            title: title.to_string(),
            game: "Street Fighter 6".to_string(),
            description: None,
            rules: None,
            prize_pool: "$300".to_string(),
            max_players,
            start_date: start.parse().unwrap(),
            end_date: None,
            status: Default::default(),
            image_url: None,
        }
    }

    async fn seed(app: &TestApp, title: &str, start: &str, max_players: u32) -> Tournament {
        let t = Tournament::from_draft(draft(title, start, max_players), None);
        app.backend.seed_tournament(t.clone()).await;
        t
    }

    #[tokio::test]
    async fn test_list_tournaments_by_start_date() {
        let app = TestApp::new();
        seed(&app, "Later", "2025-09-01T00:00:00Z", 8).await;
        seed(&app, "Sooner", "2025-08-01T00:00:00Z", 8).await;
        seed(&app, "Soonest", "2025-07-01T00:00:00Z", 8).await;

        let (status, json) = app.get_json("/api/tournaments?limit=2", None).await;
        assert_eq!(status, StatusCode::OK);
        let titles: Vec<&str> = json["tournaments"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["Soonest", "Sooner"]);
        assert_eq!(json["pagination"]["total_items"], 2);
    }

    #[tokio::test]
    async fn test_list_tournaments_huge_page() {
        let app = TestApp::new();
        seed(&app, "Cup", "2025-07-01T00:00:00Z", 8).await;

        let (status, json) = app
            .get_json("/api/tournaments?page=4294967295", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["tournaments"], json!([]));
        assert_eq!(json["pagination"]["has_next"], false);
    }

    #[tokio::test]
    async fn test_get_tournament() {
        let app = TestApp::new();
        let t = seed(&app, "Cup", "2025-07-01T00:00:00Z", 8).await;

        let (status, json) = app.get_json(&format!("/api/tournaments/{}", t.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["title"], "Cup");
        assert_eq!(json["seats_left"], 8);
        assert_eq!(json["is_full"], false);

        let (status, json) = app.get_json("/api/tournaments/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_register_flow() {
        let app = TestApp::new();
        let t = seed(&app, "Cup", "2025-07-01T00:00:00Z", 1).await;
        app.backend.add_user("p1", "p1@example.com").await;
        app.backend.add_user("p2", "p2@example.com").await;
        let uri = format!("/api/tournaments/{}/register", t.id);
        let form = json!({"username": "one", "discord_id": "one#1", "experience_level": "advanced"});

        let (status, _) = app.call("POST", &uri, None, Some(form.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, json) = app.call("POST", &uri, Some("p1"), Some(form.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["status"], "confirmed");

        let (status, json) = app.call("POST", &uri, Some("p1"), Some(form.clone())).await;
        assert_eq!(status, StatusCode::CONFLICT, "{}", json);

        let (status, json) = app.call("POST", &uri, Some("p2"), Some(form)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("maximum capacity"));

        let (_, json) = app
            .get_json(&format!("/api/tournaments/{}", t.id), None)
            .await;
        assert_eq!(json["current_players"], 1);
        assert_eq!(json["is_full"], true);
    }

    #[tokio::test]
    async fn test_register_missing_field() {
        let app = TestApp::new();
        let t = seed(&app, "Cup", "2025-07-01T00:00:00Z", 8).await;
        app.backend.add_user("p1", "p1@example.com").await;

        let (status, json) = app
            .call(
                "POST",
                &format!("/api/tournaments/{}/register", t.id),
                Some("p1"),
                Some(json!({"username": "one"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("discord_id"));
    }

    #[tokio::test]
    async fn test_registration_status() {
        let app = TestApp::new();
        let t = seed(&app, "Cup", "2025-07-01T00:00:00Z", 8).await;
        app.backend.add_user("p1", "p1@example.com").await;
        let uri = format!("/api/tournaments/{}/registration", t.id);

        let (_, json) = app.get_json(&uri, None).await;
        assert_eq!(json["signed_in"], false);

        let (_, json) = app.get_json(&uri, Some("p1")).await;
        assert_eq!(json["signed_in"], true);
        assert_eq!(json["registered"], false);
        assert_eq!(json["form"]["experience_level"], "beginner");

        let (status, _) = app.get_json(&uri, Some("bogus")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
