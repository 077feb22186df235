use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::contact::{self, SentEmail};
use crate::models::ContactRequest;

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub success: bool,
    pub user_email: SentEmail,
    pub admin_email: SentEmail,
}

pub async fn submit(
    State(state): State<AppState>,
    Json(req): Json<ContactRequest>,
) -> Result<Json<ContactResponse>, ApiError> {
    let receipt =
        contact::send_contact_email(state.mailer.as_ref(), &state.contact, &req).await?;
    Ok(Json(ContactResponse {
        success: true,
        user_email: receipt.user_email,
        admin_email: receipt.admin_email,
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::TestApp;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_submit_sends_two_emails() {
        let app = TestApp::new();
        let (status, json) = app
            .call(
                "POST",
                "/api/contact",
                None,
                Some(json!({
                    "name": "Robin",
                    "email": "robin@example.com",
                    "subject": "Collab",
                    "message": "Hello!"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);

        let sent = app.mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].subject, "New Contact: Collab");
    }

    #[tokio::test]
    async fn test_submit_invalid() {
        let app = TestApp::new();
        let (status, json) = app
            .call(
                "POST",
                "/api/contact",
                None,
                Some(json!({
                    "name": "Robin",
                    "email": "not-an-email",
                    "subject": "Collab",
                    "message": "Hello!"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["fields"][0]["field"], "email");
        assert!(app.mailer.sent().is_empty());
    }
}
