//! Contact form: validation and the two notification emails.

mod mailer;
pub mod templates;

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::models::ContactRequest;
use crate::validation::{describe, FieldError, Validator};

pub use mailer::{HttpMailer, LogMailer, MailError, Mailer, OutgoingEmail, SentEmail};

/// Subject of the confirmation sent to the submitter.
pub const USER_SUBJECT: &str = "We received your message - AV ARENA";

#[derive(Debug, Error)]
pub enum ContactError {
    #[error("Invalid contact form: {}", describe(.0))]
    Invalid(Vec<FieldError>),

    #[error("Failed to send email: {0}")]
    Mail(#[from] MailError),
}

/// Sender and recipient addresses for contact mail.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactSettings {
    /// Sender of the confirmation, e.g. `AV ARENA <noreply@example.com>`
    pub user_from: String,
    /// Sender of the admin notification
    pub admin_from: String,
    /// Where notifications go; also shown to users as the support address
    pub admin_address: String,
}

/// Ids of the two sent emails.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactReceipt {
    pub user_email: SentEmail,
    pub admin_email: SentEmail,
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex"))
}

pub fn is_valid_email(value: &str) -> bool {
    email_pattern().is_match(value)
}

/// Trim and validate a submission.
pub fn validate(req: &ContactRequest) -> Result<ContactRequest, ContactError> {
    let req = req.trimmed();
    let mut v = Validator::new();
    v.length("name", &req.name, 1, 100);
    v.check("email", is_valid_email(&req.email), "Invalid email address");
    v.length("email", &req.email, 0, 255);
    if let Some(ref phone) = req.phone {
        v.length("phone", phone, 0, 20);
    }
    v.length("subject", &req.subject, 1, 200);
    v.length("message", &req.message, 1, 2000);
    v.finish().map_err(ContactError::Invalid)?;
    Ok(req)
}

/// Validate a submission, then send the confirmation and the admin
/// notification. Nothing is sent if validation fails.
pub async fn send_contact_email(
    mailer: &dyn Mailer,
    settings: &ContactSettings,
    req: &ContactRequest,
) -> Result<ContactReceipt, ContactError> {
    let req = validate(req)?;
    info!("Processing contact form submission from {}", req.email);

    let user_email = mailer
        .send(&OutgoingEmail {
            from: settings.user_from.clone(),
            to: vec![req.email.clone()],
            subject: USER_SUBJECT.to_string(),
            html: templates::user_confirmation(&req, &settings.admin_address),
            reply_to: None,
        })
        .await?;

    let admin_email = mailer
        .send(&OutgoingEmail {
            from: settings.admin_from.clone(),
            to: vec![settings.admin_address.clone()],
            subject: format!("New Contact: {}", req.subject),
            html: templates::admin_notification(&req),
            reply_to: Some(req.email.clone()),
        })
        .await?;

    Ok(ContactReceipt {
        user_email,
        admin_email,
    })
}
