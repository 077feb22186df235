//! Outgoing email.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur sending mail.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mail API returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// One email, in the shape the mail API accepts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

/// What the mail API reports back.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SentEmail {
    #[serde(default)]
    pub id: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, email: &OutgoingEmail) -> Result<SentEmail, MailError>;
}

/// Sends mail through a Resend-style JSON API: `POST {api_url}` with a
/// bearer key.
pub struct HttpMailer {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, timeout: Duration) -> Result<Self, MailError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url,
            api_key,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<SentEmail, MailError> {
        debug!("Sending \"{}\" to {:?}", email.subject, email.to);
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MailError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }
}

/// Keeps sent mail in memory and logs it. Used when no mail API is
/// configured.
#[derive(Default)]
pub struct LogMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<SentEmail, MailError> {
        info!("Mail to {:?}: {}", email.to, email.subject);
        let mut sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        sent.push(email.clone());
        Ok(SentEmail {
            id: Some(format!("log-{}", sent.len())),
        })
    }
}
