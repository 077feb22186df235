//! Contact form submission.

use serde::{Deserialize, Serialize};

/// What a visitor typed into the contact form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
}

impl ContactRequest {
    /// Copy with every field trimmed; a blank phone becomes `None`.
    pub fn trimmed(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self
                .phone
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            subject: self.subject.trim().to_string(),
            message: self.message.trim().to_string(),
        }
    }
}
