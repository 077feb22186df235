//! Profile editing and avatar upload.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use crate::backend::{BackendError, DataBackend, AVATAR_BUCKET};
use crate::models::{Profile, ProfileUpdate, UserId};
use crate::validation::{describe, FieldError, Validator};

/// Largest accepted avatar upload.
pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Invalid profile: {}", describe(.0))]
    Invalid(Vec<FieldError>),

    #[error("Profile not found for user {0}")]
    NotFound(UserId),

    #[error("Unsupported image type: {0}")]
    UnsupportedImage(String),

    #[error("Avatar is empty or larger than {MAX_AVATAR_BYTES} bytes")]
    AvatarSize,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

fn phone_pattern() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| Regex::new(r"^\+?[\d\s\-()]+$").expect("static regex"))
}

/// True when `value` looks like a phone number: optional leading `+`,
/// then digits, spaces, dashes and parentheses.
pub fn is_valid_phone(value: &str) -> bool {
    phone_pattern().is_match(value)
}

/// The profile edit form.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfileForm {
    pub full_name: String,
    pub username: String,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub phone_no: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub team_members: Vec<String>,
}

fn blank_to_none(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Trim members, drop blanks and keep the first of any duplicates.
pub fn normalize_team_members(members: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(members.len());
    for member in members.iter().map(|m| m.trim()).filter(|m| !m.is_empty()) {
        if !out.iter().any(|m| m == member) {
            out.push(member.to_string());
        }
    }
    out
}

impl ProfileForm {
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            full_name: profile.full_name.clone().unwrap_or_default(),
            username: profile.username.clone().unwrap_or_default(),
            team_name: profile.team_name.clone(),
            phone_no: profile.phone_no.clone(),
            date_of_birth: profile.date_of_birth,
            team_members: profile.team_members.clone(),
        }
    }

    /// Validate and turn the form into a profile update.
    pub fn validate(&self) -> Result<ProfileUpdate, ProfileError> {
        let full_name = self.full_name.trim();
        let username = self.username.trim();
        let team_name = blank_to_none(&self.team_name);
        let phone_no = blank_to_none(&self.phone_no);

        let mut v = Validator::new();
        v.length("full_name", full_name, 1, 100);
        v.length("username", username, 3, 50);
        if let Some(ref team) = team_name {
            v.length("team_name", team, 0, 100);
        }
        if let Some(ref phone) = phone_no {
            v.check("phone_no", is_valid_phone(phone), "Invalid phone number");
            v.length("phone_no", phone, 0, 20);
        }
        v.finish().map_err(ProfileError::Invalid)?;

        Ok(ProfileUpdate {
            full_name: Some(full_name.to_string()),
            username: Some(username.to_string()),
            team_name,
            phone_no,
            date_of_birth: self.date_of_birth,
            team_members: Some(normalize_team_members(&self.team_members)),
            ..Default::default()
        })
    }
}

pub async fn load_profile(
    backend: &dyn DataBackend,
    user_id: &UserId,
) -> Result<Profile, ProfileError> {
    backend
        .get_profile(user_id)
        .await?
        .ok_or_else(|| ProfileError::NotFound(user_id.clone()))
}

/// Validate `form` and save it onto `user_id`'s profile.
pub async fn update_profile(
    backend: &dyn DataBackend,
    user_id: &UserId,
    form: &ProfileForm,
) -> Result<Profile, ProfileError> {
    let update = form.validate()?;
    let profile = match backend.update_profile(user_id, &update).await {
        Ok(p) => p,
        Err(BackendError::NotFound(_)) => return Err(ProfileError::NotFound(user_id.clone())),
        Err(e) => return Err(e.into()),
    };
    info!("Updated profile {}", user_id);
    Ok(profile)
}

/// File extension for an accepted image content type.
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Storage path for an avatar: `{user_id}/{content hash}.{ext}`.
pub fn avatar_path(user_id: &UserId, bytes: &[u8], ext: &str) -> String {
    let digest = hex::encode(Sha256::digest(bytes));
    format!("{}/{}.{}", user_id, &digest[..16], ext)
}

/// Store an avatar image and point the profile at its public URL.
pub async fn upload_avatar(
    backend: &dyn DataBackend,
    user_id: &UserId,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<Profile, ProfileError> {
    let ext = image_extension(content_type)
        .ok_or_else(|| ProfileError::UnsupportedImage(content_type.to_string()))?;
    if bytes.is_empty() || bytes.len() > MAX_AVATAR_BYTES {
        return Err(ProfileError::AvatarSize);
    }

    let path = avatar_path(user_id, &bytes, ext);
    let size = bytes.len();
    let url = backend
        .upload_object(AVATAR_BUCKET, &path, bytes, content_type)
        .await?;
    info!("Stored avatar {} ({} bytes)", path, size);

    let update = ProfileUpdate {
        avatar_url: Some(url),
        ..Default::default()
    };
    Ok(backend.update_profile(user_id, &update).await?)
}
