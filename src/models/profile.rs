//! Player profile model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// Self-reported skill bracket picked on registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Professional,
}

/// A profile row, keyed by the auth user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub discord_id: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub team_members: Vec<String>,
    #[serde(default)]
    pub experience_level: Option<ExperienceLevel>,
    #[serde(default)]
    pub phone_no: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Profile {
    /// Blank profile, as created by the auth signup trigger.
    pub fn new(id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id,
            username: None,
            full_name: None,
            discord_id: None,
            team_name: None,
            team_members: Vec::new(),
            experience_level: None,
            phone_no: None,
            date_of_birth: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(ref v) = update.username {
            self.username = Some(v.clone());
        }
        if let Some(ref v) = update.full_name {
            self.full_name = Some(v.clone());
        }
        if let Some(ref v) = update.discord_id {
            self.discord_id = Some(v.clone());
        }
        if let Some(ref v) = update.team_name {
            self.team_name = Some(v.clone());
        }
        if let Some(ref v) = update.team_members {
            self.team_members = v.clone();
        }
        if let Some(v) = update.experience_level {
            self.experience_level = Some(v);
        }
        if let Some(ref v) = update.phone_no {
            self.phone_no = Some(v.clone());
        }
        if let Some(v) = update.date_of_birth {
            self.date_of_birth = Some(v);
        }
        if let Some(ref v) = update.avatar_url {
            self.avatar_url = Some(v.clone());
        }
        self.updated_at = Utc::now();
    }

    /// True when any of the searchable text fields contains `query`
    /// (case-insensitive). An empty query matches everything.
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [
            &self.full_name,
            &self.username,
            &self.discord_id,
            &self.team_name,
        ]
        .iter()
        .any(|field| {
            field
                .as_deref()
                .is_some_and(|v| v.to_lowercase().contains(&needle))
        })
    }
}

/// Partial profile update; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_members: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<ExperienceLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityId;

    #[test]
    fn test_profile_null_team_members() {
        let json = r#"{"id": "u-1", "username": "ace", "team_members": null}"#;
        let p: Profile = serde_json::from_str(json).unwrap();
        assert!(p.team_members.is_empty());
        assert_eq!(p.username.as_deref(), Some("ace"));
    }

    #[test]
    fn test_apply_partial_update() {
        let mut p = Profile::new(EntityId::from("u-1"));
        p.team_name = Some("Old Team".to_string());

        p.apply(&ProfileUpdate {
            username: Some("ace".to_string()),
            experience_level: Some(ExperienceLevel::Advanced),
            ..Default::default()
        });

        assert_eq!(p.username.as_deref(), Some("ace"));
        assert_eq!(p.team_name.as_deref(), Some("Old Team"));
        assert_eq!(p.experience_level, Some(ExperienceLevel::Advanced));
    }

    #[test]
    fn test_matches_query_case_insensitive() {
        let mut p = Profile::new(EntityId::from("u-1"));
        p.discord_id = Some("NightOwl#4242".to_string());
        assert!(p.matches_query("nightowl"));
        assert!(p.matches_query(""));
        assert!(!p.matches_query("daybird"));
    }

    #[test]
    fn test_experience_level_serialization() {
        let json = serde_json::to_string(&ExperienceLevel::Professional).unwrap();
        assert_eq!(json, "\"professional\"");
    }
}
