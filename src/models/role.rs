//! Role assignments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EntityId, RoleId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppRole {
    Admin,
    User,
    Owner,
}

impl AppRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppRole::Admin => "admin",
            AppRole::User => "user",
            AppRole::Owner => "owner",
        }
    }
}

impl std::fmt::Display for AppRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AppRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(AppRole::Admin),
            "user" => Ok(AppRole::User),
            "owner" => Ok(AppRole::Owner),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// One (user, role) row. A user may hold several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRole {
    pub id: RoleId,
    pub user_id: UserId,
    pub role: AppRole,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl UserRole {
    pub fn new(user_id: UserId, role: AppRole) -> Self {
        Self {
            id: EntityId::random(),
            user_id,
            role,
            created_at: Utc::now(),
        }
    }
}
