//! Opaque row identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// An opaque identifier assigned by the data backend.
///
/// The backend hands out UUID strings, but nothing here relies on that:
/// ids are compared and displayed verbatim.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: String) -> Self {
        Self(id)
    }

    /// Mint a fresh random (v4) id, used when this process creates a row itself.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Type alias for tournament IDs
pub type TournamentId = EntityId;

/// Type alias for match IDs
pub type MatchId = EntityId;

/// Type alias for auth user IDs (also the profile primary key)
pub type UserId = EntityId;

/// Type alias for registration IDs
pub type RegistrationId = EntityId;

/// Type alias for role assignment IDs
pub type RoleId = EntityId;
