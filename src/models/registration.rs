//! Tournament registration model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EntityId, RegistrationId, TournamentId, TournamentSummary, UserId};

/// Status assigned to every registration accepted through the site.
pub const CONFIRMED: &str = "confirmed";

/// A registration row linking a user to a tournament.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub id: RegistrationId,
    pub tournament_id: TournamentId,
    pub user_id: UserId,
    #[serde(default = "default_status")]
    pub status: String,
    /// Snapshot of the form the player submitted
    #[serde(default)]
    pub registration_data: Option<serde_json::Value>,
    #[serde(default = "Utc::now")]
    pub registered_at: DateTime<Utc>,
}

fn default_status() -> String {
    CONFIRMED.to_string()
}

impl Registration {
    pub fn new(
        tournament_id: TournamentId,
        user_id: UserId,
        registration_data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: EntityId::random(),
            tournament_id,
            user_id,
            status: default_status(),
            registration_data,
            registered_at: Utc::now(),
        }
    }
}

/// A registration joined with the tournament it points at, as shown on
/// the player dashboard. The tournament is absent if it has been deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationWithTournament {
    pub id: RegistrationId,
    pub status: String,
    pub registered_at: DateTime<Utc>,
    pub tournament: Option<TournamentSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_defaults_to_confirmed() {
        let r = Registration::new(EntityId::from("t-1"), EntityId::from("u-1"), None);
        assert_eq!(r.status, CONFIRMED);
    }

    #[test]
    fn test_registration_row_without_status() {
        let json = r#"{"id": "r-1", "tournament_id": "t-1", "user_id": "u-1"}"#;
        let r: Registration = serde_json::from_str(json).unwrap();
        assert_eq!(r.status, CONFIRMED);
        assert!(r.registration_data.is_none());
    }
}
