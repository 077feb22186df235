//! Tournament model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EntityId, TournamentId, UserId};

/// Default player cap offered by the admin form.
pub const DEFAULT_MAX_PLAYERS: u32 = 512;

/// Display status of a tournament.
///
/// The store keeps this as free text; unknown values survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TournamentStatus {
    #[default]
    Open,
    FillingFast,
    Full,
    InProgress,
    Completed,
    Other(String),
}

impl From<String> for TournamentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Open" => TournamentStatus::Open,
            "Filling Fast" => TournamentStatus::FillingFast,
            "Full" => TournamentStatus::Full,
            "In Progress" => TournamentStatus::InProgress,
            "Completed" => TournamentStatus::Completed,
            _ => TournamentStatus::Other(s),
        }
    }
}

impl From<TournamentStatus> for String {
    fn from(status: TournamentStatus) -> Self {
        match status {
            TournamentStatus::Open => "Open".to_string(),
            TournamentStatus::FillingFast => "Filling Fast".to_string(),
            TournamentStatus::Full => "Full".to_string(),
            TournamentStatus::InProgress => "In Progress".to_string(),
            TournamentStatus::Completed => "Completed".to_string(),
            TournamentStatus::Other(s) => s,
        }
    }
}

/// A tournament row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub title: String,
    pub game: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: Option<String>,
    /// Free text, e.g. "$5,000"
    pub prize_pool: String,
    pub max_players: u32,
    #[serde(default)]
    pub current_players: u32,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: TournamentStatus,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_by: Option<UserId>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Tournament {
    /// Materialize a draft into a row, as the store would on insert.
    pub fn from_draft(draft: TournamentDraft, created_by: Option<UserId>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::random(),
            title: draft.title,
            game: draft.game,
            description: draft.description,
            rules: draft.rules,
            prize_pool: draft.prize_pool,
            max_players: draft.max_players,
            current_players: 0,
            start_date: draft.start_date,
            end_date: draft.end_date,
            status: draft.status,
            image_url: draft.image_url,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the editable fields from a draft.
    pub fn apply(&mut self, draft: TournamentDraft) {
        self.title = draft.title;
        self.game = draft.game;
        self.description = draft.description;
        self.rules = draft.rules;
        self.prize_pool = draft.prize_pool;
        self.max_players = draft.max_players;
        self.start_date = draft.start_date;
        self.end_date = draft.end_date;
        self.status = draft.status;
        self.image_url = draft.image_url;
        self.updated_at = Utc::now();
    }

    /// No free seats left, by count or by the admin marking it full.
    pub fn is_full(&self) -> bool {
        self.current_players >= self.max_players || self.status == TournamentStatus::Full
    }

    pub fn seats_left(&self) -> u32 {
        self.max_players.saturating_sub(self.current_players)
    }
}

/// The editable part of a tournament, as submitted by the admin form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentDraft {
    pub title: String,
    pub game: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: Option<String>,
    #[serde(default)]
    pub prize_pool: String,
    #[serde(default = "default_max_players")]
    pub max_players: u32,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: TournamentStatus,
    #[serde(default)]
    pub image_url: Option<String>,
}

fn default_max_players() -> u32 {
    DEFAULT_MAX_PLAYERS
}

/// Slim tournament projection embedded in dashboard registrations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentSummary {
    pub id: TournamentId,
    pub title: String,
    pub game: String,
    pub prize_pool: String,
    pub start_date: DateTime<Utc>,
    pub status: TournamentStatus,
}

impl From<&Tournament> for TournamentSummary {
    fn from(t: &Tournament) -> Self {
        Self {
            id: t.id.clone(),
            title: t.title.clone(),
            game: t.game.clone(),
            prize_pool: t.prize_pool.clone(),
            start_date: t.start_date,
            status: t.status.clone(),
        }
    }
}
