//! Match model: one pairing inside a tournament bracket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::{EntityId, MatchId, TournamentId, UserId};

/// Lifecycle state of a match as stored by the admin console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::InProgress => "in_progress",
            MatchStatus::Completed => "completed",
            MatchStatus::Cancelled => "cancelled",
        }
    }

    /// Badge text shown on a match card ("IN PROGRESS").
    pub fn label(&self) -> String {
        self.as_str().replace('_', " ").to_uppercase()
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(MatchStatus::Scheduled),
            "in_progress" => Ok(MatchStatus::InProgress),
            "completed" => Ok(MatchStatus::Completed),
            "cancelled" => Ok(MatchStatus::Cancelled),
            other => Err(format!("unknown match status: {}", other)),
        }
    }
}

/// One of the two participant slots of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerSlot {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
}

impl PlayerSlot {
    pub fn other(self) -> Self {
        match self {
            PlayerSlot::One => PlayerSlot::Two,
            PlayerSlot::Two => PlayerSlot::One,
        }
    }
}

/// A single match row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,

    /// Tournament this match belongs to
    pub tournament_id: TournamentId,

    /// 1-based round, increasing toward the final
    pub round: u32,

    /// Position within the round, used for display ordering
    pub match_number: u32,

    #[serde(default)]
    pub player1_id: Option<UserId>,

    /// Absent means the slot is still to be decided
    #[serde(default)]
    pub player1_name: Option<String>,

    #[serde(default, deserialize_with = "score_or_zero")]
    pub player1_score: u32,

    #[serde(default)]
    pub player2_id: Option<UserId>,

    #[serde(default)]
    pub player2_name: Option<String>,

    #[serde(default, deserialize_with = "score_or_zero")]
    pub player2_score: u32,

    /// Authoritative winner, when the admin recorded one
    #[serde(default)]
    pub winner_id: Option<UserId>,

    #[serde(default)]
    pub status: MatchStatus,

    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// The store keeps scores nullable; an unset score reads as zero.
fn score_or_zero<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or(0))
}

impl Match {
    /// Create a scheduled match with empty slots.
    pub fn new(tournament_id: TournamentId, round: u32, match_number: u32) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::random(),
            tournament_id,
            round,
            match_number,
            player1_id: None,
            player1_name: None,
            player1_score: 0,
            player2_id: None,
            player2_name: None,
            player2_score: 0,
            winner_id: None,
            status: MatchStatus::Scheduled,
            scheduled_time: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_players(mut self, player1: &str, player2: &str) -> Self {
        self.player1_name = Some(player1.to_string());
        self.player2_name = Some(player2.to_string());
        self
    }

    pub fn with_scores(mut self, player1: u32, player2: u32) -> Self {
        self.player1_score = player1;
        self.player2_score = player2;
        self
    }

    pub fn with_status(mut self, status: MatchStatus) -> Self {
        self.status = status;
        self
    }

    pub fn score(&self, slot: PlayerSlot) -> u32 {
        match slot {
            PlayerSlot::One => self.player1_score,
            PlayerSlot::Two => self.player2_score,
        }
    }

    pub fn player_name(&self, slot: PlayerSlot) -> Option<&str> {
        match slot {
            PlayerSlot::One => self.player1_name.as_deref(),
            PlayerSlot::Two => self.player2_name.as_deref(),
        }
    }

    pub fn participant(&self, slot: PlayerSlot) -> Option<&UserId> {
        match slot {
            PlayerSlot::One => self.player1_id.as_ref(),
            PlayerSlot::Two => self.player2_id.as_ref(),
        }
    }

    /// Apply a partial update, bumping `updated_at`.
    ///
    /// Moving into `completed` stamps `completed_at` if it is not set yet.
    pub fn apply(&mut self, update: &MatchUpdate) {
        if let Some(round) = update.round {
            self.round = round;
        }
        if let Some(number) = update.match_number {
            self.match_number = number;
        }
        if let Some(ref name) = update.player1_name {
            self.player1_name = non_empty(name);
        }
        if let Some(ref name) = update.player2_name {
            self.player2_name = non_empty(name);
        }
        if let Some(score) = update.player1_score {
            self.player1_score = score;
        }
        if let Some(score) = update.player2_score {
            self.player2_score = score;
        }
        if let Some(ref winner) = update.winner_id {
            self.winner_id = Some(winner.clone());
        }
        if let Some(time) = update.scheduled_time {
            self.scheduled_time = Some(time);
        }
        if let Some(status) = update.status {
            if status == MatchStatus::Completed && self.completed_at.is_none() {
                self.completed_at = Some(Utc::now());
            }
            self.status = status;
        }
        self.updated_at = Utc::now();
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Fields accepted when inserting a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMatch {
    pub tournament_id: TournamentId,
    pub round: u32,
    pub match_number: u32,
    #[serde(default)]
    pub status: MatchStatus,
}

/// Partial update of a match; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player1_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player2_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player1_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player2_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MatchStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
}
