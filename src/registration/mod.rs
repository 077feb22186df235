//! Tournament registration and the player dashboard.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::{BackendError, DataBackend, TournamentQuery};
use crate::models::{
    ExperienceLevel, Profile, ProfileUpdate, Registration, RegistrationWithTournament,
    TournamentId, TournamentSummary, UserId,
};
use crate::session::{SessionContext, SessionError};

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("You must be logged in to register")]
    NotSignedIn,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Tournament not found: {0}")]
    TournamentNotFound(TournamentId),

    #[error("This tournament has reached maximum capacity")]
    TournamentFull,

    #[error("You are already registered for this tournament")]
    AlreadyRegistered,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<SessionError> for RegistrationError {
    fn from(_: SessionError) -> Self {
        RegistrationError::NotSignedIn
    }
}

/// The registration form. Its contents are also stored verbatim on the
/// registration row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub discord_id: String,
    #[serde(default)]
    pub team_name: String,
    #[serde(default)]
    pub experience_level: ExperienceLevel,
}

impl RegistrationForm {
    /// Prefill from the player's profile.
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            username: profile.username.clone().unwrap_or_default(),
            discord_id: profile.discord_id.clone().unwrap_or_default(),
            team_name: profile.team_name.clone().unwrap_or_default(),
            experience_level: profile.experience_level.unwrap_or_default(),
        }
    }

    fn validated(&self) -> Result<Self, RegistrationError> {
        let form = Self {
            username: self.username.trim().to_string(),
            discord_id: self.discord_id.trim().to_string(),
            team_name: self.team_name.trim().to_string(),
            experience_level: self.experience_level,
        };
        if form.username.is_empty() {
            return Err(RegistrationError::MissingField("username"));
        }
        if form.discord_id.is_empty() {
            return Err(RegistrationError::MissingField("discord_id"));
        }
        Ok(form)
    }

    fn profile_update(&self) -> ProfileUpdate {
        ProfileUpdate {
            username: Some(self.username.clone()),
            discord_id: Some(self.discord_id.clone()),
            team_name: Some(self.team_name.clone()),
            experience_level: Some(self.experience_level),
            ..Default::default()
        }
    }
}

/// Register the signed-in player for a tournament.
///
/// Checks run in order: signed in, required fields, capacity, duplicate.
/// On success the profile is updated from the form, a confirmed
/// registration is stored and the player count goes up by one.
pub async fn register(
    backend: &dyn DataBackend,
    session: &SessionContext,
    tournament_id: &TournamentId,
    form: &RegistrationForm,
) -> Result<Registration, RegistrationError> {
    let user = session.require_user()?;
    let form = form.validated()?;

    let tournament = backend
        .get_tournament(tournament_id)
        .await?
        .ok_or_else(|| RegistrationError::TournamentNotFound(tournament_id.clone()))?;
    if tournament.current_players >= tournament.max_players {
        return Err(RegistrationError::TournamentFull);
    }
    if backend
        .find_registration(tournament_id, &user.id)
        .await?
        .is_some()
    {
        return Err(RegistrationError::AlreadyRegistered);
    }

    backend.update_profile(&user.id, &form.profile_update()).await?;

    let data = serde_json::to_value(&form).map_err(BackendError::from)?;
    let registration = Registration::new(tournament_id.clone(), user.id.clone(), Some(data));
    let registration = match backend.insert_registration(registration).await {
        Ok(r) => r,
        Err(BackendError::Conflict(_)) => return Err(RegistrationError::AlreadyRegistered),
        Err(e) => return Err(e.into()),
    };

    // Read-modify-write; two racing signups can undercount.
    backend
        .set_current_players(tournament_id, tournament.current_players + 1)
        .await?;

    info!(
        "User {} registered for {} ({}/{})",
        user.id,
        tournament.title,
        tournament.current_players + 1,
        tournament.max_players
    );
    Ok(registration)
}

pub async fn is_registered(
    backend: &dyn DataBackend,
    tournament_id: &TournamentId,
    user_id: &UserId,
) -> Result<bool, BackendError> {
    Ok(backend
        .find_registration(tournament_id, user_id)
        .await?
        .is_some())
}

/// What the player dashboard shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub profile: Option<Profile>,
    pub registrations: Vec<RegistrationWithTournament>,
}

/// Profile plus registrations, newest first, each joined with its tournament.
pub async fn dashboard(
    backend: &dyn DataBackend,
    user_id: &UserId,
) -> Result<Dashboard, BackendError> {
    let profile = backend.get_profile(user_id).await?;
    let registrations = backend.list_registrations_for_user(user_id).await?;

    let tournaments: HashMap<TournamentId, TournamentSummary> = if registrations.is_empty() {
        HashMap::new()
    } else {
        backend
            .list_tournaments(TournamentQuery::default())
            .await?
            .iter()
            .map(|t| (t.id.clone(), TournamentSummary::from(t)))
            .collect()
    };

    let registrations = registrations
        .into_iter()
        .map(|r| {
            let tournament = tournaments.get(&r.tournament_id).cloned();
            if tournament.is_none() {
                warn!("Registration {} points at a missing tournament", r.id);
            }
            RegistrationWithTournament {
                id: r.id,
                status: r.status,
                registered_at: r.registered_at,
                tournament,
            }
        })
        .collect();

    Ok(Dashboard {
        profile,
        registrations,
    })
}
