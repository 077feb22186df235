//! In-process backend.
//!
//! Keeps every table in memory behind a single `RwLock` and publishes a
//! change notice after each write, standing in for the hosted change feed.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{BackendError, DataBackend, TournamentOrder, TournamentQuery};
use crate::models::{
    AppRole, EntityId, Match, MatchId, MatchUpdate, NewMatch, Profile, ProfileUpdate,
    Registration, Tournament, TournamentDraft, TournamentId, UserId, UserRole,
};
use crate::realtime::{ChangeFeed, Topic};
use crate::session::AuthUser;

#[derive(Default)]
struct Tables {
    tournaments: Vec<Tournament>,
    matches: Vec<Match>,
    profiles: Vec<Profile>,
    registrations: Vec<Registration>,
    roles: Vec<UserRole>,
    sessions: HashMap<String, AuthUser>,
    objects: HashMap<String, StoredObject>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    content_type: String,
    bytes: Vec<u8>,
}

pub struct MemoryBackend {
    tables: RwLock<Tables>,
    feed: Option<ChangeFeed>,
    public_base: String,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            feed: None,
            public_base: "memory://storage".to_string(),
        }
    }

    /// Publish change notices on `feed` after every write.
    pub fn with_feed(mut self, feed: ChangeFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    fn notify(&self, topic: Topic) {
        if let Some(ref feed) = self.feed {
            feed.publish(topic);
        }
    }

    /// Register a signed-in user reachable through `token`, with a blank
    /// profile, as the auth signup trigger would create.
    pub async fn add_user(&self, token: &str, email: &str) -> AuthUser {
        let user = AuthUser {
            id: EntityId::random(),
            email: Some(email.to_string()),
        };
        let mut tables = self.tables.write().await;
        tables.sessions.insert(token.to_string(), user.clone());
        tables.profiles.push(Profile::new(user.id.clone()));
        user
    }

    pub async fn seed_tournament(&self, tournament: Tournament) {
        self.tables.write().await.tournaments.push(tournament);
        self.notify(Topic::Tournaments);
    }

    pub async fn seed_match(&self, m: Match) {
        let topic = Topic::Matches(m.tournament_id.clone());
        self.tables.write().await.matches.push(m);
        self.notify(topic);
    }

    pub async fn seed_role(&self, user_id: &UserId, role: AppRole) {
        self.tables
            .write()
            .await
            .roles
            .push(UserRole::new(user_id.clone(), role));
    }

    /// Raw bytes and content type of a stored object.
    pub async fn object(&self, bucket: &str, path: &str) -> Option<(String, Vec<u8>)> {
        self.tables
            .read()
            .await
            .objects
            .get(&format!("{}/{}", bucket, path))
            .map(|o| (o.content_type.clone(), o.bytes.clone()))
    }
}

#[async_trait]
impl DataBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn user_for_token(&self, token: &str) -> Result<AuthUser, BackendError> {
        self.tables
            .read()
            .await
            .sessions
            .get(token)
            .cloned()
            .ok_or(BackendError::Unauthorized)
    }

    async fn list_tournaments(
        &self,
        query: TournamentQuery,
    ) -> Result<Vec<Tournament>, BackendError> {
        let mut rows = self.tables.read().await.tournaments.clone();
        match query.order {
            TournamentOrder::StartDateAsc => rows.sort_by_key(|t| t.start_date),
            TournamentOrder::CreatedDesc => rows.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn get_tournament(&self, id: &TournamentId) -> Result<Option<Tournament>, BackendError> {
        Ok(self
            .tables
            .read()
            .await
            .tournaments
            .iter()
            .find(|t| &t.id == id)
            .cloned())
    }

    async fn insert_tournament(
        &self,
        draft: TournamentDraft,
        created_by: Option<UserId>,
    ) -> Result<Tournament, BackendError> {
        let row = Tournament::from_draft(draft, created_by);
        self.tables.write().await.tournaments.push(row.clone());
        self.notify(Topic::Tournaments);
        Ok(row)
    }

    async fn update_tournament(
        &self,
        id: &TournamentId,
        draft: TournamentDraft,
    ) -> Result<Tournament, BackendError> {
        let updated = {
            let mut tables = self.tables.write().await;
            let row = tables
                .tournaments
                .iter_mut()
                .find(|t| &t.id == id)
                .ok_or_else(|| BackendError::NotFound(format!("tournament {}", id)))?;
            row.apply(draft);
            row.clone()
        };
        self.notify(Topic::Tournaments);
        Ok(updated)
    }

    async fn set_current_players(
        &self,
        id: &TournamentId,
        count: u32,
    ) -> Result<(), BackendError> {
        {
            let mut tables = self.tables.write().await;
            let row = tables
                .tournaments
                .iter_mut()
                .find(|t| &t.id == id)
                .ok_or_else(|| BackendError::NotFound(format!("tournament {}", id)))?;
            row.current_players = count;
            row.updated_at = Utc::now();
        }
        self.notify(Topic::Tournaments);
        Ok(())
    }

    async fn delete_tournament(&self, id: &TournamentId) -> Result<(), BackendError> {
        {
            let mut tables = self.tables.write().await;
            let before = tables.tournaments.len();
            tables.tournaments.retain(|t| &t.id != id);
            if tables.tournaments.len() == before {
                return Err(BackendError::NotFound(format!("tournament {}", id)));
            }
            // mirrors ON DELETE CASCADE on the child tables
            tables.matches.retain(|m| &m.tournament_id != id);
            tables.registrations.retain(|r| &r.tournament_id != id);
        }
        debug!("Deleted tournament {}", id);
        self.notify(Topic::Tournaments);
        self.notify(Topic::Matches(id.clone()));
        Ok(())
    }

    async fn list_matches(&self, tournament_id: &TournamentId) -> Result<Vec<Match>, BackendError> {
        Ok(self
            .tables
            .read()
            .await
            .matches
            .iter()
            .filter(|m| &m.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn get_match(&self, id: &MatchId) -> Result<Option<Match>, BackendError> {
        Ok(self
            .tables
            .read()
            .await
            .matches
            .iter()
            .find(|m| &m.id == id)
            .cloned())
    }

    async fn insert_match(&self, new: NewMatch) -> Result<Match, BackendError> {
        let mut row = Match::new(new.tournament_id, new.round, new.match_number);
        row.status = new.status;
        {
            let mut tables = self.tables.write().await;
            if !tables.tournaments.iter().any(|t| t.id == row.tournament_id) {
                return Err(BackendError::NotFound(format!(
                    "tournament {}",
                    row.tournament_id
                )));
            }
            tables.matches.push(row.clone());
        }
        self.notify(Topic::Matches(row.tournament_id.clone()));
        Ok(row)
    }

    async fn update_match(
        &self,
        id: &MatchId,
        update: &MatchUpdate,
    ) -> Result<Match, BackendError> {
        let updated = {
            let mut tables = self.tables.write().await;
            let row = tables
                .matches
                .iter_mut()
                .find(|m| &m.id == id)
                .ok_or_else(|| BackendError::NotFound(format!("match {}", id)))?;
            row.apply(update);
            row.clone()
        };
        self.notify(Topic::Matches(updated.tournament_id.clone()));
        Ok(updated)
    }

    async fn delete_match(&self, id: &MatchId) -> Result<(), BackendError> {
        let tournament_id = {
            let mut tables = self.tables.write().await;
            let pos = tables
                .matches
                .iter()
                .position(|m| &m.id == id)
                .ok_or_else(|| BackendError::NotFound(format!("match {}", id)))?;
            tables.matches.remove(pos).tournament_id
        };
        self.notify(Topic::Matches(tournament_id));
        Ok(())
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>, BackendError> {
        Ok(self
            .tables
            .read()
            .await
            .profiles
            .iter()
            .find(|p| &p.id == user_id)
            .cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, BackendError> {
        let mut rows = self.tables.read().await.profiles.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn update_profile(
        &self,
        user_id: &UserId,
        update: &ProfileUpdate,
    ) -> Result<Profile, BackendError> {
        let mut tables = self.tables.write().await;
        let row = tables
            .profiles
            .iter_mut()
            .find(|p| &p.id == user_id)
            .ok_or_else(|| BackendError::NotFound(format!("profile {}", user_id)))?;
        row.apply(update);
        Ok(row.clone())
    }

    async fn find_registration(
        &self,
        tournament_id: &TournamentId,
        user_id: &UserId,
    ) -> Result<Option<Registration>, BackendError> {
        Ok(self
            .tables
            .read()
            .await
            .registrations
            .iter()
            .find(|r| &r.tournament_id == tournament_id && &r.user_id == user_id)
            .cloned())
    }

    async fn list_registrations_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Registration>, BackendError> {
        let mut rows: Vec<Registration> = self
            .tables
            .read()
            .await
            .registrations
            .iter()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.registered_at.cmp(&a.registered_at));
        Ok(rows)
    }

    async fn insert_registration(
        &self,
        registration: Registration,
    ) -> Result<Registration, BackendError> {
        let mut tables = self.tables.write().await;
        if tables.registrations.iter().any(|r| {
            r.tournament_id == registration.tournament_id && r.user_id == registration.user_id
        }) {
            return Err(BackendError::Conflict(format!(
                "user {} already registered for {}",
                registration.user_id, registration.tournament_id
            )));
        }
        tables.registrations.push(registration.clone());
        Ok(registration)
    }

    async fn roles_for_user(&self, user_id: &UserId) -> Result<Vec<AppRole>, BackendError> {
        Ok(self
            .tables
            .read()
            .await
            .roles
            .iter()
            .filter(|r| &r.user_id == user_id)
            .map(|r| r.role)
            .collect())
    }

    async fn list_roles(&self) -> Result<Vec<UserRole>, BackendError> {
        Ok(self.tables.read().await.roles.clone())
    }

    async fn grant_role(&self, user_id: &UserId, role: AppRole) -> Result<UserRole, BackendError> {
        let mut tables = self.tables.write().await;
        if tables
            .roles
            .iter()
            .any(|r| &r.user_id == user_id && r.role == role)
        {
            return Err(BackendError::Conflict(format!(
                "user {} already has role {}",
                user_id, role
            )));
        }
        let row = UserRole::new(user_id.clone(), role);
        tables.roles.push(row.clone());
        Ok(row)
    }

    async fn revoke_role(&self, user_id: &UserId, role: AppRole) -> Result<(), BackendError> {
        self.tables
            .write()
            .await
            .roles
            .retain(|r| !(&r.user_id == user_id && r.role == role));
        Ok(())
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError> {
        let key = format!("{}/{}", bucket, path);
        self.tables.write().await.objects.insert(
            key.clone(),
            StoredObject {
                content_type: content_type.to_string(),
                bytes,
            },
        );
        Ok(format!("{}/{}", self.public_base, key))
    }
}
