//! Admin console operations.
//!
//! Every operation takes the caller's [`SessionContext`] and checks access
//! first: admins and owners manage tournaments, matches and profiles; only
//! owners manage roles.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::backend::{BackendError, DataBackend, TournamentOrder, TournamentQuery};
use crate::models::{
    AppRole, Match, MatchId, MatchStatus, MatchUpdate, NewMatch, Profile, ProfileUpdate,
    Tournament, TournamentDraft, TournamentId, UserId, UserRole,
};
use crate::session::{SessionContext, SessionError};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Please log in")]
    NotSignedIn,

    #[error("{0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Backend(BackendError),
}

impl From<SessionError> for AdminError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotSignedIn => AdminError::NotSignedIn,
            SessionError::Forbidden(msg) => AdminError::Forbidden(msg.to_string()),
        }
    }
}

impl From<BackendError> for AdminError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::NotFound(what) => AdminError::NotFound(what),
            BackendError::Conflict(what) => AdminError::Conflict(what),
            other => AdminError::Backend(other),
        }
    }
}

// Tournaments

fn check_draft(draft: &TournamentDraft) -> Result<(), AdminError> {
    if draft.title.trim().is_empty() {
        return Err(AdminError::Invalid("Title is required".to_string()));
    }
    if draft.game.trim().is_empty() {
        return Err(AdminError::Invalid("Game is required".to_string()));
    }
    if draft.max_players == 0 {
        return Err(AdminError::Invalid(
            "Max players must be at least 1".to_string(),
        ));
    }
    if let Some(end) = draft.end_date {
        if end < draft.start_date {
            return Err(AdminError::Invalid(
                "End date must not be before the start date".to_string(),
            ));
        }
    }
    Ok(())
}

/// All tournaments, newest first.
pub async fn list_tournaments(
    backend: &dyn DataBackend,
    session: &SessionContext,
) -> Result<Vec<Tournament>, AdminError> {
    session.require_admin()?;
    Ok(backend
        .list_tournaments(TournamentQuery {
            order: TournamentOrder::CreatedDesc,
            limit: None,
        })
        .await?)
}

pub async fn create_tournament(
    backend: &dyn DataBackend,
    session: &SessionContext,
    draft: TournamentDraft,
) -> Result<Tournament, AdminError> {
    let user = session.require_admin()?;
    check_draft(&draft)?;
    let tournament = backend
        .insert_tournament(draft, Some(user.id.clone()))
        .await?;
    info!("Created tournament {} ({})", tournament.title, tournament.id);
    Ok(tournament)
}

pub async fn update_tournament(
    backend: &dyn DataBackend,
    session: &SessionContext,
    id: &TournamentId,
    draft: TournamentDraft,
) -> Result<Tournament, AdminError> {
    session.require_admin()?;
    check_draft(&draft)?;
    let tournament = backend.update_tournament(id, draft).await?;
    info!("Updated tournament {}", id);
    Ok(tournament)
}

/// Delete a tournament; its matches and registrations go with it.
pub async fn delete_tournament(
    backend: &dyn DataBackend,
    session: &SessionContext,
    id: &TournamentId,
) -> Result<(), AdminError> {
    session.require_admin()?;
    backend.delete_tournament(id).await?;
    info!("Deleted tournament {}", id);
    Ok(())
}

// Users and roles

/// A profile with the roles its user holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserWithRoles {
    #[serde(flatten)]
    pub profile: Profile,
    pub roles: Vec<AppRole>,
}

/// Profiles newest first, joined with roles, filtered by `query` over
/// full name, username, discord id and team name.
pub async fn list_users(
    backend: &dyn DataBackend,
    session: &SessionContext,
    query: &str,
) -> Result<Vec<UserWithRoles>, AdminError> {
    session.require_admin()?;
    let profiles = backend.list_profiles().await?;
    let roles = backend.list_roles().await?;

    let mut by_user: HashMap<UserId, Vec<AppRole>> = HashMap::new();
    for UserRole { user_id, role, .. } in roles {
        by_user.entry(user_id).or_default().push(role);
    }

    Ok(profiles
        .into_iter()
        .filter(|p| p.matches_query(query))
        .map(|profile| {
            let roles = by_user.remove(&profile.id).unwrap_or_default();
            UserWithRoles { profile, roles }
        })
        .collect())
}

fn managed_role(role: AppRole) -> Result<(), AdminError> {
    match role {
        AppRole::Admin | AppRole::Owner => Ok(()),
        AppRole::User => Err(AdminError::Invalid(
            "Only the admin and owner roles can be granted or revoked".to_string(),
        )),
    }
}

/// Grant `role` to a user. Owners only.
pub async fn grant_role(
    backend: &dyn DataBackend,
    session: &SessionContext,
    user_id: &UserId,
    role: AppRole,
) -> Result<UserRole, AdminError> {
    let owner = session.require_owner()?;
    managed_role(role)?;
    if backend.roles_for_user(user_id).await?.contains(&role) {
        return Err(AdminError::Conflict(format!("User already has the {} role", role)));
    }
    let row = backend.grant_role(user_id, role).await?;
    info!("{} granted {} to {}", owner.id, role, user_id);
    Ok(row)
}

/// Revoke `role` from a user. Owners only.
pub async fn revoke_role(
    backend: &dyn DataBackend,
    session: &SessionContext,
    user_id: &UserId,
    role: AppRole,
) -> Result<(), AdminError> {
    let owner = session.require_owner()?;
    managed_role(role)?;
    backend.revoke_role(user_id, role).await?;
    info!("{} revoked {} from {}", owner.id, role, user_id);
    Ok(())
}

/// The fields an admin may change on someone else's profile.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdminProfileEdit {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub discord_id: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub experience_level: Option<crate::models::ExperienceLevel>,
}

impl From<AdminProfileEdit> for ProfileUpdate {
    fn from(edit: AdminProfileEdit) -> Self {
        let trim = |v: Option<String>| v.map(|s| s.trim().to_string());
        ProfileUpdate {
            full_name: trim(edit.full_name),
            username: trim(edit.username),
            discord_id: trim(edit.discord_id),
            team_name: trim(edit.team_name),
            experience_level: edit.experience_level,
            ..Default::default()
        }
    }
}

pub async fn update_user_profile(
    backend: &dyn DataBackend,
    session: &SessionContext,
    user_id: &UserId,
    edit: AdminProfileEdit,
) -> Result<Profile, AdminError> {
    let admin = session.require_admin()?;
    let profile = backend.update_profile(user_id, &edit.into()).await?;
    info!("{} edited profile {}", admin.id, user_id);
    Ok(profile)
}

// Matches

/// Matches of a tournament, by round then match number.
pub async fn list_matches(
    backend: &dyn DataBackend,
    session: &SessionContext,
    tournament_id: &TournamentId,
) -> Result<Vec<Match>, AdminError> {
    session.require_admin()?;
    let mut matches = backend.list_matches(tournament_id).await?;
    matches.sort_by_key(|m| (m.round, m.match_number));
    Ok(matches)
}

/// Where the next created match goes.
///
/// Without a round, a new round after the current last one is opened.
/// With a round, the match is appended after that round's matches.
pub fn next_match_slot(existing: &[Match], round: Option<u32>) -> (u32, u32) {
    match round {
        None => {
            let max_round = existing.iter().map(|m| m.round).max().unwrap_or(0);
            (max_round + 1, 1)
        }
        Some(round) => {
            let in_round = existing.iter().filter(|m| m.round == round).count() as u32;
            (round, in_round + 1)
        }
    }
}

/// Options for a new match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateMatch {
    #[serde(default)]
    pub round: Option<u32>,
}

pub async fn create_match(
    backend: &dyn DataBackend,
    session: &SessionContext,
    tournament_id: &TournamentId,
    options: CreateMatch,
) -> Result<Match, AdminError> {
    session.require_admin()?;
    if options.round == Some(0) {
        return Err(AdminError::Invalid("Rounds start at 1".to_string()));
    }
    if backend.get_tournament(tournament_id).await?.is_none() {
        return Err(AdminError::NotFound(format!("tournament {}", tournament_id)));
    }

    let existing = backend.list_matches(tournament_id).await?;
    let (round, match_number) = next_match_slot(&existing, options.round);
    let m = backend
        .insert_match(NewMatch {
            tournament_id: tournament_id.clone(),
            round,
            match_number,
            status: MatchStatus::Scheduled,
        })
        .await?;
    info!(
        "Created match {} (round {}, #{}) in {}",
        m.id, round, match_number, tournament_id
    );
    Ok(m)
}

pub async fn update_match(
    backend: &dyn DataBackend,
    session: &SessionContext,
    id: &MatchId,
    update: MatchUpdate,
) -> Result<Match, AdminError> {
    session.require_admin()?;
    if update.round == Some(0) || update.match_number == Some(0) {
        return Err(AdminError::Invalid(
            "Round and match number start at 1".to_string(),
        ));
    }
    let m = backend.update_match(id, &update).await?;
    info!("Updated match {}", id);
    Ok(m)
}

pub async fn delete_match(
    backend: &dyn DataBackend,
    session: &SessionContext,
    id: &MatchId,
) -> Result<(), AdminError> {
    session.require_admin()?;
    backend.delete_match(id).await?;
    info!("Deleted match {}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::session::{AuthUser, RoleFlags};

    fn draft(title: &str) -> TournamentDraft {
        TournamentDraft {
            title: title.to_string(),
            game: "Rocket League".to_string(),
            description: None,
            rules: None,
            prize_pool: "$2,000".to_string(),
            max_players: 64,
            start_date: "2025-07-01T18:00:00Z".parse().unwrap(),
            end_date: None,
            status: Default::default(),
            image_url: None,
        }
    }

    async fn session_with(backend: &MemoryBackend, token: &str, roles: &[AppRole]) -> SessionContext {
        let user = backend.add_user(token, &format!("{}@example.com", token)).await;
        for role in roles {
            backend.seed_role(&user.id, *role).await;
        }
        SessionContext::resolve(backend, token).await.unwrap()
    }

    fn plain_user() -> SessionContext {
        SessionContext::signed_in(
            AuthUser {
                id: "u-plain".into(),
                email: None,
            },
            RoleFlags::default(),
        )
    }

    #[tokio::test]
    async fn test_tournament_crud_requires_admin() {
        let backend = MemoryBackend::new();
        let result = create_tournament(&backend, &plain_user(), draft("Cup")).await;
        assert!(matches!(result, Err(AdminError::Forbidden(_))));

        let result = list_tournaments(&backend, &SessionContext::anonymous()).await;
        assert!(matches!(result, Err(AdminError::NotSignedIn)));
    }

    #[tokio::test]
    async fn test_tournament_crud() {
        let backend = MemoryBackend::new();
        let admin = session_with(&backend, "admin", &[AppRole::Admin]).await;

        let t = create_tournament(&backend, &admin, draft("Spring Cup"))
            .await
            .unwrap();
        assert_eq!(t.created_by.as_ref(), admin.user_id());

        let mut edited = draft("Spring Cup II");
        edited.max_players = 32;
        let t = update_tournament(&backend, &admin, &t.id, edited).await.unwrap();
        assert_eq!(t.title, "Spring Cup II");
        assert_eq!(t.max_players, 32);

        assert_eq!(list_tournaments(&backend, &admin).await.unwrap().len(), 1);
        delete_tournament(&backend, &admin, &t.id).await.unwrap();
        assert!(list_tournaments(&backend, &admin).await.unwrap().is_empty());
        assert!(matches!(
            delete_tournament(&backend, &admin, &t.id).await,
            Err(AdminError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_tournament_validates() {
        let backend = MemoryBackend::new();
        let admin = session_with(&backend, "admin", &[AppRole::Admin]).await;
        let result = create_tournament(&backend, &admin, draft("  ")).await;
        assert!(matches!(result, Err(AdminError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_only_owner_manages_roles() {
        let backend = MemoryBackend::new();
        let admin = session_with(&backend, "admin", &[AppRole::Admin]).await;
        let owner = session_with(&backend, "owner", &[AppRole::Owner]).await;
        let target = backend.add_user("target", "t@example.com").await;

        let result = grant_role(&backend, &admin, &target.id, AppRole::Admin).await;
        assert!(matches!(result, Err(AdminError::Forbidden(_))));

        grant_role(&backend, &owner, &target.id, AppRole::Admin)
            .await
            .unwrap();
        let again = grant_role(&backend, &owner, &target.id, AppRole::Admin).await;
        assert!(matches!(again, Err(AdminError::Conflict(_))));

        let result = revoke_role(&backend, &admin, &target.id, AppRole::Admin).await;
        assert!(matches!(result, Err(AdminError::Forbidden(_))));

        revoke_role(&backend, &owner, &target.id, AppRole::Admin)
            .await
            .unwrap();
        assert!(backend.roles_for_user(&target.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_role_is_not_managed() {
        let backend = MemoryBackend::new();
        let owner = session_with(&backend, "owner", &[AppRole::Owner]).await;
        let result = grant_role(&backend, &owner, &"u-2".into(), AppRole::User).await;
        assert!(matches!(result, Err(AdminError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_list_users_filters_and_joins_roles() {
        let backend = MemoryBackend::new();
        let admin = session_with(&backend, "admin", &[AppRole::Admin]).await;
        let other = backend.add_user("other", "o@example.com").await;
        backend
            .update_profile(
                &other.id,
                &ProfileUpdate {
                    team_name: Some("Night Owls".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let all = list_users(&backend, &admin, "").await.unwrap();
        assert_eq!(all.len(), 2);

        let owls = list_users(&backend, &admin, "OWLS").await.unwrap();
        assert_eq!(owls.len(), 1);
        assert_eq!(owls[0].profile.id, other.id);
        assert!(owls[0].roles.is_empty());

        let me = all
            .iter()
            .find(|u| Some(&u.profile.id) == admin.user_id())
            .unwrap();
        assert_eq!(me.roles, vec![AppRole::Admin]);
    }

    #[tokio::test]
    async fn test_admin_edits_other_profile() {
        let backend = MemoryBackend::new();
        let admin = session_with(&backend, "admin", &[AppRole::Admin]).await;
        let other = backend.add_user("other", "o@example.com").await;

        let profile = update_user_profile(
            &backend,
            &admin,
            &other.id,
            AdminProfileEdit {
                username: Some(" renamed ".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(profile.username.as_deref(), Some("renamed"));
    }

    #[test]
    fn test_next_match_slot() {
        let t: TournamentId = "t-1".into();
        let existing = vec![
            Match::new(t.clone(), 1, 1),
            Match::new(t.clone(), 1, 2),
            Match::new(t.clone(), 2, 1),
        ];
        assert_eq!(next_match_slot(&[], None), (1, 1));
        assert_eq!(next_match_slot(&existing, None), (3, 1));
        assert_eq!(next_match_slot(&existing, Some(1)), (1, 3));
        assert_eq!(next_match_slot(&existing, Some(5)), (5, 1));
    }

    #[tokio::test]
    async fn test_match_management() {
        let backend = MemoryBackend::new();
        let admin = session_with(&backend, "admin", &[AppRole::Admin]).await;
        let t = create_tournament(&backend, &admin, draft("Cup")).await.unwrap();

        let first = create_match(&backend, &admin, &t.id, CreateMatch::default())
            .await
            .unwrap();
        let second = create_match(&backend, &admin, &t.id, CreateMatch { round: Some(1) })
            .await
            .unwrap();
        let third = create_match(&backend, &admin, &t.id, CreateMatch::default())
            .await
            .unwrap();
        assert_eq!((first.round, first.match_number), (1, 1));
        assert_eq!((second.round, second.match_number), (1, 2));
        assert_eq!((third.round, third.match_number), (2, 1));

        let updated = update_match(
            &backend,
            &admin,
            &first.id,
            MatchUpdate {
                player1_score: Some(3),
                status: Some(MatchStatus::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(updated.completed_at.is_some());

        delete_match(&backend, &admin, &second.id).await.unwrap();
        let listed = list_matches(&backend, &admin, &t.id).await.unwrap();
        let ids: Vec<&MatchId> = listed.iter().map(|m| &m.id).collect();
        assert_eq!(ids, vec![&first.id, &third.id]);
    }

    #[tokio::test]
    async fn test_create_match_unknown_tournament() {
        let backend = MemoryBackend::new();
        let admin = session_with(&backend, "admin", &[AppRole::Admin]).await;
        let result = create_match(&backend, &admin, &"nope".into(), CreateMatch::default()).await;
        assert!(matches!(result, Err(AdminError::NotFound(_))));
    }
}
