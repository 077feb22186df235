//! Session context.
//!
//! The signed-in user and their role flags travel as an explicit value.
//! Handlers receive it per request; long-lived clients keep one and feed it
//! [`AuthEvent`]s, which re-derive the role flags from the backend.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::backend::{BackendError, DataBackend};
use crate::models::{AppRole, UserId};

/// An authenticated user as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

/// Role flags derived from a user's role rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RoleFlags {
    pub is_admin: bool,
    pub is_owner: bool,
}

impl RoleFlags {
    /// Owners are implicitly admins.
    pub fn from_roles(roles: &[AppRole]) -> Self {
        let is_owner = roles.contains(&AppRole::Owner);
        Self {
            is_admin: is_owner || roles.contains(&AppRole::Admin),
            is_owner,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("You must be logged in")]
    NotSignedIn,

    #[error("{0}")]
    Forbidden(&'static str),
}

/// Auth state transitions reported by the auth provider.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(AuthUser),
    TokenRefreshed(AuthUser),
    SignedOut,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionContext {
    user: Option<AuthUser>,
    roles: RoleFlags,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(user: AuthUser, roles: RoleFlags) -> Self {
        Self {
            user: Some(user),
            roles,
        }
    }

    /// Load the role flags for `user` and build a session.
    pub async fn for_user(
        backend: &dyn DataBackend,
        user: AuthUser,
    ) -> Result<Self, BackendError> {
        let roles = backend.roles_for_user(&user.id).await?;
        Ok(Self::signed_in(user, RoleFlags::from_roles(&roles)))
    }

    /// Resolve a bearer token into a session.
    pub async fn resolve(backend: &dyn DataBackend, token: &str) -> Result<Self, BackendError> {
        let user = backend.user_for_token(token).await?;
        Self::for_user(backend, user).await
    }

    /// Apply an auth state change, refreshing role flags from the backend.
    pub async fn apply(
        &mut self,
        event: AuthEvent,
        backend: &dyn DataBackend,
    ) -> Result<(), BackendError> {
        match event {
            AuthEvent::SignedIn(user) | AuthEvent::TokenRefreshed(user) => {
                debug!("Refreshing session for user {}", user.id);
                *self = Self::for_user(backend, user).await?;
            }
            AuthEvent::SignedOut => {
                *self = Self::anonymous();
            }
        }
        Ok(())
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user.as_ref().map(|u| &u.id)
    }

    pub fn roles(&self) -> RoleFlags {
        self.roles
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_some() && self.roles.is_admin
    }

    pub fn is_owner(&self) -> bool {
        self.user.is_some() && self.roles.is_owner
    }

    pub fn require_user(&self) -> Result<&AuthUser, SessionError> {
        self.user.as_ref().ok_or(SessionError::NotSignedIn)
    }

    pub fn require_admin(&self) -> Result<&AuthUser, SessionError> {
        let user = self.require_user()?;
        if !self.roles.is_admin {
            return Err(SessionError::Forbidden("Admin or Owner access required"));
        }
        Ok(user)
    }

    pub fn require_owner(&self) -> Result<&AuthUser, SessionError> {
        let user = self.require_user()?;
        if !self.roles.is_owner {
            return Err(SessionError::Forbidden("Only owners can manage roles"));
        }
        Ok(user)
    }
}
