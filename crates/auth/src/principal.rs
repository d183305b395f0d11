use courseware_core::{DomainError, UserId};

use crate::Role;

/// The entity issuing a request.
///
/// Threaded explicitly into every policy and service call; nothing reads the
/// acting user from ambient request state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    User { user_id: UserId, role: Role },
}

impl Actor {
    pub fn user(user_id: UserId, role: Role) -> Self {
        Actor::User { user_id, role }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Actor::User { .. })
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Actor::Anonymous => None,
            Actor::User { user_id, .. } => Some(*user_id),
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Actor::Anonymous => None,
            Actor::User { role, .. } => Some(*role),
        }
    }

    /// Identity of an authenticated actor, or `Unauthenticated`.
    pub fn require_user(&self) -> Result<(UserId, Role), DomainError> {
        match self {
            Actor::Anonymous => Err(DomainError::Unauthenticated),
            Actor::User { user_id, role } => Ok((*user_id, *role)),
        }
    }
}

impl core::fmt::Display for Actor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Actor::Anonymous => f.write_str("anonymous"),
            Actor::User { user_id, role } => write!(f, "{role}:{user_id}"),
        }
    }
}
