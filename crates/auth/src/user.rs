//! User entity and the registration workflow.
//!
//! Registration is the only place a role is chosen. The instructor capability
//! grant happens here as an explicit step instead of reacting to saves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use courseware_core::{DomainError, Entity, UserId};

use crate::password::{self, PasswordError};
use crate::permissions::{Capability, capabilities_for};
use crate::Role;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub capabilities: Vec<Capability>,
    /// Staff users may sign in to back-office tooling; instructors get it at
    /// registration.
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Check a login attempt against the stored hash.
    pub fn check_password(&self, candidate: &str) -> Result<bool, PasswordError> {
        password::verify_password(candidate, &self.password_hash)
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Registration request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegisterUser {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
    pub password2: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

impl RegisterUser {
    /// Input checks that need no storage access.
    ///
    /// Username uniqueness is the caller's job.
    pub fn validate(&self) -> Result<(), DomainError> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(DomainError::validation("username: This field may not be blank."));
        }
        if username.chars().count() > 150 {
            return Err(DomainError::validation(
                "username: Ensure this field has no more than 150 characters.",
            ));
        }
        if let Some(email) = self.email.as_deref().map(str::trim) {
            if !email.is_empty() && !email.contains('@') {
                return Err(DomainError::validation("email: Enter a valid email address."));
            }
        }
        if self.password != self.password2 {
            return Err(DomainError::validation("password: Passwords do not match."));
        }
        let violations = password::password_policy_violations(&self.password, username);
        if !violations.is_empty() {
            return Err(DomainError::validation(format!("password: {}", violations.join(" "))));
        }
        Ok(())
    }
}

/// Build a new user from a registration request.
pub fn register(cmd: &RegisterUser, now: DateTime<Utc>) -> Result<User, RegistrationError> {
    cmd.validate()?;

    let role = cmd.role.unwrap_or_default();
    let password_hash = password::hash_password(&cmd.password)?;

    let mut user = User {
        id: UserId::new(),
        username: cmd.username.trim().to_string(),
        email: cmd
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_lowercase),
        password_hash,
        role,
        capabilities: Vec::new(),
        is_staff: false,
        created_at: now,
    };
    grant_role_capabilities(&mut user);

    tracing::info!(user_id = %user.id, role = %user.role, "user registered");
    Ok(user)
}

/// Registration step: instructors join the instructor capability set and
/// become staff.
pub fn grant_role_capabilities(user: &mut User) {
    user.capabilities = capabilities_for(user.role);
    if user.role.is_instructor() {
        user.is_staff = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(role: Option<Role>) -> RegisterUser {
        RegisterUser {
            username: "ada".to_string(),
            email: Some("Ada@Example.com".to_string()),
            password: "analytical-engine".to_string(),
            password2: "analytical-engine".to_string(),
            role,
        }
    }

    #[test]
    fn default_role_is_student_without_capabilities() {
        let user = register(&request(None), Utc::now()).unwrap();
        assert_eq!(user.role, Role::Student);
        assert!(user.capabilities.is_empty());
        assert!(!user.is_staff);
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn instructor_registration_grants_capabilities_and_staff() {
        let user = register(&request(Some(Role::Instructor)), Utc::now()).unwrap();
        assert!(user.is_staff);
        assert!(user.capabilities.contains(&Capability::AddCourse));
        assert!(user.capabilities.contains(&Capability::ViewLesson));
    }

    #[test]
    fn mismatched_passwords_are_rejected() {
        let mut cmd = request(None);
        cmd.password2 = "something-else".to_string();
        match register(&cmd, Utc::now()).unwrap_err() {
            RegistrationError::Domain(DomainError::Validation(msg)) => {
                assert!(msg.contains("Passwords do not match."))
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn blank_username_is_rejected() {
        let mut cmd = request(None);
        cmd.username = "   ".to_string();
        assert!(matches!(cmd.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn stored_hash_verifies_the_registration_password() {
        let user = register(&request(None), Utc::now()).unwrap();
        assert!(user.check_password("analytical-engine").unwrap());
        assert!(!user.check_password("difference-engine").unwrap());
    }
}
