use core::str::FromStr;

use serde::{Deserialize, Serialize};

use courseware_core::DomainError;

/// Role of a registered user.
///
/// Closed set: policy code matches on it exhaustively. A role decides the
/// capability set granted at registration; roles never inherit from each
/// other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Instructor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }

    pub fn is_student(&self) -> bool {
        matches!(self, Role::Student)
    }

    pub fn is_instructor(&self) -> bool {
        matches!(self, Role::Instructor)
    }

    /// Roles allowed past the author-level write gate (ownership is checked
    /// separately).
    pub fn can_author(&self) -> bool {
        match self {
            Role::Instructor | Role::Admin => true,
            Role::Student => false,
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "instructor" => Ok(Role::Instructor),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::validation(format!(
                "\"{other}\" is not a valid role."
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_roles() {
        assert_eq!("student".parse::<Role>().unwrap(), Role::Student);
        assert_eq!("instructor".parse::<Role>().unwrap(), Role::Instructor);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
    }

    #[test]
    fn rejects_unknown_role() {
        assert!(matches!(
            "superuser".parse::<Role>(),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn only_instructor_and_admin_can_author() {
        assert!(!Role::Student.can_author());
        assert!(Role::Instructor.can_author());
        assert!(Role::Admin.can_author());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Instructor).unwrap(), "\"instructor\"");
    }
}
