use serde::{Deserialize, Serialize};

use crate::Role;

/// Named grant attached to a user at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    AddCourse,
    ChangeCourse,
    ViewCourse,
    AddLesson,
    ChangeLesson,
    ViewLesson,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::AddCourse => "add_course",
            Capability::ChangeCourse => "change_course",
            Capability::ViewCourse => "view_course",
            Capability::AddLesson => "add_lesson",
            Capability::ChangeLesson => "change_lesson",
            Capability::ViewLesson => "view_lesson",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        INSTRUCTOR_CAPABILITIES.iter().copied().find(|c| c.as_str() == s)
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability set of the instructor group.
pub const INSTRUCTOR_CAPABILITIES: [Capability; 6] = [
    Capability::AddCourse,
    Capability::ChangeCourse,
    Capability::ViewCourse,
    Capability::AddLesson,
    Capability::ChangeLesson,
    Capability::ViewLesson,
];

/// Capabilities granted to a freshly registered user of `role`.
pub fn capabilities_for(role: Role) -> Vec<Capability> {
    match role {
        Role::Instructor => INSTRUCTOR_CAPABILITIES.to_vec(),
        Role::Student | Role::Admin => Vec::new(),
    }
}
