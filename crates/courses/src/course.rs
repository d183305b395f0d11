use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use courseware_core::{CourseId, DomainError, DomainResult, Entity, UserId};

use crate::lesson::{LessonActivation, UpdateMode};

pub const MAX_TITLE_LEN: usize = 255;

/// Publication lifecycle of a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Draft,
    Published,
}

/// A course authored by exactly one instructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub description: String,
    pub instructor_id: UserId,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a course.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
}

/// Update of a course's scalar fields plus a batch of lesson activation
/// flags.
///
/// `is_published` is deliberately absent: it only moves through
/// [`Course::publish`] / [`Course::unpublish`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub lessons: Vec<LessonActivation>,
}

fn validate_title(title: &str) -> DomainResult<()> {
    if title.trim().is_empty() {
        return Err(DomainError::validation("title: This field may not be blank."));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(DomainError::validation(
            "title: Ensure this field has no more than 255 characters.",
        ));
    }
    Ok(())
}

fn validate_description(description: &str) -> DomainResult<()> {
    if description.trim().is_empty() {
        return Err(DomainError::validation("description: This field may not be blank."));
    }
    Ok(())
}

impl Course {
    /// Create a draft course owned by `instructor_id`.
    pub fn create(input: NewCourse, instructor_id: UserId, now: DateTime<Utc>) -> DomainResult<Self> {
        validate_title(&input.title)?;
        validate_description(&input.description)?;

        Ok(Self {
            id: CourseId::new(),
            title: input.title,
            description: input.description,
            instructor_id,
            is_published: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn status(&self) -> CourseStatus {
        if self.is_published {
            CourseStatus::Published
        } else {
            CourseStatus::Draft
        }
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.instructor_id == user_id
    }

    /// Apply the scalar part of an update.
    ///
    /// A full update must carry every required field.
    pub fn apply_update(
        &mut self,
        update: &CourseUpdate,
        mode: UpdateMode,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if mode == UpdateMode::Full {
            if update.title.is_none() {
                return Err(DomainError::validation("title: This field is required."));
            }
            if update.description.is_none() {
                return Err(DomainError::validation("description: This field is required."));
            }
        }

        if let Some(title) = &update.title {
            validate_title(title)?;
        }
        if let Some(description) = &update.description {
            validate_description(description)?;
        }

        if let Some(title) = &update.title {
            self.title = title.clone();
        }
        if let Some(description) = &update.description {
            self.description = description.clone();
        }
        self.updated_at = now;
        Ok(())
    }

    /// `draft -> published`; requires at least one lesson.
    pub fn publish(&mut self, lessons_count: usize, now: DateTime<Utc>) -> DomainResult<()> {
        if self.is_published {
            return Err(DomainError::validation("Course is already published."));
        }
        if lessons_count == 0 {
            return Err(DomainError::validation("You can not publish course without lessons."));
        }
        self.is_published = true;
        self.updated_at = now;
        Ok(())
    }

    /// `published -> draft`; mirrors the publish guard on lessons.
    pub fn unpublish(&mut self, lessons_count: usize, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_published {
            return Err(DomainError::validation("Course is not published."));
        }
        if lessons_count == 0 {
            return Err(DomainError::validation("You can not unpublish course without lessons."));
        }
        self.is_published = false;
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Course {
    type Id = CourseId;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> Course {
        Course::create(
            NewCourse {
                title: "Rust for Pythonistas".to_string(),
                description: "Ownership without tears".to_string(),
            },
            UserId::new(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn new_course_is_an_unpublished_draft() {
        let course = draft();
        assert!(!course.is_published);
        assert_eq!(course.status(), CourseStatus::Draft);
    }

    #[test]
    fn create_rejects_blank_title() {
        let err = Course::create(
            NewCourse {
                title: "  ".to_string(),
                description: "d".to_string(),
            },
            UserId::new(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn publish_without_lessons_fails_then_succeeds_with_one() {
        let mut course = draft();
        assert_eq!(
            course.publish(0, Utc::now()),
            Err(DomainError::validation("You can not publish course without lessons."))
        );
        assert!(!course.is_published);

        course.publish(1, Utc::now()).unwrap();
        assert!(course.is_published);
    }

    #[test]
    fn double_publish_reports_already_published() {
        let mut course = draft();
        course.publish(2, Utc::now()).unwrap();
        assert_eq!(
            course.publish(2, Utc::now()),
            Err(DomainError::validation("Course is already published."))
        );
    }

    #[test]
    fn double_unpublish_reports_not_published() {
        let mut course = draft();
        course.publish(1, Utc::now()).unwrap();
        course.unpublish(1, Utc::now()).unwrap();
        assert_eq!(
            course.unpublish(1, Utc::now()),
            Err(DomainError::validation("Course is not published."))
        );
    }

    #[test]
    fn unpublish_requires_lessons() {
        let mut course = draft();
        course.publish(1, Utc::now()).unwrap();
        assert!(course.unpublish(0, Utc::now()).is_err());
        assert!(course.is_published);
    }

    #[test]
    fn full_update_requires_all_fields() {
        let mut course = draft();
        let update = CourseUpdate {
            title: Some("New".to_string()),
            ..CourseUpdate::default()
        };
        assert!(course.apply_update(&update, UpdateMode::Full, Utc::now()).is_err());
        course.apply_update(&update, UpdateMode::Partial, Utc::now()).unwrap();
        assert_eq!(course.title, "New");
        assert_eq!(course.description, "Ownership without tears");
    }

    #[test]
    fn failed_update_leaves_course_untouched() {
        let mut course = draft();
        let before = course.clone();
        let update = CourseUpdate {
            title: Some("Fine".to_string()),
            description: Some(" ".to_string()),
            lessons: Vec::new(),
        };
        assert!(course.apply_update(&update, UpdateMode::Partial, Utc::now()).is_err());
        assert_eq!(course, before);
    }
}
