use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use courseware_core::{CourseId, DomainError, DomainResult, Entity, LessonId};

use crate::course::MAX_TITLE_LEN;

/// Whether an update replaces the whole resource (PUT) or only the fields it
/// carries (PATCH).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Full,
    Partial,
}

/// A lesson inside exactly one course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    pub id: LessonId,
    pub course_id: CourseId,
    pub title: String,
    pub description: String,
    pub video_url: Option<String>,
    pub content: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a lesson.
#[derive(Debug, Clone, Deserialize)]
pub struct NewLesson {
    pub course: CourseId,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Standalone lesson update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LessonUpdate {
    pub course: Option<CourseId>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub content: Option<String>,
    pub is_active: Option<bool>,
}

/// One entry of the batch activation list carried by a course update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonActivation {
    pub id: LessonId,
    pub is_active: bool,
}

fn non_blank(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

fn require_content(video_url: Option<&str>, content: Option<&str>) -> DomainResult<()> {
    if !non_blank(video_url) && !non_blank(content) {
        return Err(DomainError::validation(
            "Either video_url or content must be provided.",
        ));
    }
    Ok(())
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

fn validate_video_url(url: &str) -> DomainResult<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(host) if !host.is_empty() && !host.contains(char::is_whitespace) => Ok(()),
        _ => Err(DomainError::validation("video_url: Enter a valid URL.")),
    }
}

impl Lesson {
    /// Create an active lesson; requires a video or text payload.
    pub fn create(input: NewLesson, now: DateTime<Utc>) -> DomainResult<Self> {
        validate_title(&input.title)?;
        validate_description(&input.description)?;
        require_content(input.video_url.as_deref(), input.content.as_deref())?;
        if let Some(url) = input.video_url.as_deref().filter(|u| !u.is_empty()) {
            validate_video_url(url)?;
        }

        Ok(Self {
            id: LessonId::new(),
            course_id: input.course,
            title: input.title,
            description: input.description,
            video_url: input.video_url.filter(|u| !u.is_empty()),
            content: input.content.filter(|c| !c.is_empty()),
            is_active: input.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a standalone update.
    ///
    /// `course_has_enrollments` describes the lesson's *current* course; a
    /// lesson cannot move away from a course somebody is enrolled in.
    pub fn apply_update(
        &mut self,
        update: &LessonUpdate,
        mode: UpdateMode,
        course_has_enrollments: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if mode == UpdateMode::Full {
            if update.title.is_none() {
                return Err(DomainError::validation("title: This field is required."));
            }
            if update.description.is_none() {
                return Err(DomainError::validation("description: This field is required."));
            }
            if update.course.is_none() {
                return Err(DomainError::validation("course: This field is required."));
            }
            require_content(update.video_url.as_deref(), update.content.as_deref())?;
        }

        if let Some(title) = &update.title {
            validate_title(title)?;
        }
        if let Some(description) = &update.description {
            validate_description(description)?;
        }
        if let Some(url) = update.video_url.as_deref().filter(|u| !u.is_empty()) {
            validate_video_url(url)?;
        }
        if let Some(course) = update.course {
            if course != self.course_id && course_has_enrollments {
                return Err(DomainError::validation(
                    "You cannot change the course of a lesson that has enrollments.",
                ));
            }
        }

        if let Some(course) = update.course {
            self.course_id = course;
        }
        if let Some(title) = &update.title {
            self.title = title.clone();
        }
        if let Some(description) = &update.description {
            self.description = description.clone();
        }
        if let Some(url) = &update.video_url {
            self.video_url = Some(url.clone()).filter(|u| !u.is_empty());
        }
        if let Some(content) = &update.content {
            self.content = Some(content.clone()).filter(|c| !c.is_empty());
        }
        if let Some(is_active) = update.is_active {
            self.is_active = is_active;
        }
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Lesson {
    type Id = LessonId;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Resolve a batch activation request against the lessons of one course.
///
/// Ids that do not belong to `lessons` are dropped silently. When an id is
/// repeated the last entry wins.
pub fn plan_activation(lessons: &[Lesson], requested: &[LessonActivation]) -> Vec<LessonActivation> {
    let known: HashSet<LessonId> = lessons.iter().map(|l| l.id).collect();

    let mut planned: Vec<LessonActivation> = Vec::new();
    for entry in requested.iter().filter(|e| known.contains(&e.id)) {
        match planned.iter_mut().find(|p| p.id == entry.id) {
            Some(existing) => existing.is_active = entry.is_active,
            None => planned.push(*entry),
        }
    }
    planned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_lesson(course: CourseId) -> NewLesson {
        NewLesson {
            course,
            title: "Borrowing".to_string(),
            description: "Shared and mutable references".to_string(),
            video_url: None,
            content: Some("Text body".to_string()),
            is_active: None,
        }
    }

    #[test]
    fn create_requires_video_or_content() {
        let mut input = new_lesson(CourseId::new());
        input.content = None;
        assert_eq!(
            Lesson::create(input, Utc::now()),
            Err(DomainError::validation("Either video_url or content must be provided."))
        );
    }

    #[test]
    fn create_defaults_to_active() {
        let lesson = Lesson::create(new_lesson(CourseId::new()), Utc::now()).unwrap();
        assert!(lesson.is_active);
        assert_eq!(lesson.content.as_deref(), Some("Text body"));
    }

    #[test]
    fn create_rejects_bad_video_url() {
        let mut input = new_lesson(CourseId::new());
        input.video_url = Some("ftp://example.com/v.mp4".to_string());
        assert!(Lesson::create(input, Utc::now()).is_err());
    }

    #[test]
    fn full_update_requires_payload_but_patch_does_not() {
        let course = CourseId::new();
        let mut lesson = Lesson::create(new_lesson(course), Utc::now()).unwrap();

        let put = LessonUpdate {
            course: Some(course),
            title: Some("Lifetimes".to_string()),
            description: Some("'a and friends".to_string()),
            ..LessonUpdate::default()
        };
        assert!(lesson.apply_update(&put, UpdateMode::Full, false, Utc::now()).is_err());

        let patch = LessonUpdate {
            title: Some("Lifetimes".to_string()),
            ..LessonUpdate::default()
        };
        lesson.apply_update(&patch, UpdateMode::Partial, false, Utc::now()).unwrap();
        assert_eq!(lesson.title, "Lifetimes");
        assert_eq!(lesson.content.as_deref(), Some("Text body"));
    }

    #[test]
    fn cannot_move_lesson_out_of_course_with_enrollments() {
        let mut lesson = Lesson::create(new_lesson(CourseId::new()), Utc::now()).unwrap();
        let update = LessonUpdate {
            course: Some(CourseId::new()),
            ..LessonUpdate::default()
        };
        assert_eq!(
            lesson.apply_update(&update, UpdateMode::Partial, true, Utc::now()),
            Err(DomainError::validation(
                "You cannot change the course of a lesson that has enrollments."
            ))
        );
        lesson.apply_update(&update, UpdateMode::Partial, false, Utc::now()).unwrap();
        assert_eq!(Some(lesson.course_id), update.course);
    }

    #[test]
    fn restating_the_same_course_is_not_a_move() {
        let course = CourseId::new();
        let mut lesson = Lesson::create(new_lesson(course), Utc::now()).unwrap();
        let update = LessonUpdate {
            course: Some(course),
            ..LessonUpdate::default()
        };
        lesson.apply_update(&update, UpdateMode::Partial, true, Utc::now()).unwrap();
    }

    #[test]
    fn plan_activation_ignores_foreign_ids() {
        let lesson = Lesson::create(new_lesson(CourseId::new()), Utc::now()).unwrap();
        let stranger = LessonId::new();
        let planned = plan_activation(
            std::slice::from_ref(&lesson),
            &[
                LessonActivation { id: lesson.id, is_active: false },
                LessonActivation { id: stranger, is_active: true },
            ],
        );
        assert_eq!(planned, vec![LessonActivation { id: lesson.id, is_active: false }]);
    }

    #[test]
    fn plan_activation_last_duplicate_wins() {
        let lesson = Lesson::create(new_lesson(CourseId::new()), Utc::now()).unwrap();
        let planned = plan_activation(
            std::slice::from_ref(&lesson),
            &[
                LessonActivation { id: lesson.id, is_active: false },
                LessonActivation { id: lesson.id, is_active: true },
            ],
        );
        assert_eq!(planned, vec![LessonActivation { id: lesson.id, is_active: true }]);
    }
}
