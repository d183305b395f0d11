use chrono::{DateTime, Utc};

use courseware_core::{CourseId, EnrollmentId, Entity, LessonId, LessonProgressId, UserId};

/// A student's enrollment in a course. Created once, never updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub created_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn new(user_id: UserId, course_id: CourseId, now: DateTime<Utc>) -> Self {
        Self {
            id: EnrollmentId::new(),
            user_id,
            course_id,
            created_at: now,
        }
    }
}

impl Entity for Enrollment {
    type Id = EnrollmentId;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Completion record, unique per (user, lesson).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonProgress {
    pub id: LessonProgressId,
    pub user_id: UserId,
    pub lesson_id: LessonId,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LessonProgress {
    pub fn new(user_id: UserId, lesson_id: LessonId, now: DateTime<Utc>) -> Self {
        Self {
            id: LessonProgressId::new(),
            user_id,
            lesson_id,
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Upsert step of "mark as completed": reuse the existing row for the
    /// pair when there is one, otherwise start a new one; either way the
    /// result is completed. There is no way back to `completed = false`.
    pub fn mark_complete(
        existing: Option<LessonProgress>,
        user_id: UserId,
        lesson_id: LessonId,
        now: DateTime<Utc>,
    ) -> LessonProgress {
        let mut progress = existing
            .filter(|p| p.user_id == user_id && p.lesson_id == lesson_id)
            .unwrap_or_else(|| LessonProgress::new(user_id, lesson_id, now));
        progress.completed = true;
        progress.updated_at = now;
        progress
    }
}

impl Entity for LessonProgress {
    type Id = LessonProgressId;

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

    #[test]
    fn mark_complete_creates_completed_row_when_absent() {
        let (user, lesson) = (UserId::new(), LessonId::new());
        let progress = LessonProgress::mark_complete(None, user, lesson, Utc::now());
        assert!(progress.completed);
        assert_eq!(progress.user_id, user);
        assert_eq!(progress.lesson_id, lesson);
    }

    #[test]
    fn mark_complete_keeps_identity_of_existing_row() {
        let (user, lesson) = (UserId::new(), LessonId::new());
        let existing = LessonProgress::new(user, lesson, Utc::now());
        let id = existing.id;

        let first = LessonProgress::mark_complete(Some(existing), user, lesson, Utc::now());
        let second = LessonProgress::mark_complete(Some(first), user, lesson, Utc::now());
        assert_eq!(second.id, id);
        assert!(second.completed);
    }

    #[test]
    fn mark_complete_ignores_row_of_another_pair() {
        let user = UserId::new();
        let other = LessonProgress::new(user, LessonId::new(), Utc::now());
        let lesson = LessonId::new();
        let progress = LessonProgress::mark_complete(Some(other.clone()), user, lesson, Utc::now());
        assert_ne!(progress.id, other.id);
        assert_eq!(progress.lesson_id, lesson);
    }
}
