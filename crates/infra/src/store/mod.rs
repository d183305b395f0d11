//! Storage abstraction for users, courses, lessons, enrollments and progress.
//!
//! The store is deliberately dumb: it persists and loads entities and enforces
//! uniqueness, nothing more. Authorization and state-machine rules live in
//! `courseware-courses` and are applied by the caller before any write.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use thiserror::Error;

use courseware_auth::User;
use courseware_core::{CourseId, LessonId, UserId};
use courseware_courses::{Course, Enrollment, Lesson, LessonActivation, LessonProgress};

pub mod in_memory;
pub mod postgres;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint was violated (duplicate username, etc.).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Backend failure: connection, lock poisoning, undecodable row.
    #[error("storage error: {0}")]
    Storage(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence port used by the API services.
///
/// Listing methods return rows in creation order.
#[async_trait::async_trait]
pub trait CourseStore: Send + Sync {
    // --- users ---

    /// Insert a new user; `Conflict` when the username is taken.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    // --- courses ---

    async fn insert_course(&self, course: &Course) -> StoreResult<()>;

    async fn get_course(&self, id: CourseId) -> StoreResult<Option<Course>>;

    async fn list_courses(&self) -> StoreResult<Vec<Course>>;

    /// Flip only the publication flag. Used by publish/unpublish.
    async fn set_published(
        &self,
        id: CourseId,
        is_published: bool,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Write the course's title and description plus the active flags of the
    /// given lessons in one atomic step. The publication flag is left as
    /// stored. Activations for lessons outside the course are skipped.
    async fn apply_course_update(
        &self,
        course: &Course,
        activations: &[LessonActivation],
    ) -> StoreResult<()>;

    /// Delete a course with its lessons, enrollments and progress rows.
    /// Returns `false` when nothing was deleted.
    async fn delete_course(&self, id: CourseId) -> StoreResult<bool>;

    // --- lessons ---

    async fn insert_lesson(&self, lesson: &Lesson) -> StoreResult<()>;

    async fn get_lesson(&self, id: LessonId) -> StoreResult<Option<Lesson>>;

    async fn list_lessons(&self, course_id: CourseId) -> StoreResult<Vec<Lesson>>;

    async fn list_all_lessons(&self) -> StoreResult<Vec<Lesson>>;

    async fn update_lesson(&self, lesson: &Lesson) -> StoreResult<()>;

    /// Delete a lesson and its progress rows.
    async fn delete_lesson(&self, id: LessonId) -> StoreResult<bool>;

    /// Lessons of the course, active or not.
    async fn count_lessons(&self, course_id: CourseId) -> StoreResult<u64>;

    // --- enrollments ---

    /// Insert unless the (user, course) pair already exists.
    ///
    /// Returns the stored enrollment and whether it was created by this call.
    async fn enroll(&self, enrollment: Enrollment) -> StoreResult<(Enrollment, bool)>;

    async fn is_enrolled(&self, user_id: UserId, course_id: CourseId) -> StoreResult<bool>;

    async fn has_enrollments(&self, course_id: CourseId) -> StoreResult<bool>;

    async fn enrolled_course_ids(&self, user_id: UserId) -> StoreResult<HashSet<CourseId>>;

    // --- progress ---

    /// Upsert the (user, lesson) progress row with `completed = true`.
    async fn mark_lesson_complete(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        now: DateTime<Utc>,
    ) -> StoreResult<LessonProgress>;

    /// Completed progress rows of the user over the course's lessons,
    /// including inactive lessons.
    async fn count_completed(&self, user_id: UserId, course_id: CourseId) -> StoreResult<u64>;
}
