//! Courses domain module (courses, lessons, enrollments, progress).
//!
//! This crate contains the business rules of the platform, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage).

pub mod course;
pub mod enrollment;
pub mod lesson;
pub mod policy;
pub mod progress;

pub use course::{Course, CourseStatus, CourseUpdate, NewCourse};
pub use enrollment::{Enrollment, LessonProgress};
pub use lesson::{Lesson, LessonActivation, LessonUpdate, NewLesson, UpdateMode, plan_activation};
pub use policy::{Action, PolicyError, Target, allow, authorize, course_listed, lesson_visible};
pub use progress::{CourseProgress, compute_progress};
