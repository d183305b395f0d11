use serde::Serialize;

/// Completion summary of one user in one course.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CourseProgress {
    /// Percentage in `[0, 100]`, unrounded.
    pub progress: f64,
    pub completed_lessons: u64,
    pub lessons_count: u64,
}

/// Derive the completion percentage.
///
/// `completed_lessons` counts completed progress rows of the course's lessons,
/// including lessons deactivated after completion. A course without lessons
/// reports 0.
pub fn compute_progress(lessons_count: u64, completed_lessons: u64) -> CourseProgress {
    let progress = if lessons_count == 0 {
        0.0
    } else {
        (completed_lessons as f64 / lessons_count as f64) * 100.0
    };

    CourseProgress {
        progress,
        completed_lessons,
        lessons_count,
    }
}
