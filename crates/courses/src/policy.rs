//! Access policy evaluator.
//!
//! `authorize(actor, action, target)` is a pure decision over in-memory
//! entity state. Callers load the target, ask, and only then mutate.
//!
//! Rules, first match decides:
//! 1. Anonymous actors may list courses and register; anything else needs
//!    authentication (published course detail fails the enrollment gate).
//! 2. Instructors and admins pass the author gate; ownership is still
//!    required for every write. Admins get no extra grant.
//! 3. Students never write courses or lessons. They enroll themselves, track
//!    their own progress, and read what their enrollments expose.
//! 4. Course detail needs ownership or an enrollment.
//!
//! Role violations are `PermissionDenied`, state preconditions are
//! `Validation`, invisible targets are `NotFound`.

use courseware_auth::{Actor, Role};
use courseware_core::{DomainError, DomainResult, UserId};

use crate::course::Course;
use crate::lesson::Lesson;

/// Policy decisions fail with the same taxonomy as the rest of the domain.
pub type PolicyError = DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Register,
    ListCourses,
    ViewCourse,
    CreateCourse,
    UpdateCourse,
    DeleteCourse,
    PublishCourse,
    UnpublishCourse,
    Enroll,
    ViewProgress,
    ListLessons,
    ViewLesson,
    CreateLesson,
    UpdateLesson,
    DeleteLesson,
    MarkLessonComplete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Register => "register",
            Action::ListCourses => "list_courses",
            Action::ViewCourse => "view_course",
            Action::CreateCourse => "create_course",
            Action::UpdateCourse => "update_course",
            Action::DeleteCourse => "delete_course",
            Action::PublishCourse => "publish_course",
            Action::UnpublishCourse => "unpublish_course",
            Action::Enroll => "enroll",
            Action::ViewProgress => "view_progress",
            Action::ListLessons => "list_lessons",
            Action::ViewLesson => "view_lesson",
            Action::CreateLesson => "create_lesson",
            Action::UpdateLesson => "update_lesson",
            Action::DeleteLesson => "delete_lesson",
            Action::MarkLessonComplete => "mark_lesson_complete",
        }
    }
}

/// What an action is aimed at, with the relationship facts the rules need.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    None,
    /// `enrolled`: the actor holds an enrollment in `course`.
    Course { course: &'a Course, enrolled: bool },
    Lesson {
        lesson: &'a Lesson,
        course: &'a Course,
        enrolled: bool,
    },
    /// Progress of `subject` in `course`.
    Progress { course: &'a Course, subject: UserId },
}

/// Boolean projection of [`authorize`].
pub fn allow(actor: &Actor, action: Action, target: &Target<'_>) -> bool {
    authorize(actor, action, target).is_ok()
}

/// Decide whether `actor` may perform `action` on `target`.
pub fn authorize(actor: &Actor, action: Action, target: &Target<'_>) -> Result<(), PolicyError> {
    let decision = match actor {
        Actor::Anonymous => authorize_anonymous(action, target),
        Actor::User { user_id, role } => authorize_user(*user_id, *role, action, target),
    };

    if let Err(e) = &decision {
        tracing::debug!(actor = %actor, action = action.as_str(), error = %e, "policy denied");
    }
    decision
}

/// Published courses plus everything the actor owns.
pub fn course_listed(actor: &Actor, course: &Course) -> bool {
    course.is_published || actor.user_id().is_some_and(|id| course.is_owned_by(id))
}

/// Lesson scoping per role.
///
/// Students see active lessons of courses they are enrolled in, instructors
/// the lessons of their own courses, admins everything.
pub fn lesson_visible(actor: &Actor, lesson: &Lesson, course: &Course, enrolled: bool) -> bool {
    match actor {
        Actor::Anonymous => false,
        Actor::User { role: Role::Student, .. } => lesson.is_active && enrolled,
        Actor::User { user_id, role: Role::Instructor } => course.is_owned_by(*user_id),
        Actor::User { role: Role::Admin, .. } => true,
    }
}

fn authorize_anonymous(action: Action, target: &Target<'_>) -> DomainResult<()> {
    match (action, target) {
        (Action::Register | Action::ListCourses, _) => Ok(()),
        (Action::ViewCourse, Target::Course { course, .. }) if course.is_published => Err(
            DomainError::validation("You must be authenticated to see course details."),
        ),
        (Action::ViewCourse, Target::Course { .. }) => Err(DomainError::not_found()),
        _ => Err(DomainError::Unauthenticated),
    }
}

fn authorize_user(user_id: UserId, role: Role, action: Action, target: &Target<'_>) -> DomainResult<()> {
    let actor = Actor::user(user_id, role);

    match action {
        Action::Register | Action::ListCourses | Action::ListLessons => Ok(()),

        Action::ViewCourse => {
            let (course, enrolled) = course_target(action, target)?;
            if !course_listed(&actor, course) {
                return Err(DomainError::not_found());
            }
            if course.is_owned_by(user_id) || enrolled {
                Ok(())
            } else {
                Err(DomainError::validation(
                    "To see course details you must be enrolled in it.",
                ))
            }
        }

        Action::CreateCourse => require_author(role, "You do not have permission to create or update courses."),

        Action::UpdateCourse | Action::DeleteCourse | Action::PublishCourse | Action::UnpublishCourse => {
            require_author(role, "You do not have permission to create or update courses.")?;
            let (course, _) = course_target(action, target)?;
            require_owner(&actor, course)
        }

        Action::Enroll => {
            let (course, _) = course_target(action, target)?;
            if role != Role::Student {
                return Err(DomainError::permission_denied(
                    "You must be a student to enroll in a course.",
                ));
            }
            if !course_listed(&actor, course) {
                return Err(DomainError::not_found());
            }
            Ok(())
        }

        Action::ViewProgress => {
            let Target::Progress { course, subject } = target else {
                return Err(mismatched(action));
            };
            if !course_listed(&actor, course) {
                return Err(DomainError::not_found());
            }
            if *subject == user_id || course.is_owned_by(user_id) {
                Ok(())
            } else {
                Err(DomainError::permission_denied(
                    "You can only view your own progress.",
                ))
            }
        }

        Action::ViewLesson => {
            let (lesson, course, enrolled) = lesson_target(action, target)?;
            if lesson_visible(&actor, lesson, course, enrolled) {
                Ok(())
            } else {
                Err(DomainError::not_found())
            }
        }

        Action::CreateLesson => {
            require_author(role, "You do not have permission to create or update lessons.")?;
            let (course, _) = course_target(action, target)?;
            if course.is_owned_by(user_id) {
                Ok(())
            } else {
                Err(DomainError::permission_denied(
                    "You can only add lessons to your own courses.",
                ))
            }
        }

        Action::UpdateLesson | Action::DeleteLesson => {
            require_author(role, "You do not have permission to create or update lessons.")?;
            let (lesson, course, enrolled) = lesson_target(action, target)?;
            if course.is_owned_by(user_id) {
                Ok(())
            } else if lesson_visible(&actor, lesson, course, enrolled) {
                Err(DomainError::permission_denied("You do not own this lesson's course."))
            } else {
                Err(DomainError::not_found())
            }
        }

        Action::MarkLessonComplete => {
            let (lesson, course, enrolled) = lesson_target(action, target)?;
            if !lesson_visible(&actor, lesson, course, enrolled) {
                return Err(DomainError::not_found());
            }
            if role != Role::Student {
                return Err(DomainError::permission_denied(
                    "Only students can track lesson progress.",
                ));
            }
            Ok(())
        }
    }
}

fn require_author(role: Role, message: &str) -> DomainResult<()> {
    if role.can_author() {
        Ok(())
    } else {
        Err(DomainError::permission_denied(message))
    }
}

/// Owner passes; other authors get 403 on listed courses and 404 on drafts
/// they cannot see.
fn require_owner(actor: &Actor, course: &Course) -> DomainResult<()> {
    if actor.user_id().is_some_and(|id| course.is_owned_by(id)) {
        Ok(())
    } else if course_listed(actor, course) {
        Err(DomainError::permission_denied("You do not own this course."))
    } else {
        Err(DomainError::not_found())
    }
}

fn course_target<'a>(action: Action, target: &Target<'a>) -> DomainResult<(&'a Course, bool)> {
    match *target {
        Target::Course { course, enrolled } => Ok((course, enrolled)),
        _ => Err(mismatched(action)),
    }
}

fn lesson_target<'a>(action: Action, target: &Target<'a>) -> DomainResult<(&'a Lesson, &'a Course, bool)> {
    match *target {
        Target::Lesson { lesson, course, enrolled } => Ok((lesson, course, enrolled)),
        _ => Err(mismatched(action)),
    }
}

fn mismatched(action: Action) -> DomainError {
    DomainError::permission_denied(format!("no target supplied for {}", action.as_str()))
}
