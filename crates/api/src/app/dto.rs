use serde::{Deserialize, Serialize};

use courseware_auth::{Actor, Role, User};
use courseware_core::{CourseId, LessonId, UserId};
use courseware_courses::{Course, Lesson};

use crate::app::services::{CourseDetail, CourseFilter, CourseListing};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CourseListQuery {
    pub is_published: Option<bool>,
    pub enrolled: Option<bool>,
}

impl From<CourseListQuery> for CourseFilter {
    fn from(q: CourseListQuery) -> Self {
        CourseFilter {
            is_published: q.is_published,
            enrolled: q.enrolled,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProgressQuery {
    pub user_id: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub role: Role,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}

/// Body of a successful registration.
#[derive(Debug, Serialize)]
pub struct RegisteredUserView {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
}

impl From<&User> for RegisteredUserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CourseView {
    pub id: CourseId,
    pub title: String,
    pub description: String,
    pub instructor: UserView,
    pub is_published: bool,
    pub lessons_count: u64,
    pub is_enrolled: bool,
}

impl From<&CourseListing> for CourseView {
    fn from(listing: &CourseListing) -> Self {
        Self {
            id: listing.course.id,
            title: listing.course.title.clone(),
            description: listing.course.description.clone(),
            instructor: UserView::from(&listing.instructor),
            is_published: listing.course.is_published,
            lessons_count: listing.lessons_count,
            is_enrolled: listing.is_enrolled,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CourseDetailView {
    pub id: CourseId,
    pub title: String,
    pub description: String,
    pub instructor: UserView,
    pub is_published: bool,
    /// Active lessons only, in creation order.
    pub lessons: Vec<LessonView>,
}

impl From<&CourseDetail> for CourseDetailView {
    fn from(detail: &CourseDetail) -> Self {
        Self {
            id: detail.course.id,
            title: detail.course.title.clone(),
            description: detail.course.description.clone(),
            instructor: UserView::from(&detail.instructor),
            is_published: detail.course.is_published,
            lessons: detail.lessons.iter().map(LessonView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LessonView {
    pub id: LessonId,
    pub title: String,
    pub course: CourseId,
    pub description: String,
    pub video_url: Option<String>,
    pub content: Option<String>,
    pub is_active: bool,
}

impl From<&Lesson> for LessonView {
    fn from(lesson: &Lesson) -> Self {
        Self {
            id: lesson.id,
            title: lesson.title.clone(),
            course: lesson.course_id,
            description: lesson.description.clone(),
            video_url: lesson.video_url.clone(),
            content: lesson.content.clone(),
            is_active: lesson.is_active,
        }
    }
}

/// Short acknowledgement returned by action endpoints.
#[derive(Debug, Serialize)]
pub struct StatusView {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CourseStatusView {
    pub status: &'static str,
    pub id: CourseId,
    pub is_published: bool,
}

impl CourseStatusView {
    pub fn new(status: &'static str, course: &Course) -> Self {
        Self {
            status,
            id: course.id,
            is_published: course.is_published,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WhoAmIView {
    pub authenticated: bool,
    pub user_id: Option<UserId>,
    pub role: Option<Role>,
}

impl From<&Actor> for WhoAmIView {
    fn from(actor: &Actor) -> Self {
        Self {
            authenticated: actor.is_authenticated(),
            user_id: actor.user_id(),
            role: actor.role(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccessTokenView {
    pub access: String,
}
