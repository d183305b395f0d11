use axum::{
    Router,
    routing::{get, post},
};

pub mod common;
pub mod courses;
pub mod lessons;
pub mod system;
pub mod users;

/// Router for every endpoint behind the actor-resolving middleware.
///
/// Paths are spelled out in full, trailing slash included.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/register/", post(users::register))
        .route("/api/token/", post(users::obtain_token))
        .route("/api/token/refresh/", post(users::refresh_token))
        .route("/courses/", get(courses::list_courses).post(courses::create_course))
        .route(
            "/courses/:id/",
            get(courses::get_course)
                .put(courses::replace_course)
                .patch(courses::patch_course)
                .delete(courses::delete_course),
        )
        .route("/courses/:id/publish/", post(courses::publish_course))
        .route("/courses/:id/unpublish/", post(courses::unpublish_course))
        .route("/courses/:id/enroll/", post(courses::enroll))
        .route("/courses/:id/get_progress/", get(courses::get_progress))
        .route("/lessons/", get(lessons::list_lessons).post(lessons::create_lesson))
        .route(
            "/lessons/:id/",
            get(lessons::get_lesson)
                .put(lessons::replace_lesson)
                .patch(lessons::patch_lesson)
                .delete(lessons::delete_lesson),
        )
        .route(
            "/lessons/:id/mark_as_completed/",
            post(lessons::mark_as_completed),
        )
}
