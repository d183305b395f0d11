use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use courseware_core::LessonId;
use courseware_courses::{LessonUpdate, NewLesson, UpdateMode};

use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub async fn list_lessons(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
) -> axum::response::Response {
    match services.list_lessons(ctx.actor()).await {
        Ok(lessons) => {
            let body: Vec<dto::LessonView> = lessons.iter().map(dto::LessonView::from).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_lesson(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    payload: Result<Json<NewLesson>, JsonRejection>,
) -> axum::response::Response {
    if let Err(e) = ctx.actor().require_user() {
        return errors::domain_error_to_response(e);
    }
    let Json(body) = match payload {
        Ok(p) => p,
        Err(e) => return errors::json_rejection_to_response(e),
    };

    match services.create_lesson(ctx.actor(), body).await {
        Ok(lesson) => (StatusCode::CREATED, Json(dto::LessonView::from(&lesson))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_lesson(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: LessonId = match parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.get_lesson(ctx.actor(), id).await {
        Ok(lesson) => (StatusCode::OK, Json(dto::LessonView::from(&lesson))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn replace_lesson(
    services: Extension<Arc<AppServices>>,
    ctx: Extension<ActorContext>,
    id: Path<String>,
    payload: Result<Json<LessonUpdate>, JsonRejection>,
) -> axum::response::Response {
    update_lesson(services, ctx, id, payload, UpdateMode::Full).await
}

pub async fn patch_lesson(
    services: Extension<Arc<AppServices>>,
    ctx: Extension<ActorContext>,
    id: Path<String>,
    payload: Result<Json<LessonUpdate>, JsonRejection>,
) -> axum::response::Response {
    update_lesson(services, ctx, id, payload, UpdateMode::Partial).await
}

async fn update_lesson(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    payload: Result<Json<LessonUpdate>, JsonRejection>,
    mode: UpdateMode,
) -> axum::response::Response {
    let id: LessonId = match parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let Json(body) = match payload {
        Ok(p) => p,
        Err(e) => return errors::json_rejection_to_response(e),
    };

    match services.update_lesson(ctx.actor(), id, body, mode).await {
        Ok(lesson) => (StatusCode::OK, Json(dto::LessonView::from(&lesson))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_lesson(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: LessonId = match parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.delete_lesson(ctx.actor(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn mark_as_completed(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: LessonId = match parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.mark_lesson_complete(ctx.actor(), id).await {
        Ok(_) => (StatusCode::OK, Json(dto::StatusView { status: "lesson completed" })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
