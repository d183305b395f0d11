use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use courseware_core::CourseId;
use courseware_courses::{CourseUpdate, NewCourse, UpdateMode};

use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub async fn list_courses(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    query: Result<Query<dto::CourseListQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::query_rejection_to_response(e),
    };

    match services.list_courses(ctx.actor(), query.into()).await {
        Ok(listings) => {
            let body: Vec<dto::CourseView> = listings.iter().map(dto::CourseView::from).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_course(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    payload: Result<Json<NewCourse>, JsonRejection>,
) -> axum::response::Response {
    // Anonymous callers learn they must authenticate before body problems.
    if let Err(e) = ctx.actor().require_user() {
        return errors::domain_error_to_response(e);
    }
    let Json(body) = match payload {
        Ok(p) => p,
        Err(e) => return errors::json_rejection_to_response(e),
    };

    match services.create_course(ctx.actor(), body).await {
        Ok(listing) => (StatusCode::CREATED, Json(dto::CourseView::from(&listing))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_course(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CourseId = match parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.get_course(ctx.actor(), id).await {
        Ok(detail) => (StatusCode::OK, Json(dto::CourseDetailView::from(&detail))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn replace_course(
    services: Extension<Arc<AppServices>>,
    ctx: Extension<ActorContext>,
    id: Path<String>,
    payload: Result<Json<CourseUpdate>, JsonRejection>,
) -> axum::response::Response {
    update_course(services, ctx, id, payload, UpdateMode::Full).await
}

pub async fn patch_course(
    services: Extension<Arc<AppServices>>,
    ctx: Extension<ActorContext>,
    id: Path<String>,
    payload: Result<Json<CourseUpdate>, JsonRejection>,
) -> axum::response::Response {
    update_course(services, ctx, id, payload, UpdateMode::Partial).await
}

async fn update_course(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    payload: Result<Json<CourseUpdate>, JsonRejection>,
    mode: UpdateMode,
) -> axum::response::Response {
    let id: CourseId = match parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let Json(body) = match payload {
        Ok(p) => p,
        Err(e) => return errors::json_rejection_to_response(e),
    };

    match services.update_course(ctx.actor(), id, body, mode).await {
        Ok(detail) => (StatusCode::OK, Json(dto::CourseDetailView::from(&detail))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_course(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CourseId = match parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.delete_course(ctx.actor(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn publish_course(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CourseId = match parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.publish_course(ctx.actor(), id).await {
        Ok(course) => (
            StatusCode::OK,
            Json(dto::CourseStatusView::new("course published", &course)),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn unpublish_course(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CourseId = match parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.unpublish_course(ctx.actor(), id).await {
        Ok(course) => (
            StatusCode::OK,
            Json(dto::CourseStatusView::new("course unpublished", &course)),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn enroll(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CourseId = match parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.enroll(ctx.actor(), id).await {
        Ok((_, true)) => (
            StatusCode::CREATED,
            Json(dto::StatusView { status: "enrollment created" }),
        )
            .into_response(),
        Ok((_, false)) => (
            StatusCode::OK,
            Json(dto::StatusView { status: "already enrolled" }),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_progress(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    query: Result<Query<dto::ProgressQuery>, QueryRejection>,
) -> axum::response::Response {
    let id: CourseId = match parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::query_rejection_to_response(e),
    };

    match services
        .get_progress(ctx.actor(), id, query.user_id.as_deref())
        .await
    {
        Ok(progress) => (StatusCode::OK, Json(progress)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
