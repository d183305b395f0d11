use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use courseware_auth::RegisterUser;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    payload: Result<Json<RegisterUser>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(p) => p,
        Err(e) => return errors::json_rejection_to_response(e),
    };

    match services.register(ctx.actor(), body).await {
        Ok(user) => (StatusCode::CREATED, Json(dto::RegisteredUserView::from(&user))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn obtain_token(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::TokenRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(p) => p,
        Err(e) => return errors::json_rejection_to_response(e),
    };

    match services.obtain_token(&body.username, &body.password).await {
        Ok(pair) => (StatusCode::OK, Json(pair)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn refresh_token(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::RefreshRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(p) => p,
        Err(e) => return errors::json_rejection_to_response(e),
    };

    match services.refresh_token(&body.refresh) {
        Ok(access) => (StatusCode::OK, Json(dto::AccessTokenView { access })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
