use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use courseware_auth::{Actor, JwtValidator};

use crate::app::errors;
use crate::context::ActorContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// Resolve the acting user from the `Authorization` header.
///
/// No header means an anonymous actor; a header that is not a valid access
/// token is rejected with 401 before reaching any handler.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let actor = match extract_bearer(req.headers()) {
        Ok(None) => Actor::Anonymous,
        Ok(Some(token)) => match state.jwt.validate(token, Utc::now()) {
            Ok(claims) => Actor::user(claims.sub, claims.role),
            Err(e) => {
                tracing::debug!(error = %e, "bearer token rejected");
                return errors::json_error(
                    StatusCode::UNAUTHORIZED,
                    "token_not_valid",
                    "Given token not valid for any token type",
                );
            }
        },
        Err(msg) => {
            return errors::json_error(StatusCode::UNAUTHORIZED, "authentication_failed", msg);
        }
    };

    req.extensions_mut().insert(ActorContext::new(actor));
    next.run(req).await
}

/// One log line per request.
pub async fn trace_requests(req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "request handled"
    );
    response
}

fn extract_bearer(headers: &HeaderMap) -> Result<Option<&str>, &'static str> {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let header = header
        .to_str()
        .map_err(|_| "Authorization header must be ASCII.")?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or("Authorization header must use the Bearer scheme.")?
        .trim();
    if token.is_empty() {
        return Err("Invalid Authorization header. No credentials provided.");
    }

    Ok(Some(token))
}
