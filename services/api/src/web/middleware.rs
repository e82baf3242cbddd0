//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::app::auth::SIGN_IN_REQUIRED;
use crate::error::AppError;
use crate::web::state::AppState;

/// Name of the cookie that carries the sign-in session id.
pub const SESSION_COOKIE: &str = "session";

/// Reads the session id out of the `Cookie` header.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| {
            let (name, value) = c.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
        })
}

/// Middleware that loads the session behind the cookie.
///
/// If valid, inserts the `SessionContext` into request extensions for handlers to use.
/// If missing or expired, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session_id = session_cookie(req.headers())
        .ok_or_else(|| AppError::Authentication(SIGN_IN_REQUIRED.to_string()))?
        .to_string();

    let ctx = state.app.load_session(&session_id).await?;
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}
