//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for registration, login, and logout.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use family_records_core::domain::Role;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::web::middleware::{session_cookie, SESSION_COOKIE};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AccountResponse {
    pub user_id: Uuid,
    pub email: String,
    #[schema(value_type = String, example = "admin")]
    pub role: Role,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/register - Create a new account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "Account created", body = AccountResponse),
        (status = 400, description = "Email or password missing", body = ErrorBody),
        (status = 401, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.app.register(&req.email, &req.password).await?;
    let response = AccountResponse {
        user_id: user.id,
        email: user.email,
        role: user.role,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /auth/login - Sign in and receive the session cookie
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Login successful", body = AccountResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = state.app.sign_in(&req.email, &req.password).await?;

    let cookie = format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        ctx.session_id,
        state.app.settings().session_ttl.num_seconds()
    );
    let response = AccountResponse {
        user_id: ctx.identity.user_id,
        email: ctx.identity.email,
        role: ctx.identity.role,
    };

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - End the session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No session cookie", body = ErrorBody)
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let session_id = session_cookie(&headers)
        .ok_or_else(|| AppError::Authentication("No session found".to_string()))?;

    // An expired session is already gone; the cookie is cleared either way.
    match state.app.load_session(session_id).await {
        Ok(mut ctx) => state.app.sign_out(&mut ctx).await?,
        Err(AppError::Authentication(_)) => {}
        Err(e) => return Err(e),
    }

    let cookie = format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    );
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]))
}
