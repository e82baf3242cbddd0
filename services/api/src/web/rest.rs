//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the view and member endpoints and the master
//! definition for the OpenAPI specification.
//!
//! Every handler that touches navigation saves the session afterwards, including when
//! the operation itself failed, so a cleared selection is never lost.

use crate::app::render::{
    AddMemberView, DetailQuery, DocumentEntry, FilterOptionsView, MemberCard, MemberDetailView,
    MemberListView, MemberOption, RenderedView, UploadFormView,
};
use crate::error::{AppError, ErrorBody};
use crate::web::auth::{AccountResponse, CredentialsRequest};
use crate::web::documents::DocumentResponse;
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::NaiveDate;
use family_records_core::navigation::View;
use family_records_core::session::SessionContext;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::register_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        get_view_handler,
        select_view_handler,
        add_member_handler,
        open_member_handler,
        delete_member_handler,
        crate::web::documents::upload_document_handler,
        crate::web::files::file_handler,
    ),
    components(
        schemas(
            CredentialsRequest,
            AccountResponse,
            SelectViewRequest,
            AddMemberRequest,
            RenderedView,
            MemberListView,
            AddMemberView,
            MemberDetailView,
            MemberCard,
            MemberOption,
            UploadFormView,
            FilterOptionsView,
            DocumentEntry,
            DocumentResponse,
            ErrorBody,
        )
    ),
    tags(
        (name = "Family Records API", description = "Shared medical records for a family.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SelectViewRequest {
    #[schema(value_type = String, example = "member_detail")]
    pub view: View,
}

#[derive(Deserialize, ToSchema)]
pub struct AddMemberRequest {
    pub full_name: String,
    /// Date of birth, `YYYY-MM-DD`.
    pub dob: Option<NaiveDate>,
}

/// Saves the session whatever the outcome of the operation, then returns that outcome.
pub(crate) async fn save_then<T>(
    state: &AppState,
    ctx: &SessionContext,
    outcome: Result<T, AppError>,
) -> Result<T, AppError> {
    state.app.save_session(ctx).await?;
    outcome
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Render the view the session should see now.
///
/// A member opened from the list is shown here once; afterwards the selected view wins.
#[utoipa::path(
    get,
    path = "/view",
    params(DetailQuery),
    responses(
        (status = 200, description = "The current view", body = RenderedView),
        (status = 401, description = "Not signed in", body = ErrorBody)
    )
)]
pub async fn get_view_handler(
    State(state): State<Arc<AppState>>,
    Extension(mut ctx): Extension<SessionContext>,
    Query(query): Query<DetailQuery>,
) -> Result<Json<RenderedView>, AppError> {
    let outcome = state.app.render(&mut ctx, &query).await;
    save_then(&state, &ctx, outcome).await.map(Json)
}

/// Change the view selector.
#[utoipa::path(
    put,
    path = "/view",
    request_body = SelectViewRequest,
    responses(
        (status = 204, description = "View selected"),
        (status = 400, description = "The view cannot be selected", body = ErrorBody),
        (status = 401, description = "Not signed in", body = ErrorBody)
    )
)]
pub async fn select_view_handler(
    State(state): State<Arc<AppState>>,
    Extension(mut ctx): Extension<SessionContext>,
    Json(req): Json<SelectViewRequest>,
) -> Result<StatusCode, AppError> {
    state.app.select_view(&mut ctx, req.view)?;
    state.app.save_session(&ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Add a family member.
#[utoipa::path(
    post,
    path = "/members",
    request_body = AddMemberRequest,
    responses(
        (status = 201, description = "Member added", body = MemberCard),
        (status = 400, description = "Full name missing", body = ErrorBody),
        (status = 403, description = "Read-only account", body = ErrorBody)
    )
)]
pub async fn add_member_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Json(req): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    let member = state.app.add_member(&ctx, &req.full_name, req.dob).await?;
    Ok((StatusCode::CREATED, Json(MemberCard::from(&member))))
}

/// Open a member from the list. The next `GET /view` shows their details.
#[utoipa::path(
    post,
    path = "/members/{member_id}/open",
    params(("member_id" = Uuid, Path, description = "The member to open.")),
    responses(
        (status = 204, description = "Member opened"),
        (status = 404, description = "Member not found", body = ErrorBody)
    )
)]
pub async fn open_member_handler(
    State(state): State<Arc<AppState>>,
    Extension(mut ctx): Extension<SessionContext>,
    Path(member_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.app.open_member(&mut ctx, member_id).await?;
    state.app.save_session(&ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a member and all of their documents.
#[utoipa::path(
    delete,
    path = "/members/{member_id}",
    params(("member_id" = Uuid, Path, description = "The member to delete.")),
    responses(
        (status = 204, description = "Member deleted"),
        (status = 403, description = "Read-only account", body = ErrorBody),
        (status = 404, description = "Member not found", body = ErrorBody)
    )
)]
pub async fn delete_member_handler(
    State(state): State<Arc<AppState>>,
    Extension(mut ctx): Extension<SessionContext>,
    Path(member_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let outcome = state.app.delete_member(&mut ctx, member_id).await;
    save_then(&state, &ctx, outcome).await?;
    Ok(StatusCode::NO_CONTENT)
}
