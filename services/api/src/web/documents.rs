//! services/api/src/web/documents.rs
//!
//! The multipart upload endpoint behind the add-document form.

use crate::app::{UploadInput, UploadedFile};
use crate::error::{AppError, ErrorBody};
use crate::web::rest::save_then;
use crate::web::state::AppState;
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, NaiveDate, Utc};
use family_records_core::domain::Document;
use family_records_core::session::SessionContext;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

/// The document record created by an upload.
#[derive(Serialize, ToSchema)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub member_id: Uuid,
    pub doc_date: NaiveDate,
    pub condition: String,
    pub description: Option<String>,
    pub file_name: String,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<Document> for DocumentResponse {
    fn from(document: Document) -> Self {
        Self {
            id: document.id,
            member_id: document.member_id,
            doc_date: document.doc_date,
            condition: document.condition,
            description: document.description,
            file_name: document.file_name,
            mime_type: document.mime_type,
            uploaded_at: document.created_at,
        }
    }
}

fn malformed(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("The upload exceeds the maximum allowed size".to_string())
    } else {
        AppError::Validation(format!("Malformed upload: {}", e))
    }
}

/// Reads the form fields. Unknown fields are ignored; an empty file part counts as no file.
async fn read_form(mut multipart: Multipart) -> Result<UploadInput, AppError> {
    let mut input = UploadInput::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "doc_date" => {
                let raw = field.text().await.map_err(malformed)?;
                let raw = raw.trim();
                if !raw.is_empty() {
                    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                        AppError::Validation("Document date must be YYYY-MM-DD".to_string())
                    })?;
                    input.doc_date = Some(date);
                }
            }
            "condition" => input.condition = field.text().await.map_err(malformed)?,
            "description" => input.description = Some(field.text().await.map_err(malformed)?),
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(malformed)?;
                if !file_name.is_empty() || !data.is_empty() {
                    input.file = Some(UploadedFile { file_name, data });
                }
            }
            _ => {}
        }
    }

    Ok(input)
}

/// Upload a document for a member.
///
/// Accepts `multipart/form-data` with the fields `doc_date` (optional, `YYYY-MM-DD`),
/// `condition`, `description` (optional) and `file` (PDF, PNG or JPEG).
#[utoipa::path(
    post,
    path = "/members/{member_id}/documents",
    params(("member_id" = Uuid, Path, description = "The member the document belongs to.")),
    request_body(content_type = "multipart/form-data", description = "The add-document form."),
    responses(
        (status = 201, description = "Document stored", body = DocumentResponse),
        (status = 400, description = "A required field is missing or invalid", body = ErrorBody),
        (status = 403, description = "Read-only account", body = ErrorBody),
        (status = 404, description = "Member not found", body = ErrorBody),
        (status = 413, description = "Upload too large", body = ErrorBody),
        (status = 502, description = "Document storage failed", body = ErrorBody)
    )
)]
pub async fn upload_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(mut ctx): Extension<SessionContext>,
    Path(member_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    state.app.authorize_upload(&ctx)?;
    let input = read_form(multipart).await?;
    let outcome = state.app.upload_document(&mut ctx, member_id, input).await;
    let document = save_then(&state, &ctx, outcome).await?;
    Ok((StatusCode::CREATED, Json(DocumentResponse::from(document))))
}
