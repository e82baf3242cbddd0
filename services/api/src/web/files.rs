//! services/api/src/web/files.rs
//!
//! Serves files from the local document store to holders of a signed link.

use crate::error::{AppError, ErrorBody};
use crate::web::state::AppState;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use family_records_core::domain::accepted_mime_type;
use family_records_core::ports::PortError;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::error;
use utoipa::IntoParams;

const LINK_REJECTED: &str = "This link has expired or is invalid";

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SignedLink {
    /// Unix timestamp after which the link stops working.
    pub expires: i64,
    /// Hex-encoded HMAC-SHA256 of `"{key}:{expires}"`.
    pub signature: String,
}

/// Download a stored document through a signed link.
#[utoipa::path(
    get,
    path = "/files/{key}",
    params(
        ("key" = String, Path, description = "The storage key."),
        SignedLink
    ),
    responses(
        (status = 200, description = "The file contents"),
        (status = 403, description = "Link expired or forged", body = ErrorBody),
        (status = 404, description = "No such file", body = ErrorBody)
    )
)]
pub async fn file_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(link): Query<SignedLink>,
) -> Result<Response, AppError> {
    let Some(store) = &state.file_server else {
        return Err(AppError::NotFound("File not found".to_string()));
    };

    let path = store
        .open_signed(&key, link.expires, &link.signature)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized => AppError::Forbidden(LINK_REJECTED.to_string()),
            PortError::NotFound(_) => AppError::NotFound("File not found".to_string()),
            other => AppError::from(other),
        })?;

    let file = tokio::fs::File::open(&path).await.map_err(|e| {
        error!(key = %key, "Failed to open stored file: {}", e);
        AppError::Storage(e.to_string())
    })?;
    let content_type = accepted_mime_type(&key).unwrap_or("application/octet-stream");

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, "inline"),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}
