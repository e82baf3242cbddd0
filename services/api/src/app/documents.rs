//! services/api/src/app/documents.rs
//!
//! The add-document action of the member detail view.

use super::members::MEMBER_NOT_FOUND;
use super::{require_elevated, RecordsApp};
use crate::error::AppError;
use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use family_records_core::domain::{accepted_mime_type, Document, NewDocument};
use family_records_core::ports::PortError;
use family_records_core::session::SessionContext;
use tracing::{error, info};
use uuid::Uuid;

pub const UPLOAD_FORBIDDEN: &str = "Only administrators can upload documents";
pub const CONDITION_REQUIRED: &str = "Condition is required";
pub const FILE_REQUIRED: &str = "Please select a file";
pub const UNSUPPORTED_FILE_TYPE: &str = "Only PDF, PNG and JPEG files are accepted";

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Bytes,
}

/// The add-document form as submitted.
#[derive(Debug, Clone, Default)]
pub struct UploadInput {
    /// Defaults to today when absent.
    pub doc_date: Option<NaiveDate>,
    pub condition: String,
    pub description: Option<String>,
    pub file: Option<UploadedFile>,
}

impl RecordsApp {
    /// Fails with `AppError::Forbidden` for sessions that may not upload. Handlers call this
    /// before reading the request body.
    pub fn authorize_upload(&self, ctx: &SessionContext) -> Result<(), AppError> {
        require_elevated(ctx, UPLOAD_FORBIDDEN)
    }

    /// Stores the file first, then the record that points at it.
    ///
    /// Validation happens before any storage call, so a rejected form leaves nothing behind.
    /// If the record insert fails after a successful upload the object stays in storage
    /// without a record; that case is logged with its key.
    pub async fn upload_document(
        &self,
        ctx: &mut SessionContext,
        member_id: Uuid,
        input: UploadInput,
    ) -> Result<Document, AppError> {
        self.authorize_upload(ctx)?;

        let condition = input.condition.trim();
        if condition.is_empty() {
            return Err(AppError::Validation(CONDITION_REQUIRED.to_string()));
        }
        let Some(file) = input.file.filter(|f| !f.file_name.trim().is_empty()) else {
            return Err(AppError::Validation(FILE_REQUIRED.to_string()));
        };
        let Some(mime_type) = accepted_mime_type(&file.file_name) else {
            return Err(AppError::Validation(UNSUPPORTED_FILE_TYPE.to_string()));
        };

        match self.db.get_member(member_id).await {
            Ok(_) => {}
            Err(PortError::NotFound(_)) => {
                if ctx.navigation.active_member == Some(member_id) {
                    ctx.navigation.clear_active_member();
                }
                return Err(AppError::NotFound(MEMBER_NOT_FOUND.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let storage_key = self
            .storage
            .upload(file.data, &file.file_name, mime_type)
            .await
            .map_err(|e| {
                error!(%member_id, "Document upload failed: {}", e);
                AppError::Storage(e.to_string())
            })?;

        let description = input
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let new_document = NewDocument {
            member_id,
            uploaded_by: ctx.identity.user_id,
            doc_date: input.doc_date.unwrap_or_else(|| Utc::now().date_naive()),
            condition: condition.to_string(),
            description,
            storage_key: storage_key.clone(),
            file_name: file.file_name,
            mime_type: mime_type.to_string(),
        };

        let document = self.db.create_document(new_document).await.map_err(|e| {
            error!(%member_id, %storage_key, "Stored object has no record: {}", e);
            AppError::from(e)
        })?;

        info!(
            document_id = %document.id,
            %member_id,
            uploaded_by = %ctx.identity.user_id,
            "Uploaded document"
        );
        Ok(document)
    }
}
