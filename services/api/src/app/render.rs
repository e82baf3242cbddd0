//! services/api/src/app/render.rs
//!
//! Builds the payload of whichever view the session should see next.
//!
//! Rendering consumes a pending one-shot navigation request, so the caller must save the
//! session after every render.

use super::auth::SIGN_IN_REQUIRED;
use super::members::{ADD_MEMBER_FORBIDDEN, MEMBER_NOT_FOUND};
use super::RecordsApp;
use crate::error::AppError;
use chrono::{DateTime, NaiveDate, Utc};
use family_records_core::domain::{Document, FamilyMember, ACCEPTED_FILE_TYPES};
use family_records_core::filter::{DocumentFilter, FilterOptions};
use family_records_core::navigation::{NavEvent, View};
use family_records_core::session::SessionContext;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

pub const NO_MEMBERS: &str = "No family members yet";
pub const NO_DOCUMENTS: &str = "No documents uploaded yet";
pub const NO_MATCHING_DOCUMENTS: &str = "No documents match the current filters";
pub const LINK_UNAVAILABLE: &str = "Download link unavailable";

/// Query string of `GET /view`. Only the detail view reads it.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DetailQuery {
    /// Switches the active member before rendering.
    pub member_id: Option<Uuid>,
    /// Case-insensitive text searched across condition, file name and description.
    pub q: Option<String>,
    pub condition: Option<String>,
    pub mime_type: Option<String>,
    /// Inclusive lower bound on the upload date.
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the upload date.
    pub to: Option<NaiveDate>,
}

impl DetailQuery {
    pub fn filter(&self) -> DocumentFilter {
        DocumentFilter {
            text: self.q.clone(),
            condition: self.condition.clone(),
            mime_type: self.mime_type.clone(),
            uploaded_from: self.from,
            uploaded_to: self.to,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MemberCard {
    pub id: Uuid,
    pub full_name: String,
    /// The date of birth, or "Not provided".
    pub birth_date: String,
    pub created_at: DateTime<Utc>,
}

impl From<&FamilyMember> for MemberCard {
    fn from(member: &FamilyMember) -> Self {
        Self {
            id: member.id,
            full_name: member.full_name.clone(),
            birth_date: member.birth_date_label(),
            created_at: member.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MemberListView {
    pub members: Vec<MemberCard>,
    pub can_add_members: bool,
    pub notice: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddMemberView {
    pub can_add_members: bool,
    pub notice: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MemberOption {
    pub id: Uuid,
    pub full_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadFormView {
    pub default_doc_date: NaiveDate,
    pub accepted_extensions: Vec<String>,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct FilterOptionsView {
    pub conditions: Vec<String>,
    pub mime_types: Vec<String>,
}

impl From<FilterOptions> for FilterOptionsView {
    fn from(options: FilterOptions) -> Self {
        Self {
            conditions: options.conditions,
            mime_types: options.mime_types,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentEntry {
    pub id: Uuid,
    pub file_name: String,
    pub doc_date: NaiveDate,
    pub condition: String,
    pub description: Option<String>,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    /// Time-limited download link.
    pub download_url: Option<String>,
    /// Set instead of `download_url` when no link could be generated.
    pub link_error: Option<String>,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct MemberDetailView {
    /// Every member, for switching the active one.
    pub members: Vec<MemberOption>,
    pub member: Option<MemberCard>,
    /// Present only for sessions that may upload.
    pub upload_form: Option<UploadFormView>,
    pub filter_options: FilterOptionsView,
    pub documents: Vec<DocumentEntry>,
    pub notice: Option<String>,
}

impl MemberDetailView {
    fn notice_only(members: Vec<MemberOption>, notice: &str) -> Self {
        Self {
            members,
            notice: Some(notice.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum RenderedView {
    MemberList(MemberListView),
    AddMember(AddMemberView),
    MemberDetail(MemberDetailView),
}

impl RecordsApp {
    pub async fn render(
        &self,
        ctx: &mut SessionContext,
        query: &DetailQuery,
    ) -> Result<RenderedView, AppError> {
        match ctx.navigation.resolve() {
            View::SignIn => Err(AppError::Authentication(SIGN_IN_REQUIRED.to_string())),
            View::MemberList => Ok(RenderedView::MemberList(self.member_list(ctx).await?)),
            View::AddMember => Ok(RenderedView::AddMember(AddMemberView {
                can_add_members: ctx.is_elevated(),
                notice: (!ctx.is_elevated()).then(|| ADD_MEMBER_FORBIDDEN.to_string()),
            })),
            View::MemberDetail => Ok(RenderedView::MemberDetail(
                self.member_detail(ctx, query).await?,
            )),
        }
    }

    async fn member_list(&self, ctx: &SessionContext) -> Result<MemberListView, AppError> {
        let members = self.db.list_members().await?;
        let notice = members.is_empty().then(|| NO_MEMBERS.to_string());
        Ok(MemberListView {
            members: members.iter().map(MemberCard::from).collect(),
            can_add_members: ctx.is_elevated(),
            notice,
        })
    }

    async fn member_detail(
        &self,
        ctx: &mut SessionContext,
        query: &DetailQuery,
    ) -> Result<MemberDetailView, AppError> {
        let members = self.db.list_members().await?;
        let options: Vec<MemberOption> = members
            .iter()
            .map(|m| MemberOption {
                id: m.id,
                full_name: m.full_name.clone(),
            })
            .collect();

        let Some(first) = members.first() else {
            ctx.navigation.clear_active_member();
            return Ok(MemberDetailView::notice_only(options, NO_MEMBERS));
        };

        // An unknown selector value is not a stale selection; it just falls back.
        if let Some(requested) = query.member_id {
            if members.iter().any(|m| m.id == requested) {
                ctx.navigation.active_member = Some(requested);
            } else {
                warn!(member_id = %requested, "Selector named an unknown member");
                ctx.navigation.active_member = Some(first.id);
            }
        }

        let member = match ctx.navigation.active_member {
            Some(id) => match members.iter().find(|m| m.id == id) {
                Some(member) => member,
                None => {
                    warn!(member_id = %id, "Active member no longer exists");
                    ctx.navigation.clear_active_member();
                    ctx.navigation.apply(NavEvent::MemberMissing);
                    return Ok(MemberDetailView::notice_only(options, MEMBER_NOT_FOUND));
                }
            },
            None => {
                ctx.navigation.active_member = Some(first.id);
                first
            }
        };

        let documents = self.db.list_documents_for_member(member.id).await?;
        let filter = query.filter();
        let visible = filter.apply(&documents);

        let mut entries = Vec::with_capacity(visible.len());
        for document in visible {
            entries.push(self.document_entry(document).await);
        }

        let notice = if documents.is_empty() {
            Some(NO_DOCUMENTS.to_string())
        } else if entries.is_empty() {
            Some(NO_MATCHING_DOCUMENTS.to_string())
        } else {
            None
        };

        let upload_form = ctx.is_elevated().then(|| UploadFormView {
            default_doc_date: Utc::now().date_naive(),
            accepted_extensions: ACCEPTED_FILE_TYPES
                .iter()
                .map(|(ext, _)| ext.to_string())
                .collect(),
        });

        Ok(MemberDetailView {
            members: options,
            member: Some(MemberCard::from(member)),
            upload_form,
            filter_options: FilterOptions::from_documents(&documents).into(),
            documents: entries,
            notice,
        })
    }

    /// A link failure only affects its own entry.
    async fn document_entry(&self, document: &Document) -> DocumentEntry {
        let (download_url, link_error) = match self
            .storage
            .get_signed_url(&document.storage_key, self.settings.signed_url_ttl)
            .await
        {
            Ok(url) => (Some(url), None),
            Err(e) => {
                warn!(document_id = %document.id, "Could not sign download link: {}", e);
                (None, Some(LINK_UNAVAILABLE.to_string()))
            }
        };

        DocumentEntry {
            id: document.id,
            file_name: document.file_name.clone(),
            doc_date: document.doc_date,
            condition: document.condition.clone(),
            description: document.description.clone(),
            mime_type: document.mime_type.clone(),
            uploaded_at: document.created_at,
            download_url,
            link_error,
        }
    }
}
