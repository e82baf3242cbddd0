//! services/api/src/app/members.rs

use super::{require_elevated, RecordsApp};
use crate::error::AppError;
use chrono::NaiveDate;
use family_records_core::domain::FamilyMember;
use family_records_core::navigation::{NavEvent, View};
use family_records_core::ports::PortError;
use family_records_core::session::SessionContext;
use tracing::info;
use uuid::Uuid;

pub const MEMBER_NOT_FOUND: &str = "Member not found";
pub const ADD_MEMBER_FORBIDDEN: &str = "Only administrators can add family members";
pub const DELETE_MEMBER_FORBIDDEN: &str = "Only administrators can delete family members";
pub const FULL_NAME_REQUIRED: &str = "Full name is required";

impl RecordsApp {
    /// Changes the view selector.
    pub fn select_view(&self, ctx: &mut SessionContext, view: View) -> Result<(), AppError> {
        if ctx.navigation.apply(NavEvent::Selected(view)) {
            Ok(())
        } else {
            Err(AppError::Validation(format!(
                "Cannot switch to the {} view",
                view.as_str()
            )))
        }
    }

    /// Makes `member_id` the active member and requests the detail view for the next render.
    pub async fn open_member(
        &self,
        ctx: &mut SessionContext,
        member_id: Uuid,
    ) -> Result<(), AppError> {
        match self.db.get_member(member_id).await {
            Ok(_) => {}
            Err(PortError::NotFound(_)) => {
                return Err(AppError::NotFound(MEMBER_NOT_FOUND.to_string()))
            }
            Err(e) => return Err(e.into()),
        }
        ctx.navigation.open_member(member_id);
        Ok(())
    }

    pub async fn add_member(
        &self,
        ctx: &SessionContext,
        full_name: &str,
        dob: Option<NaiveDate>,
    ) -> Result<FamilyMember, AppError> {
        require_elevated(ctx, ADD_MEMBER_FORBIDDEN)?;

        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(AppError::Validation(FULL_NAME_REQUIRED.to_string()));
        }

        let member = self
            .db
            .create_member(full_name, dob, ctx.identity.user_id)
            .await?;
        info!(member_id = %member.id, created_by = %ctx.identity.user_id, "Added family member");
        Ok(member)
    }

    /// Removes a member together with all of their document records.
    pub async fn delete_member(
        &self,
        ctx: &mut SessionContext,
        member_id: Uuid,
    ) -> Result<(), AppError> {
        require_elevated(ctx, DELETE_MEMBER_FORBIDDEN)?;

        match self.db.delete_member(member_id).await {
            Ok(()) => {}
            Err(PortError::NotFound(_)) => {
                return Err(AppError::NotFound(MEMBER_NOT_FOUND.to_string()))
            }
            Err(e) => return Err(e.into()),
        }
        if ctx.navigation.active_member == Some(member_id) {
            ctx.navigation.clear_active_member();
        }
        info!(%member_id, deleted_by = %ctx.identity.user_id, "Deleted family member");
        Ok(())
    }
}
