//! services/api/src/app/mod.rs
//!
//! The application layer: sign-in, the three signed-in views and the write actions
//! behind them. Every operation that belongs to a session takes the explicit
//! `SessionContext`; handlers load it before the call and save it afterwards.

pub mod auth;
pub mod documents;
pub mod members;
pub mod render;


use crate::credentials::Credentials;
use crate::error::AppError;
use family_records_core::domain::Role;
use family_records_core::ports::{DatabaseService, StorageService};
use family_records_core::session::SessionContext;
use std::sync::Arc;
use std::time::Duration;

pub use documents::{UploadInput, UploadedFile};
pub use render::{DetailQuery, RenderedView};

/// Behavior that is configured once at startup.
#[derive(Clone, Debug)]
pub struct AppSettings {
    /// Role given to self-registered accounts.
    pub registration_role: Role,
    /// Lifetime of generated document links.
    pub signed_url_ttl: Duration,
    pub session_ttl: chrono::Duration,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            registration_role: Role::Admin,
            signed_url_ttl: Duration::from_secs(3600),
            session_ttl: chrono::Duration::days(30),
        }
    }
}

#[derive(Clone)]
pub struct RecordsApp {
    db: Arc<dyn DatabaseService>,
    storage: Arc<dyn StorageService>,
    credentials: Credentials,
    settings: AppSettings,
}

impl RecordsApp {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        storage: Arc<dyn StorageService>,
        credentials: Credentials,
        settings: AppSettings,
    ) -> Self {
        Self {
            db,
            storage,
            credentials,
            settings,
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }
}

/// Fails with `AppError::Forbidden` unless the session holds the elevated role.
fn require_elevated(ctx: &SessionContext, message: &str) -> Result<(), AppError> {
    if ctx.is_elevated() {
        Ok(())
    } else {
        Err(AppError::Forbidden(message.to_string()))
    }
}
