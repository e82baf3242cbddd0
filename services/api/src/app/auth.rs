//! services/api/src/app/auth.rs
//!
//! Registration, sign-in and the lifecycle of a signed-in session.

use super::RecordsApp;
use crate::error::AppError;
use chrono::Utc;
use family_records_core::domain::{Identity, User};
use family_records_core::navigation::NavEvent;
use family_records_core::ports::PortError;
use family_records_core::session::SessionContext;
use tracing::{info, warn};
use uuid::Uuid;

pub const INVALID_CREDENTIALS: &str = "Invalid credentials";
pub const EMAIL_TAKEN: &str = "Email already registered";
pub const SIGN_IN_REQUIRED: &str = "Sign in required";

impl RecordsApp {
    /// Creates an account with the configured self-registration role.
    pub async fn register(&self, email: &str, password: &str) -> Result<User, AppError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let password_hash = self.credentials.hash(password)?;
        match self
            .db
            .create_user(email, &password_hash, self.settings.registration_role)
            .await
        {
            Ok(user) => {
                info!(user_id = %user.id, role = %user.role, "Registered new account");
                Ok(user)
            }
            Err(PortError::Conflict(_)) => {
                warn!("Registration attempt for an existing email");
                Err(AppError::Authentication(EMAIL_TAKEN.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Checks the credentials and opens a new session on the member list.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionContext, AppError> {
        let user = match self.db.get_user_by_email(email.trim()).await {
            Ok(user) => user,
            Err(PortError::NotFound(_)) => {
                self.credentials.reject_unknown(password);
                warn!("Sign-in attempt for an unknown email");
                return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if !self.credentials.verify(password, &user.password_hash) {
            warn!(user_id = %user.id, "Sign-in attempt with a wrong password");
            return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
        }

        let expires_at = Utc::now()
            .checked_add_signed(self.settings.session_ttl)
            .ok_or_else(|| AppError::Internal("Session lifetime is out of range".to_string()))?;
        let session_id = Uuid::new_v4().to_string();
        self.db
            .create_auth_session(&session_id, user.id, expires_at)
            .await?;

        info!(user_id = %user.id, "Signed in");
        Ok(SessionContext::new(
            session_id,
            Identity {
                user_id: user.id,
                email: user.email,
                role: user.role,
            },
        ))
    }

    /// Restores the session behind a cookie. Missing or expired sessions need a new sign-in.
    pub async fn load_session(&self, session_id: &str) -> Result<SessionContext, AppError> {
        match self.db.load_auth_session(session_id).await {
            Ok(stored) => Ok(SessionContext {
                session_id: session_id.to_string(),
                identity: stored.identity,
                navigation: stored.navigation,
            }),
            Err(PortError::NotFound(_)) => {
                Err(AppError::Authentication(SIGN_IN_REQUIRED.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save_session(&self, ctx: &SessionContext) -> Result<(), AppError> {
        self.db
            .save_navigation(&ctx.session_id, &ctx.navigation)
            .await?;
        Ok(())
    }

    /// Ends the session. The context is left on the sign-in view.
    pub async fn sign_out(&self, ctx: &mut SessionContext) -> Result<(), AppError> {
        self.db.delete_auth_session(&ctx.session_id).await?;
        ctx.navigation.apply(NavEvent::SignedOut);
        info!(user_id = %ctx.identity.user_id, "Signed out");
        Ok(())
    }
}
