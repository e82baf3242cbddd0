//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Every operation runs in its own transaction. Returning early through `?` drops the
//! transaction, which rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use family_records_core::domain::{
    Document, FamilyMember, Identity, NewDocument, Role, User, UserCredentials,
};
use family_records_core::navigation::View;
use family_records_core::ports::{DatabaseService, PortError, PortResult, StoredSession};
use family_records_core::session::NavigationState;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{debug, error};
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn begin(&self) -> PortResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            PortError::Unexpected(e.to_string())
        })
    }
}

async fn commit(tx: Transaction<'static, Postgres>) -> PortResult<()> {
    tx.commit().await.map_err(|e| {
        error!("Failed to commit transaction: {}", e);
        PortError::Unexpected(e.to_string())
    })
}

/// Maps constraint violations to port errors; everything else is unexpected.
fn map_write_error(e: sqlx::Error, what: &str) -> PortError {
    if let sqlx::Error::Database(db_err) = &e {
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => return PortError::Conflict(format!("{} already exists", what)),
            Some(FOREIGN_KEY_VIOLATION) => {
                return PortError::NotFound(format!("{} refers to a missing row", what))
            }
            _ => {}
        }
    }
    PortError::Unexpected(e.to_string())
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn parse_role(raw: &str) -> PortResult<Role> {
    raw.parse::<Role>()
        .map_err(|e| PortError::Unexpected(e.to_string()))
}

fn parse_view(raw: &str) -> PortResult<View> {
    raw.parse::<View>()
        .map_err(|e| PortError::Unexpected(e.to_string()))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        Ok(User {
            id: self.id,
            email: self.email,
            role: parse_role(&self.role)?,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    password_hash: String,
    role: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> PortResult<UserCredentials> {
        Ok(UserCredentials {
            id: self.id,
            email: self.email,
            password_hash: self.password_hash,
            role: parse_role(&self.role)?,
        })
    }
}

#[derive(FromRow)]
struct MemberRecord {
    id: Uuid,
    full_name: String,
    dob: Option<NaiveDate>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}
impl MemberRecord {
    fn to_domain(self) -> FamilyMember {
        FamilyMember {
            id: self.id,
            full_name: self.full_name,
            dob: self.dob,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct DocumentRecord {
    id: Uuid,
    member_id: Uuid,
    uploaded_by: Uuid,
    doc_date: NaiveDate,
    condition: String,
    description: Option<String>,
    storage_key: String,
    file_name: String,
    mime_type: String,
    created_at: DateTime<Utc>,
}
impl DocumentRecord {
    fn to_domain(self) -> Document {
        Document {
            id: self.id,
            member_id: self.member_id,
            uploaded_by: self.uploaded_by,
            doc_date: self.doc_date,
            condition: self.condition,
            description: self.description,
            storage_key: self.storage_key,
            file_name: self.file_name,
            mime_type: self.mime_type,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    user_id: Uuid,
    email: String,
    role: String,
    current_view: String,
    active_member_id: Option<Uuid>,
    pending_view: Option<String>,
}
impl SessionRecord {
    fn to_domain(self) -> PortResult<StoredSession> {
        Ok(StoredSession {
            identity: Identity {
                user_id: self.user_id,
                email: self.email,
                role: parse_role(&self.role)?,
            },
            navigation: NavigationState {
                current_view: parse_view(&self.current_view)?,
                active_member: self.active_member_id,
                pending_view: self.pending_view.as_deref().map(parse_view).transpose()?,
            },
        })
    }
}

const DOCUMENT_COLUMNS: &str = "id, member_id, uploaded_by, doc_date, condition, description, \
     storage_key, file_name, mime_type, created_at";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(&self, email: &str, password_hash: &str, role: Role) -> PortResult<User> {
        let mut tx = self.begin().await?;
        // The UNIQUE constraint on email decides concurrent registrations.
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (id, email, password_hash, role) VALUES ($1, $2, $3, $4) \
             RETURNING id, email, role, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, &format!("User with email {}", email)))?;
        commit(tx).await?;
        record.to_domain()
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let mut tx = self.begin().await?;
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, password_hash, role FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?;
        commit(tx).await?;
        record
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))?
            .to_domain()
    }

    async fn create_member(
        &self,
        full_name: &str,
        dob: Option<NaiveDate>,
        created_by: Uuid,
    ) -> PortResult<FamilyMember> {
        let mut tx = self.begin().await?;
        let record = sqlx::query_as::<_, MemberRecord>(
            "INSERT INTO family_members (id, full_name, dob, created_by) VALUES ($1, $2, $3, $4) \
             RETURNING id, full_name, dob, created_by, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(full_name)
        .bind(dob)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "Family member"))?;
        commit(tx).await?;
        Ok(record.to_domain())
    }

    async fn list_members(&self) -> PortResult<Vec<FamilyMember>> {
        let mut tx = self.begin().await?;
        let records = sqlx::query_as::<_, MemberRecord>(
            "SELECT id, full_name, dob, created_by, created_at FROM family_members \
             ORDER BY created_at DESC",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(unexpected)?;
        commit(tx).await?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_member(&self, member_id: Uuid) -> PortResult<FamilyMember> {
        let mut tx = self.begin().await?;
        let record = sqlx::query_as::<_, MemberRecord>(
            "SELECT id, full_name, dob, created_by, created_at FROM family_members WHERE id = $1",
        )
        .bind(member_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?;
        commit(tx).await?;
        record
            .map(|r| r.to_domain())
            .ok_or_else(|| PortError::NotFound(format!("Member {} not found", member_id)))
    }

    async fn delete_member(&self, member_id: Uuid) -> PortResult<()> {
        let mut tx = self.begin().await?;
        // documents go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM family_members WHERE id = $1")
            .bind(member_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Member {} not found", member_id)));
        }
        commit(tx).await
    }

    async fn create_document(&self, document: NewDocument) -> PortResult<Document> {
        let mut tx = self.begin().await?;
        let sql = format!(
            "INSERT INTO documents (id, member_id, uploaded_by, doc_date, condition, description, \
             storage_key, file_name, mime_type) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {}",
            DOCUMENT_COLUMNS
        );
        let record = sqlx::query_as::<_, DocumentRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(document.member_id)
            .bind(document.uploaded_by)
            .bind(document.doc_date)
            .bind(&document.condition)
            .bind(&document.description)
            .bind(&document.storage_key)
            .bind(&document.file_name)
            .bind(&document.mime_type)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, &format!("Document {}", document.storage_key)))?;
        commit(tx).await?;
        Ok(record.to_domain())
    }

    async fn list_documents_for_member(&self, member_id: Uuid) -> PortResult<Vec<Document>> {
        let mut tx = self.begin().await?;
        let sql = format!(
            "SELECT {} FROM documents WHERE member_id = $1 ORDER BY created_at DESC",
            DOCUMENT_COLUMNS
        );
        let records = sqlx::query_as::<_, DocumentRecord>(&sql)
            .bind(member_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(unexpected)?;
        commit(tx).await?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let navigation = NavigationState::signed_in();
        let mut tx = self.begin().await?;
        let purged = sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= now()")
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?
            .rows_affected();
        if purged > 0 {
            debug!(purged, "Removed expired sessions");
        }
        sqlx::query(
            "INSERT INTO auth_sessions (id, user_id, current_view, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(navigation.current_view.as_str())
        .bind(expires_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "Session"))?;
        commit(tx).await
    }

    async fn load_auth_session(&self, session_id: &str) -> PortResult<StoredSession> {
        let mut tx = self.begin().await?;
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT u.id AS user_id, u.email, u.role, s.current_view, s.active_member_id, \
             s.pending_view \
             FROM auth_sessions s JOIN users u ON u.id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?;
        commit(tx).await?;
        record
            .ok_or_else(|| PortError::NotFound("Session not found or expired".to_string()))?
            .to_domain()
    }

    async fn save_navigation(&self, session_id: &str, navigation: &NavigationState) -> PortResult<()> {
        let mut tx = self.begin().await?;
        let result = sqlx::query(
            "UPDATE auth_sessions SET current_view = $2, active_member_id = $3, pending_view = $4 \
             WHERE id = $1",
        )
        .bind(session_id)
        .bind(navigation.current_view.as_str())
        .bind(navigation.active_member)
        .bind(navigation.pending_view.map(|v| v.as_str()))
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound("Session not found".to_string()));
        }
        commit(tx).await
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        let mut tx = self.begin().await?;
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        commit(tx).await
    }
}
