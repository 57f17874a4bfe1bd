//! Credential store abstraction
//!
//! This module provides the [`CredentialStore`] trait that abstracts over the
//! backends holding users and refresh-token records (in-memory, file-based
//! SQLite, remote Turso).
//!
//! Writes that must land together go through a [`CredentialTx`] obtained from
//! [`CredentialStore::begin`]: either every write in the unit commits or none
//! of them become visible.
//!
//! # Example
//!
//! ```rust,ignore
//! use warden::db::DatabaseProvider;
//!
//! // Use in-memory store (default for development/testing)
//! let store = DatabaseProvider::Memory.create_store().await?;
//!
//! // Use file-based SQLite
//! let store = DatabaseProvider::SQLite { path: "data/warden.db".into() }
//!     .create_store()
//!     .await?;
//! ```

use crate::types::UserId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Store failures, returned as values so callers have to handle them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("email already registered")]
    DuplicateEmail,

    #[error("storage failure: {0}")]
    Storage(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// User record from the store
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    /// PHC hash string, never the raw password
    pub password_hash: String,
    pub full_name: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a user.
#[derive(Debug, Clone, Copy)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub full_name: &'a str,
    pub is_admin: bool,
}

/// A persisted refresh token. Only the SHA-256 digest of the token is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshRecord {
    pub token_hash: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// One atomic unit of work against the store.
///
/// Nothing written through a unit is visible to others until [`commit`];
/// dropping the unit, or calling [`rollback`], discards it.
///
/// [`commit`]: CredentialTx::commit
/// [`rollback`]: CredentialTx::rollback
#[async_trait]
pub trait CredentialTx: Send {
    async fn create_user(&mut self, user: NewUser<'_>) -> StoreResult<User>;

    async fn find_user_by_id(&mut self, id: UserId) -> StoreResult<User>;

    async fn create_refresh_record(
        &mut self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshRecord>;

    /// Deletes a live refresh record and returns it.
    ///
    /// `NotFound` when no record exists or it has expired. Two units racing
    /// on the same token cannot both succeed.
    async fn take_refresh_record(&mut self, token: &str) -> StoreResult<RefreshRecord>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Persistence for users and refresh records.
///
/// Implementations can use different backends (SQLite, Turso, memory).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Opens an atomic unit of work.
    async fn begin(&self) -> StoreResult<Box<dyn CredentialTx>>;

    // ============== User Operations ==============

    async fn find_user_by_email(&self, email: &str) -> StoreResult<User>;

    async fn find_user_by_id(&self, id: UserId) -> StoreResult<User>;

    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> StoreResult<()>;

    // ============== Refresh Record Operations ==============

    /// Looks up a refresh record. Expired records are `NotFound` even if the
    /// row has not been purged yet.
    async fn find_refresh_record(&self, token: &str) -> StoreResult<RefreshRecord>;

    /// Idempotent: deleting an absent token is not an error.
    async fn delete_refresh_record(&self, token: &str) -> StoreResult<()>;

    /// Physically removes expired refresh records, returning how many went.
    async fn purge_expired_refresh_records(&self) -> StoreResult<u64>;

    /// Cheap liveness probe for readiness checks.
    async fn ping(&self) -> StoreResult<()>;

    // ============== Single-write conveniences ==============

    async fn create_user(&self, user: NewUser<'_>) -> StoreResult<User> {
        let mut tx = self.begin().await?;
        let outcome = tx.create_user(user).await;
        finish(tx, outcome).await
    }

    async fn create_refresh_record(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshRecord> {
        let mut tx = self.begin().await?;
        let outcome = tx.create_refresh_record(user_id, token, expires_at).await;
        finish(tx, outcome).await
    }
}

/// Database provider configuration
#[derive(Debug, Clone, Default)]
pub enum DatabaseProvider {
    /// In-memory store (ephemeral, lost on restart)
    #[default]
    Memory,
    /// File-based SQLite database
    SQLite {
        /// Path to the SQLite database file
        path: String,
    },
    /// Remote Turso database (requires network access)
    #[cfg(feature = "turso")]
    Turso {
        /// The Turso database URL (e.g., `libsql://your-db.turso.io`)
        url: String,
        /// Authentication token for the Turso database
        auth_token: String,
    },
}

impl DatabaseProvider {
    /// Create a credential store from this provider configuration
    pub async fn create_store(&self) -> StoreResult<Arc<dyn CredentialStore>> {
        match self {
            DatabaseProvider::Memory => Ok(Arc::new(super::memory::MemoryStore::new())),
            DatabaseProvider::SQLite { path } => {
                let client = super::turso::TursoClient::new_local(path).await?;
                Ok(Arc::new(client))
            }
            #[cfg(feature = "turso")]
            DatabaseProvider::Turso { url, auth_token } => {
                let client =
                    super::turso::TursoClient::new_remote(url.clone(), auth_token.clone()).await?;
                Ok(Arc::new(client))
            }
        }
    }

    /// Short human-readable name for startup logs
    pub fn describe(&self) -> String {
        match self {
            DatabaseProvider::Memory => "memory".to_string(),
            DatabaseProvider::SQLite { path } => format!("sqlite:{}", path),
            #[cfg(feature = "turso")]
            DatabaseProvider::Turso { url, .. } => format!("turso:{}", url),
        }
    }
}

/// Runs `tx` to completion: commits on success, rolls back on failure.
///
/// A rollback failure is logged and the original error is returned.
pub async fn finish<T: Send>(tx: Box<dyn CredentialTx>, outcome: StoreResult<T>) -> StoreResult<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                tracing::warn!(error = %rb, "rollback failed");
            }
            Err(e)
        }
    }
}
