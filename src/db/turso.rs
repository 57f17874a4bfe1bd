use super::traits::{
    CredentialStore, CredentialTx, NewUser, RefreshRecord, StoreError, StoreResult, User,
};
use crate::auth::jwt::hash_token;
use crate::types::UserId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Builder, Connection, Database, Row};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};

const USER_COLUMNS: &str = "id, email, password_hash, full_name, is_admin, created_at, updated_at";

fn db_err(e: libsql::Error) -> StoreError {
    StoreError::Storage(e.to_string())
}

fn timestamp(secs: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| StoreError::Storage(format!("timestamp out of range: {}", secs)))
}

/// The single connection all work is funnelled through, plus whether a
/// transaction was left open by a unit that never finished.
struct Session {
    conn: Connection,
    in_transaction: bool,
}

impl Session {
    /// Rolls back a transaction abandoned by a unit that was dropped
    /// mid-flight (for example a cancelled request), so its writes never
    /// leak into later work.
    async fn settle(&mut self) -> StoreResult<()> {
        if self.in_transaction {
            tracing::warn!("rolling back abandoned transaction");
            self.conn.execute("ROLLBACK", ()).await.map_err(db_err)?;
            self.in_transaction = false;
        }
        Ok(())
    }
}

/// libsql-backed credential store (local SQLite file, in-memory, or Turso).
///
/// Every operation runs on one connection guarded by an async mutex. A unit
/// of work keeps the mutex for its lifetime and wraps its statements in
/// `BEGIN IMMEDIATE` .. `COMMIT`, so concurrent units are serialized and a
/// rotation either fully happens or not at all.
pub struct TursoClient {
    _db: Database,
    session: Arc<Mutex<Session>>,
}

impl TursoClient {
    /// In-memory SQLite; contents vanish with the client.
    pub async fn new_memory() -> StoreResult<Self> {
        Self::new_local(":memory:").await
    }

    /// File-backed SQLite, creating parent directories as needed.
    pub async fn new_local(path: &str) -> StoreResult<Self> {
        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| {
                        StoreError::Storage(format!("Failed to create {}: {}", parent.display(), e))
                    })?;
                }
            }
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open database: {}", e)))?;

        Self::from_database(db).await
    }

    #[cfg(feature = "turso")]
    pub async fn new_remote(url: String, auth_token: String) -> StoreResult<Self> {
        let db = Builder::new_remote(url, auth_token)
            .build()
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to connect to Turso: {}", e)))?;

        Self::from_database(db).await
    }

    async fn from_database(db: Database) -> StoreResult<Self> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Storage(format!("Failed to get connection: {}", e)))?;

        let client = Self {
            _db: db,
            session: Arc::new(Mutex::new(Session {
                conn,
                in_transaction: false,
            })),
        };
        client.initialize_schema().await?;

        Ok(client)
    }

    async fn acquire(&self) -> StoreResult<MutexGuard<'_, Session>> {
        let mut session = self.session.lock().await;
        session.settle().await?;
        Ok(session)
    }

    async fn initialize_schema(&self) -> StoreResult<()> {
        let session = self.acquire().await?;
        let conn = &session.conn;

        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to enable foreign keys: {}", e)))?;

        // Users table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                full_name TEXT NOT NULL,
                is_admin INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| StoreError::Storage(format!("Failed to create users table: {}", e)))?;

        // Refresh tokens table, keyed by SHA-256 of the token
        conn.execute(
            "CREATE TABLE IF NOT EXISTS refresh_tokens (
                token_hash TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            )",
            (),
        )
        .await
        .map_err(|e| {
            StoreError::Storage(format!("Failed to create refresh_tokens table: {}", e))
        })?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user_id ON refresh_tokens(user_id)",
            (),
        )
        .await
        .map_err(db_err)?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_expires_at ON refresh_tokens(expires_at)",
            (),
        )
        .await
        .map_err(db_err)?;

        Ok(())
    }

    /// Flags a user as administrator. There is no API for this; operators
    /// and tests grant it directly.
    pub async fn set_admin(&self, id: UserId, is_admin: bool) -> StoreResult<()> {
        let session = self.acquire().await?;
        let changed = session
            .conn
            .execute(
                "UPDATE users SET is_admin = ?, updated_at = ? WHERE id = ?",
                (is_admin as i64, Utc::now().timestamp(), id),
            )
            .await
            .map_err(db_err)?;

        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Removes a user; their refresh records go with them.
    pub async fn delete_user(&self, id: UserId) -> StoreResult<()> {
        let session = self.acquire().await?;
        let changed = session
            .conn
            .execute("DELETE FROM users WHERE id = ?", [id])
            .await
            .map_err(db_err)?;

        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Number of refresh rows held, expired or not.
    pub async fn refresh_record_count(&self) -> StoreResult<u64> {
        let session = self.acquire().await?;
        let mut rows = session
            .conn
            .query("SELECT COUNT(*) FROM refresh_tokens", ())
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(db_err)? as u64),
            None => Ok(0),
        }
    }
}

// ============== Statements shared by the store and its units ==============

fn row_to_user(row: &Row) -> StoreResult<User> {
    Ok(User {
        id: row.get(0).map_err(db_err)?,
        email: row.get(1).map_err(db_err)?,
        password_hash: row.get(2).map_err(db_err)?,
        full_name: row.get(3).map_err(db_err)?,
        is_admin: row.get::<i64>(4).map_err(db_err)? != 0,
        created_at: timestamp(row.get(5).map_err(db_err)?)?,
        updated_at: timestamp(row.get(6).map_err(db_err)?)?,
    })
}

async fn select_user_by_id(conn: &Connection, id: UserId) -> StoreResult<User> {
    let mut rows = conn
        .query(
            &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
            [id],
        )
        .await
        .map_err(|e| StoreError::Storage(format!("Failed to query user: {}", e)))?;

    match rows.next().await.map_err(db_err)? {
        Some(row) => row_to_user(&row),
        None => Err(StoreError::NotFound),
    }
}

async fn select_live_refresh_record(
    conn: &Connection,
    token_hash: &str,
) -> StoreResult<RefreshRecord> {
    let mut rows = conn
        .query(
            "SELECT user_id, expires_at, created_at FROM refresh_tokens
             WHERE token_hash = ? AND expires_at > ?",
            (token_hash, Utc::now().timestamp()),
        )
        .await
        .map_err(|e| StoreError::Storage(format!("Failed to query refresh token: {}", e)))?;

    match rows.next().await.map_err(db_err)? {
        Some(row) => Ok(RefreshRecord {
            token_hash: token_hash.to_string(),
            user_id: row.get(0).map_err(db_err)?,
            expires_at: timestamp(row.get(1).map_err(db_err)?)?,
            created_at: timestamp(row.get(2).map_err(db_err)?)?,
        }),
        None => Err(StoreError::NotFound),
    }
}

async fn insert_user(conn: &Connection, user: NewUser<'_>) -> StoreResult<User> {
    let now = Utc::now().timestamp();

    conn.execute(
        "INSERT INTO users (email, password_hash, full_name, is_admin, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        (
            user.email,
            user.password_hash,
            user.full_name,
            user.is_admin as i64,
            now,
            now,
        ),
    )
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed") {
            StoreError::DuplicateEmail
        } else {
            StoreError::Storage(format!("Failed to create user: {}", e))
        }
    })?;

    let id = conn.last_insert_rowid();
    Ok(User {
        id,
        email: user.email.to_string(),
        password_hash: user.password_hash.to_string(),
        full_name: user.full_name.to_string(),
        is_admin: user.is_admin,
        created_at: timestamp(now)?,
        updated_at: timestamp(now)?,
    })
}

async fn insert_refresh_record(
    conn: &Connection,
    user_id: UserId,
    token: &str,
    expires_at: DateTime<Utc>,
) -> StoreResult<RefreshRecord> {
    let token_hash = hash_token(token);
    let now = Utc::now().timestamp();

    conn.execute(
        "INSERT INTO refresh_tokens (token_hash, user_id, expires_at, created_at)
         VALUES (?, ?, ?, ?)",
        (token_hash.as_str(), user_id, expires_at.timestamp(), now),
    )
    .await
    .map_err(|e| StoreError::Storage(format!("Failed to store refresh token: {}", e)))?;

    Ok(RefreshRecord {
        token_hash,
        user_id,
        expires_at: timestamp(expires_at.timestamp())?,
        created_at: timestamp(now)?,
    })
}

// ============== Units of work ==============

struct TursoTx {
    session: OwnedMutexGuard<Session>,
}

impl TursoTx {
    async fn end(mut self, statement: &str) -> StoreResult<()> {
        self.session
            .conn
            .execute(statement, ())
            .await
            .map_err(|e| StoreError::Storage(format!("{} failed: {}", statement, e)))?;
        self.session.in_transaction = false;
        Ok(())
    }
}

#[async_trait]
impl CredentialTx for TursoTx {
    async fn create_user(&mut self, user: NewUser<'_>) -> StoreResult<User> {
        insert_user(&self.session.conn, user).await
    }

    async fn find_user_by_id(&mut self, id: UserId) -> StoreResult<User> {
        select_user_by_id(&self.session.conn, id).await
    }

    async fn create_refresh_record(
        &mut self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshRecord> {
        insert_refresh_record(&self.session.conn, user_id, token, expires_at).await
    }

    async fn take_refresh_record(&mut self, token: &str) -> StoreResult<RefreshRecord> {
        let token_hash = hash_token(token);
        let record = select_live_refresh_record(&self.session.conn, &token_hash).await?;

        let deleted = self
            .session
            .conn
            .execute(
                "DELETE FROM refresh_tokens WHERE token_hash = ?",
                [token_hash.as_str()],
            )
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to delete refresh token: {}", e)))?;

        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(record)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        (*self).end("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        (*self).end("ROLLBACK").await
    }
}

#[async_trait]
impl CredentialStore for TursoClient {
    async fn begin(&self) -> StoreResult<Box<dyn CredentialTx>> {
        let mut session = self.session.clone().lock_owned().await;
        session.settle().await?;

        session
            .conn
            .execute("BEGIN IMMEDIATE", ())
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to begin transaction: {}", e)))?;
        session.in_transaction = true;

        Ok(Box::new(TursoTx { session }))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<User> {
        let session = self.acquire().await?;
        let mut rows = session
            .conn
            .query(
                &format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS),
                [email],
            )
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to query user: {}", e)))?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => row_to_user(&row),
            None => Err(StoreError::NotFound),
        }
    }

    async fn find_user_by_id(&self, id: UserId) -> StoreResult<User> {
        let session = self.acquire().await?;
        select_user_by_id(&session.conn, id).await
    }

    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> StoreResult<()> {
        let session = self.acquire().await?;
        let changed = session
            .conn
            .execute(
                "UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?",
                (password_hash, Utc::now().timestamp(), id),
            )
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to update password: {}", e)))?;

        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_refresh_record(&self, token: &str) -> StoreResult<RefreshRecord> {
        let session = self.acquire().await?;
        select_live_refresh_record(&session.conn, &hash_token(token)).await
    }

    async fn delete_refresh_record(&self, token: &str) -> StoreResult<()> {
        let session = self.acquire().await?;
        session
            .conn
            .execute(
                "DELETE FROM refresh_tokens WHERE token_hash = ?",
                [hash_token(token)],
            )
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to delete refresh token: {}", e)))?;
        Ok(())
    }

    async fn purge_expired_refresh_records(&self) -> StoreResult<u64> {
        let session = self.acquire().await?;
        session
            .conn
            .execute(
                "DELETE FROM refresh_tokens WHERE expires_at <= ?",
                [Utc::now().timestamp()],
            )
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to purge refresh tokens: {}", e)))
    }

    async fn ping(&self) -> StoreResult<()> {
        let session = self.acquire().await?;
        let mut rows = session.conn.query("SELECT 1", ()).await.map_err(db_err)?;
        rows.next().await.map_err(db_err)?;
        Ok(())
    }
}
