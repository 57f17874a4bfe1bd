//! In-memory credential store.
//!
//! Same contract as the SQL-backed store, without a database. Used for tests
//! and for `:memory:` deployments. A unit of work holds the store lock for
//! its whole lifetime and edits a private copy of the state, which replaces
//! the shared state on commit. Units are therefore serialized, exactly like
//! `BEGIN IMMEDIATE` transactions on SQLite.

use super::traits::{
    CredentialStore, CredentialTx, NewUser, RefreshRecord, StoreError, StoreResult, User,
};
use crate::auth::jwt::hash_token;
use crate::types::UserId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct State {
    last_user_id: UserId,
    users: HashMap<UserId, User>,
    emails: HashMap<String, UserId>,
    refresh_tokens: HashMap<String, RefreshRecord>,
}

impl State {
    fn create_user(&mut self, user: NewUser<'_>) -> StoreResult<User> {
        if self.emails.contains_key(user.email) {
            return Err(StoreError::DuplicateEmail);
        }

        self.last_user_id += 1;
        let now = Utc::now();
        let created = User {
            id: self.last_user_id,
            email: user.email.to_string(),
            password_hash: user.password_hash.to_string(),
            full_name: user.full_name.to_string(),
            is_admin: user.is_admin,
            created_at: now,
            updated_at: now,
        };

        self.emails.insert(created.email.clone(), created.id);
        self.users.insert(created.id, created.clone());
        Ok(created)
    }

    fn find_user_by_id(&self, id: UserId) -> StoreResult<User> {
        self.users.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    fn create_refresh_record(
        &mut self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshRecord> {
        if !self.users.contains_key(&user_id) {
            return Err(StoreError::Storage(format!(
                "refresh record references unknown user {}",
                user_id
            )));
        }

        let token_hash = hash_token(token);
        if self.refresh_tokens.contains_key(&token_hash) {
            return Err(StoreError::Storage("duplicate refresh token".to_string()));
        }

        let record = RefreshRecord {
            token_hash: token_hash.clone(),
            user_id,
            expires_at,
            created_at: Utc::now(),
        };
        self.refresh_tokens.insert(token_hash, record.clone());
        Ok(record)
    }

    fn live_record(&self, token_hash: &str) -> StoreResult<&RefreshRecord> {
        match self.refresh_tokens.get(token_hash) {
            Some(record) if !record.is_expired(Utc::now()) => Ok(record),
            _ => Err(StoreError::NotFound),
        }
    }
}

/// Credential store kept entirely in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flags a user as administrator. Operator/test helper; there is no API
    /// for granting admin rights.
    pub async fn set_admin(&self, id: UserId, is_admin: bool) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let user = state.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.is_admin = is_admin;
        user.updated_at = Utc::now();
        Ok(())
    }

    /// Removes a user and every refresh record it owns.
    pub async fn delete_user(&self, id: UserId) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let user = state.users.remove(&id).ok_or(StoreError::NotFound)?;
        state.emails.remove(&user.email);
        state.refresh_tokens.retain(|_, record| record.user_id != id);
        Ok(())
    }

    /// Number of refresh rows held, expired or not.
    pub async fn refresh_record_count(&self) -> usize {
        self.state.lock().await.refresh_tokens.len()
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    working: State,
}

#[async_trait]
impl CredentialTx for MemoryTx {
    async fn create_user(&mut self, user: NewUser<'_>) -> StoreResult<User> {
        self.working.create_user(user)
    }

    async fn find_user_by_id(&mut self, id: UserId) -> StoreResult<User> {
        self.working.find_user_by_id(id)
    }

    async fn create_refresh_record(
        &mut self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshRecord> {
        self.working
            .create_refresh_record(user_id, token, expires_at)
    }

    async fn take_refresh_record(&mut self, token: &str) -> StoreResult<RefreshRecord> {
        let token_hash = hash_token(token);
        self.working.live_record(&token_hash)?;
        self.working
            .refresh_tokens
            .remove(&token_hash)
            .ok_or(StoreError::NotFound)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn CredentialTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<User> {
        let state = self.state.lock().await;
        state
            .emails
            .get(email)
            .and_then(|id| state.users.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_user_by_id(&self, id: UserId) -> StoreResult<User> {
        self.state.lock().await.find_user_by_id(id)
    }

    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let user = state.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn find_refresh_record(&self, token: &str) -> StoreResult<RefreshRecord> {
        let state = self.state.lock().await;
        state.live_record(&hash_token(token)).cloned()
    }

    async fn delete_refresh_record(&self, token: &str) -> StoreResult<()> {
        self.state
            .lock()
            .await
            .refresh_tokens
            .remove(&hash_token(token));
        Ok(())
    }

    async fn purge_expired_refresh_records(&self) -> StoreResult<u64> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let before = state.refresh_tokens.len();
        state
            .refresh_tokens
            .retain(|_, record| !record.is_expired(now));
        Ok((before - state.refresh_tokens.len()) as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
