//! Register, login, refresh and logout.
//!
//! [`SessionService`] ties the password hasher, the token signer and the
//! credential store together. Every operation that writes more than one row
//! does so inside a single store unit of work.
//!
//! Refresh tokens move through four states: active (stored), rotated
//! (consumed by a refresh and replaced), revoked (deleted by logout) and
//! expired. Only an active token can be refreshed; the other three are all
//! rejected with the same [`AppError::InvalidRefreshToken`].

use crate::auth::jwt::{IssuedToken, TokenError, TokenSigner};
use crate::auth::password::{HashedPassword, PasswordError, PasswordHasher};
use crate::db::{CredentialStore, CredentialTx, NewUser, StoreError, User};
use crate::types::{
    normalize_email, AppError, AuthResponse, LoginRequest, RegisterRequest, Result, UserId,
    UserInfo, UserProfile,
};
use std::sync::Arc;
use tokio::sync::{OnceCell, Semaphore};
use tracing::{debug, info, warn};

/// Verified against when a login names an unknown account, so both paths
/// pay for one Argon2 run.
const DUMMY_PASSWORD: &str = "warden-timing-equalisation-password";

pub struct SessionService {
    store: Arc<dyn CredentialStore>,
    signer: Arc<TokenSigner>,
    hasher: PasswordHasher,
    hash_permits: Arc<Semaphore>,
    dummy_hash: OnceCell<String>,
}

impl SessionService {
    /// `hash_concurrency` bounds how many Argon2 jobs run at once on the
    /// blocking pool.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        signer: Arc<TokenSigner>,
        hasher: PasswordHasher,
        hash_concurrency: usize,
    ) -> Self {
        Self {
            store,
            signer,
            hasher,
            hash_permits: Arc::new(Semaphore::new(hash_concurrency.max(1))),
            dummy_hash: OnceCell::new(),
        }
    }

    pub fn signer(&self) -> &Arc<TokenSigner> {
        &self.signer
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    // ============== Operations ==============

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse> {
        let email = normalize_email(&request.email);
        self.hasher
            .check_strength(&request.password)
            .map_err(password_error)?;

        let password_hash = self
            .hash_password(&request.password)
            .await
            .map_err(password_error)?;

        // User row and first refresh record land together or not at all.
        let mut tx = self.store.begin().await.map_err(store_error)?;
        let outcome = self
            .create_account(tx.as_mut(), &email, &password_hash, request.full_name.trim())
            .await;
        let (user, access, refresh) = complete(tx, outcome).await?;

        info!(user_id = user.id, "user registered");
        Ok(self.auth_response(&user, access, refresh))
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse> {
        let email = normalize_email(&request.email);

        let user = match self.store.find_user_by_email(&email).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                self.burn_verification(&request.password).await;
                debug!("login for unknown account");
                return Err(AppError::InvalidCredentials);
            }
            Err(e) => return Err(store_error(e)),
        };

        match self
            .verify_password(&request.password, &user.password_hash)
            .await
        {
            Ok(()) => {}
            Err(PasswordError::Mismatch) => {
                debug!(user_id = user.id, "login with wrong password");
                return Err(AppError::InvalidCredentials);
            }
            Err(PasswordError::Verification(reason)) => {
                warn!(user_id = user.id, %reason, "stored password hash is unusable");
                return Err(AppError::InvalidCredentials);
            }
            Err(e) => return Err(password_error(e)),
        }

        if self.hasher.needs_rehash(&user.password_hash) {
            self.upgrade_hash(user.id, &request.password).await;
        }

        let (access, refresh) = self.issue_pair(&user)?;
        self.store
            .create_refresh_record(user.id, &refresh.token, refresh.expires_at)
            .await
            .map_err(store_error)?;

        info!(user_id = user.id, "user logged in");
        Ok(self.auth_response(&user, access, refresh))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse> {
        let user_id = self
            .signer
            .verify_refresh_token(refresh_token)
            .map_err(|e| {
                debug!(error = %e, "refresh token rejected");
                AppError::InvalidRefreshToken
            })?;

        let mut tx = self.store.begin().await.map_err(store_error)?;
        let outcome = self.rotate(tx.as_mut(), user_id, refresh_token).await;
        let (user, access, refresh) = complete(tx, outcome).await?;

        info!(user_id = user.id, "refresh token rotated");
        Ok(self.auth_response(&user, access, refresh))
    }

    /// Always succeeds from the caller's point of view, whether or not the
    /// token was live.
    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        if let Err(e) = self.store.delete_refresh_record(refresh_token).await {
            warn!(error = %e, "failed to delete refresh token on logout");
        }
        Ok(())
    }

    pub async fn current_user(&self, user_id: UserId) -> Result<UserProfile> {
        self.user_by_id(user_id).await
    }

    pub async fn user_by_id(&self, user_id: UserId) -> Result<UserProfile> {
        match self.store.find_user_by_id(user_id).await {
            Ok(user) => Ok(UserProfile {
                id: user.id,
                email: user.email,
                full_name: user.full_name,
                is_admin: user.is_admin,
                created_at: user.created_at,
                updated_at: user.updated_at,
            }),
            Err(StoreError::NotFound) => Err(AppError::NotFound("user".to_string())),
            Err(e) => Err(store_error(e)),
        }
    }

    // ============== Units of work ==============

    async fn create_account(
        &self,
        tx: &mut dyn CredentialTx,
        email: &str,
        password_hash: &HashedPassword,
        full_name: &str,
    ) -> Result<(User, IssuedToken, IssuedToken)> {
        let user = tx
            .create_user(NewUser {
                email,
                password_hash: password_hash.as_str(),
                full_name,
                is_admin: false,
            })
            .await
            .map_err(store_error)?;

        let (access, refresh) = self.issue_pair(&user)?;
        tx.create_refresh_record(user.id, &refresh.token, refresh.expires_at)
            .await
            .map_err(store_error)?;

        Ok((user, access, refresh))
    }

    /// Consumes `refresh_token` and stores its replacement.
    async fn rotate(
        &self,
        tx: &mut dyn CredentialTx,
        user_id: UserId,
        refresh_token: &str,
    ) -> Result<(User, IssuedToken, IssuedToken)> {
        let record = match tx.take_refresh_record(refresh_token).await {
            Ok(record) => record,
            Err(StoreError::NotFound) => {
                debug!(user_id, "refresh token not active");
                return Err(AppError::InvalidRefreshToken);
            }
            Err(e) => return Err(store_error(e)),
        };

        if record.user_id != user_id {
            warn!(
                token_user = user_id,
                record_user = record.user_id,
                "refresh token subject does not match its record"
            );
            return Err(AppError::InvalidRefreshToken);
        }

        let user = match tx.find_user_by_id(user_id).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Err(AppError::InvalidRefreshToken),
            Err(e) => return Err(store_error(e)),
        };

        let (access, refresh) = self.issue_pair(&user)?;
        tx.create_refresh_record(user.id, &refresh.token, refresh.expires_at)
            .await
            .map_err(store_error)?;

        Ok((user, access, refresh))
    }

    // ============== Helpers ==============

    fn issue_pair(&self, user: &User) -> Result<(IssuedToken, IssuedToken)> {
        let access = self
            .signer
            .issue_access_token(user.id, &user.email, user.is_admin)
            .map_err(token_error)?;
        let refresh = self
            .signer
            .issue_refresh_token(user.id)
            .map_err(token_error)?;
        Ok((access, refresh))
    }

    fn auth_response(&self, user: &User, access: IssuedToken, refresh: IssuedToken) -> AuthResponse {
        AuthResponse {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "Bearer".to_string(),
            expires_at: access.expires_at,
            expires_in: self.signer.access_ttl().num_seconds(),
            user: UserInfo {
                id: user.id,
                email: user.email.clone(),
                full_name: user.full_name.clone(),
                is_admin: user.is_admin,
            },
        }
    }

    // The permit moves into the blocking job, so a cancelled caller cannot
    // free its slot while Argon2 is still running.
    async fn hash_password(&self, password: &str) -> std::result::Result<HashedPassword, PasswordError> {
        let permit = self
            .hash_permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| PasswordError::Hashing(e.to_string()))?;

        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            hasher.hash(&password)
        })
            .await
            .map_err(|e| PasswordError::Hashing(format!("hash task failed: {}", e)))?
    }

    async fn verify_password(
        &self,
        password: &str,
        hash: &str,
    ) -> std::result::Result<(), PasswordError> {
        let permit = self
            .hash_permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| PasswordError::Verification(e.to_string()))?;

        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            hasher.verify(&password, &hash)
        })
            .await
            .map_err(|e| PasswordError::Verification(format!("verify task failed: {}", e)))?
    }

    async fn burn_verification(&self, password: &str) {
        let dummy = self
            .dummy_hash
            .get_or_try_init(|| async {
                // Padded so it always clears the configured minimum length.
                let seed = format!("{}{}", DUMMY_PASSWORD, "#".repeat(self.hasher.min_length()));
                self.hash_password(&seed)
                    .await
                    .map(HashedPassword::into_string)
            })
            .await;

        match dummy {
            Ok(hash) => {
                let _ = self.verify_password(password, hash).await;
            }
            Err(e) => warn!(error = %e, "could not prepare dummy hash"),
        }
    }

    /// Re-hashes with the current cost after a successful login. Failure is
    /// logged and otherwise ignored; the old hash still verifies.
    async fn upgrade_hash(&self, user_id: UserId, password: &str) {
        let upgraded = match self.hash_password(password).await {
            Ok(hash) => hash,
            Err(e) => {
                warn!(user_id, error = %e, "password rehash failed");
                return;
            }
        };

        match self
            .store
            .update_password_hash(user_id, upgraded.as_str())
            .await
        {
            Ok(()) => info!(user_id, "password hash upgraded"),
            Err(e) => warn!(user_id, error = %e, "failed to store upgraded hash"),
        }
    }
}

/// Commits on success, rolls back on failure.
async fn complete<T: Send>(tx: Box<dyn CredentialTx>, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await.map_err(store_error)?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                warn!(error = %rb, "rollback failed");
            }
            Err(e)
        }
    }
}

fn store_error(e: StoreError) -> AppError {
    match e {
        StoreError::DuplicateEmail => AppError::EmailTaken,
        StoreError::NotFound => AppError::NotFound("record".to_string()),
        StoreError::Storage(msg) => AppError::Storage(msg),
    }
}

fn token_error(e: TokenError) -> AppError {
    match e {
        TokenError::Signing(msg) => AppError::TokenSigning(msg),
        TokenError::Invalid(msg) => AppError::Internal(msg),
    }
}

fn password_error(e: PasswordError) -> AppError {
    match e {
        PasswordError::WeakPassword { min_length } => AppError::WeakPassword { min_length },
        PasswordError::Mismatch => AppError::InvalidCredentials,
        other => AppError::Internal(other.to_string()),
    }
}
