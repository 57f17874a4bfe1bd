//! Authentication: passwords, tokens, sessions and route guards
//!
//! This module provides the authentication core of Warden and the Axum
//! glue that protects routes with it.
//!
//! # Module Structure
//!
//! - [`auth::password`](crate::auth::password) - Argon2id hashing and verification
//! - [`auth::jwt`](crate::auth::jwt) - access/refresh token issuing and verification
//! - [`auth::session`](crate::auth::session) - register, login, refresh and logout
//! - [`auth::middleware`](crate::auth::middleware) - Axum layers and extractors for authentication
//!
//! # Security Features
//!
//! - **Password Hashing**: Argon2id (memory-hard), PHC strings with per-hash salt
//! - **JWT Tokens**: HS256 only; `alg: none` and other algorithms are rejected
//! - **Refresh Rotation**: every refresh token is single-use and stored hashed
//!
//! # Usage
//!
//! ## Sessions
//!
//! ```ignore
//! use warden::auth::{jwt::{TokenConfig, TokenSigner}, password::{HashConfig, PasswordHasher}};
//! use warden::auth::session::SessionService;
//!
//! let signer = Arc::new(TokenSigner::new(TokenConfig::new(secret)));
//! let hasher = PasswordHasher::new(HashConfig::default())?;
//! let sessions = SessionService::new(store, signer, hasher, 4);
//!
//! let tokens = sessions.login(request).await?;
//! let rotated = sessions.refresh(&tokens.refresh_token).await?;
//! ```
//!
//! ## Middleware
//!
//! `require_auth` validates the bearer token and injects an `AuthContext`
//! into the request extensions:
//!
//! ```ignore
//! use warden::auth::middleware::require_auth;
//!
//! let app = Router::new()
//!     .route("/protected", get(handler))
//!     .layer(middleware::from_fn_with_state(signer, require_auth));
//! ```
//!
//! ## Extracting the Caller in Handlers
//!
//! ```ignore
//! async fn protected_handler(AuthUser(ctx): AuthUser) -> impl IntoResponse {
//!     format!("Hello, {}!", ctx.email)
//! }
//! ```

/// JWT issuing and validation.
pub mod jwt;
/// Authentication middleware and extractors for protected routes.
pub mod middleware;
/// Argon2id password hashing.
pub mod password;
/// Session lifecycle on top of the credential store.
pub mod session;
