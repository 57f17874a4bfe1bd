//! # Warden - credential issuing server
//!
//! Registers users, verifies passwords and issues short-lived access tokens
//! together with single-use, rotating refresh tokens.
//!
//! ## Overview
//!
//! Warden can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `warden-server` binary
//! 2. **As a library** - Mount the session core and its Axum guards in your own service
//!
//! ## Quick Start (Library Usage)
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! warden-server = "0.3"
//! ```
//!
//! ### Basic Example
//!
//! ```rust,ignore
//! use warden::{AppState, DatabaseProvider, WardenConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = WardenConfig::load("warden.toml")?;
//!     let store = config.database_provider()?.create_store().await?;
//!     let state = AppState::from_config(config, store)?;
//!
//!     let app = warden::api::routes::app(state);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `local-db` | Local SQLite database (default) |
//! | `turso` | Remote Turso database |
//! | `swagger-ui` | Interactive API docs at `/swagger-ui/` |
//!
//! ## Modules
//!
//! - [`api`] - REST API handlers and routes
//! - [`auth`] - Password hashing, tokens, sessions and middleware
//! - [`db`] - Credential store abstraction (memory, SQLite, Turso)
//! - [`types`] - Request/response types and error handling
//! - [`utils`] - TOML configuration

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// Password hashing, JWT issuing, sessions and middleware.
pub mod auth;
/// Command line parsing and terminal output.
pub mod cli;
/// Credential stores (memory, Turso/SQLite).
pub mod db;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities (TOML).
pub mod utils;

// Re-export commonly used types
pub use auth::jwt::{TokenConfig, TokenSigner};
pub use auth::password::{HashConfig, PasswordHasher};
pub use auth::session::SessionService;
pub use db::{CredentialStore, DatabaseProvider, MemoryStore, TursoClient};
pub use types::{AppError, Result};
pub use utils::toml_config::{ConfigError, WardenConfig};

use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// TOML-based infrastructure configuration
    pub config: Arc<WardenConfig>,
    /// Credential store
    pub store: Arc<dyn CredentialStore>,
    /// Access/refresh token signer
    pub signer: Arc<TokenSigner>,
    /// Session lifecycle service
    pub sessions: Arc<SessionService>,
}

impl AppState {
    /// Wires the services from explicit parts.
    pub fn new(
        config: WardenConfig,
        store: Arc<dyn CredentialStore>,
        token_config: TokenConfig,
        hasher: PasswordHasher,
    ) -> Self {
        let signer = Arc::new(TokenSigner::new(token_config));
        let sessions = Arc::new(SessionService::new(
            store.clone(),
            signer.clone(),
            hasher,
            config.auth.hash_concurrency,
        ));

        Self {
            config: Arc::new(config),
            store,
            signer,
            sessions,
        }
    }

    /// Wires the services from a loaded configuration. Reads the JWT secret
    /// from the environment variable the config names.
    pub fn from_config(
        config: WardenConfig,
        store: Arc<dyn CredentialStore>,
    ) -> std::result::Result<Self, ConfigError> {
        let token_config = config.token_config()?;
        let hasher = PasswordHasher::new(config.hash_config())
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        Ok(Self::new(config, store, token_config, hasher))
    }
}
