//! Credential storage.
//!
//! This module provides the persistence layer for users and refresh-token
//! records:
//! - **Turso/SQLite**: libsql-backed store, local file or remote Turso
//! - **Memory**: process-local store for tests and `:memory:` deployments
//!
//! Both implement [`CredentialStore`]; pick one at startup with
//! [`DatabaseProvider`].
//!
//! Enable the remote backend via Cargo features:
//! ```toml
//! warden-server = { version = "*", features = ["turso"] }
//! ```

#![allow(missing_docs)]

pub mod memory;
pub mod traits;
pub mod turso;

// Re-exports
pub use memory::MemoryStore;
pub use traits::{
    finish, CredentialStore, CredentialTx, DatabaseProvider, NewUser, RefreshRecord, StoreError,
    StoreResult, User,
};
pub use turso::TursoClient;
