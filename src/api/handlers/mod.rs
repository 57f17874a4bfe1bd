//! API request handlers.
//!
//! This module contains all HTTP request handlers organized by functionality.

/// Authentication handlers (register, login, refresh, logout).
pub mod auth;
/// Liveness and readiness probes.
pub mod health;
/// User profile lookups.
pub mod users;
