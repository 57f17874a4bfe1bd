//! HTTP API Handlers and Routes
//!
//! This module provides the REST API layer for Warden, built on the Axum web framework.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//!
//! # API Endpoints
//!
//! ## Authentication (`/api/v1/auth`)
//! - `POST /api/v1/auth/register` - Register new user, returns a token pair
//! - `POST /api/v1/auth/login` - Login and receive a token pair
//! - `POST /api/v1/auth/refresh` - Rotate a refresh token
//! - `POST /api/v1/auth/logout` - Revoke a refresh token
//!
//! ## Users (`/api/v1/users`)
//! - `GET /api/v1/users/me` - Profile of the caller
//! - `GET /api/v1/users/{id}` - Any user's profile (admin only)
//!
//! ## Probes
//! - `GET /health` - Liveness
//! - `GET /ready` - Readiness (pings the database)
//!
//! # Authentication
//!
//! User endpoints require a valid access token in the `Authorization` header:
//! ```text
//! Authorization: Bearer <token>
//! ```
//!
//! # OpenAPI Documentation
//!
//! The generated document is served at `/api-docs/openapi.json`.
//! When the `swagger-ui` feature is enabled, interactive API documentation
//! is available at `/swagger-ui/`.

use crate::api::handlers::{auth, health, users};
use crate::types::{
    AuthResponse, LoginRequest, MessageResponse, RefreshRequest, RegisterRequest, UserInfo,
    UserProfile,
};
use utoipa::OpenApi;

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register,
        auth::login,
        auth::refresh_token,
        auth::logout,
        users::me,
        users::get_user,
        health::health,
        health::ready
    ),
    components(schemas(
        RegisterRequest,
        LoginRequest,
        RefreshRequest,
        AuthResponse,
        UserInfo,
        UserProfile,
        MessageResponse,
        health::HealthResponse
    )),
    tags(
        (name = "auth", description = "Registration, login and token rotation"),
        (name = "users", description = "User profiles"),
        (name = "health", description = "Service probes")
    )
)]
struct ApiDoc;

/// OpenAPI description of every route.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
