//! Bearer authentication for protected routes.
//!
//! [`require_auth`] verifies the access token and stores an [`AuthContext`]
//! in the request extensions; handlers read it back with [`AuthUser`].
//! [`require_admin`] is layered inside `require_auth` and only looks at the
//! context it left behind.

use crate::auth::jwt::TokenSigner;
use crate::types::{AppError, Result, UserId};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Identity taken from a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: UserId,
    pub email: String,
    pub is_admin: bool,
}

/// Pulls the token out of an `Authorization: Bearer <token>` value. The
/// scheme name is matched case-insensitively.
pub fn bearer_token(authorization: &str) -> Option<&str> {
    let (scheme, token) = authorization.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Verifies the `Authorization` header value, if any.
pub fn authenticate(signer: &TokenSigner, authorization: Option<&str>) -> Result<AuthContext> {
    let token = authorization
        .and_then(bearer_token)
        .ok_or(AppError::Unauthenticated)?;

    let claims = signer.verify_access_token(token).map_err(|e| {
        tracing::debug!(error = %e, "access token rejected");
        AppError::Unauthenticated
    })?;

    Ok(AuthContext {
        user_id: claims.sub,
        email: claims.email,
        is_admin: claims.is_admin,
    })
}

/// Admin check on an already-authenticated context.
pub fn authorize_admin(context: Option<&AuthContext>) -> Result<&AuthContext> {
    let context = context.ok_or(AppError::Unauthenticated)?;
    if !context.is_admin {
        return Err(AppError::Forbidden);
    }
    Ok(context)
}

pub async fn require_auth(
    State(signer): State<Arc<TokenSigner>>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let context = authenticate(&signer, authorization)?;
    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}

pub async fn require_admin(req: Request, next: Next) -> Result<Response> {
    let context = authorize_admin(req.extensions().get::<AuthContext>())?;
    tracing::debug!(user_id = context.user_id, "admin access granted");

    Ok(next.run(req).await)
}

// Extractor for the authenticated identity
pub struct AuthUser(pub AuthContext);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthUser)
            .ok_or(AppError::Unauthenticated)
    }
}
