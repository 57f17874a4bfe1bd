use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Numeric identity of a user, as stored by the credential store.
pub type UserId = i64;

// ============= Authentication Types =============

#[derive(Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(alias = "name")]
    pub full_name: String,
}

impl RegisterRequest {
    /// Shape checks done before the session core sees the request.
    ///
    /// Password strength is not checked here; that belongs to the hasher.
    pub fn validate(&self) -> Result<()> {
        validate_email(&self.email)?;
        if self.full_name.trim().is_empty() {
            return Err(AppError::InvalidInput("full_name is required".to_string()));
        }
        Ok(())
    }
}

// Hand-written so a stray `?payload` never puts a password in the logs.
impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("full_name", &self.full_name)
            .finish()
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<()> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(AppError::InvalidInput("password is required".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

impl RefreshRequest {
    pub fn validate(&self) -> Result<()> {
        if self.refresh_token.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "refresh_token is required".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for RefreshRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshRequest")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Tokens handed out by register, login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Expiry of the access token.
    pub expires_at: DateTime<Utc>,
    /// Seconds until the access token expires.
    pub expires_in: i64,
    pub user: UserInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Lower-cases and trims an email so lookups and inserts agree.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AppError::InvalidInput(
            "a valid email address is required".to_string(),
        )),
    }
}

// ============= Error Types =============

/// Every failure the service can report to a caller.
///
/// The three authentication failures share one public message so that
/// responses never tell an attacker which check failed.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Password must be at least {min_length} characters")]
    WeakPassword { min_length: usize },

    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Token signing error: {0}")]
    TokenSigning(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;

        match self {
            AppError::WeakPassword { .. } | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::EmailTaken => StatusCode::CONFLICT,
            AppError::InvalidCredentials
            | AppError::InvalidRefreshToken
            | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Storage(_) | AppError::TokenSigning(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The message a caller is allowed to see.
    pub fn public_message(&self) -> String {
        match self {
            AppError::InvalidCredentials
            | AppError::InvalidRefreshToken
            | AppError::Unauthenticated => "unauthorized".to_string(),
            AppError::Forbidden => "forbidden".to_string(),
            AppError::EmailTaken => "email already registered".to_string(),
            AppError::WeakPassword { .. } | AppError::InvalidInput(_) => self.to_string(),
            AppError::NotFound(what) => format!("{} not found", what),
            AppError::Storage(_) | AppError::TokenSigning(_) | AppError::Internal(_) => {
                "internal server error".to_string()
            }
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({
            "error": self.public_message()
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::InvalidCredentials)]
    #[case(AppError::InvalidRefreshToken)]
    #[case(AppError::Unauthenticated)]
    fn auth_failures_are_indistinguishable(#[case] err: AppError) {
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.public_message(), "unauthorized");
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let err = AppError::Storage("UNIQUE constraint failed: users.email".to_string());
        assert_eq!(err.public_message(), "internal server error");
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let err = AppError::TokenSigning("bad key".to_string());
        assert_eq!(err.public_message(), "internal server error");
    }

    #[test]
    fn forbidden_is_distinct() {
        let err = AppError::Forbidden;
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_ne!(err.public_message(), "unauthorized");
    }

    #[rstest]
    #[case("user@example.com", true)]
    #[case("  user@example.com ", true)]
    #[case("userexample.com", false)]
    #[case("@example.com", false)]
    #[case("user@", false)]
    #[case("", false)]
    fn email_shape(#[case] email: &str, #[case] ok: bool) {
        let req = LoginRequest {
            email: email.to_string(),
            password: "whatever".to_string(),
        };
        assert_eq!(req.validate().is_ok(), ok);
    }

    #[test]
    fn register_requires_full_name() {
        let req = RegisterRequest {
            email: "a@x.com".to_string(),
            password: "longenough1".to_string(),
            full_name: "   ".to_string(),
        };
        assert!(matches!(req.validate(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let req = LoginRequest {
            email: "a@x.com".to_string(),
            password: "hunter22-secret".to_string(),
        };
        let rendered = format!("{:?}", req);
        assert!(!rendered.contains("hunter22-secret"));

        let req = RefreshRequest {
            refresh_token: "eyJ.secret.token".to_string(),
        };
        assert!(!format!("{:?}", req).contains("eyJ.secret.token"));
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }
}
