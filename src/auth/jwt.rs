//! HS256 access and refresh tokens.
//!
//! [`TokenSigner`] issues both kinds and verifies them against a single
//! pinned algorithm with no clock leeway. Refresh tokens carry a random
//! `jti`; only their SHA-256 digest ([`hash_token`]) is ever persisted.

use crate::types::UserId;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The one algorithm this service signs with and accepts.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Token failures. Callers outside the auth module only ever see these
/// collapsed into a single "unauthorized" outcome.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Bad signature, wrong algorithm, expired, not yet valid, malformed.
    /// The reason is kept for diagnostics only.
    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Immutable signing configuration, injected at construction.
#[derive(Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
        }
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(with = "subject")]
    pub sub: UserId,
    pub email: String,
    pub is_admin: bool,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

/// Claims carried by a refresh token.
///
/// Deliberately holds no email or role. `jti` only makes each token unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshClaims {
    #[serde(with = "subject")]
    pub sub: UserId,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly signed token and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// `sub` is a string on the wire but a numeric id in memory.
mod subject {
    use crate::types::UserId;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &UserId, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&id.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UserId, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|_| D::Error::custom(format!("subject is not a user id: {raw:?}")))
    }
}

/// Issues and verifies HS256 access and refresh tokens.
///
/// Holds no mutable state, so one instance is shared across all requests.
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    access_validation: Validation,
    refresh_validation: Validation,
}

impl TokenSigner {
    pub fn new(config: TokenConfig) -> Self {
        let mut access_validation = Validation::new(SIGNING_ALGORITHM);
        access_validation.algorithms = vec![SIGNING_ALGORITHM];
        access_validation.leeway = 0;
        access_validation.validate_exp = true;
        access_validation.validate_nbf = true;
        access_validation.set_required_spec_claims(&["exp", "nbf", "sub"]);

        let mut refresh_validation = Validation::new(SIGNING_ALGORITHM);
        refresh_validation.algorithms = vec![SIGNING_ALGORITHM];
        refresh_validation.leeway = 0;
        refresh_validation.validate_exp = true;
        refresh_validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            access_validation,
            refresh_validation,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue_access_token(
        &self,
        user_id: UserId,
        email: &str,
        is_admin: bool,
    ) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let exp = (now + self.access_ttl).timestamp();
        let claims = AccessClaims {
            sub: user_id,
            email: email.to_string(),
            is_admin,
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp,
        };

        let token = self.sign(&claims)?;
        Ok(IssuedToken {
            token,
            expires_at: to_datetime(exp, now + self.access_ttl),
        })
    }

    pub fn issue_refresh_token(&self, user_id: UserId) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let exp = (now + self.refresh_ttl).timestamp();
        let claims = RefreshClaims {
            sub: user_id,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp,
        };

        let token = self.sign(&claims)?;
        Ok(IssuedToken {
            token,
            expires_at: to_datetime(exp, now + self.refresh_ttl),
        })
    }

    /// Verifies signature, algorithm, expiry and not-before of an access token.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, TokenError> {
        decode::<AccessClaims>(token, &self.decoding_key, &self.access_validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }

    /// Verifies a refresh token and returns the user it was issued to.
    pub fn verify_refresh_token(&self, token: &str) -> Result<UserId, TokenError> {
        decode::<RefreshClaims>(token, &self.decoding_key, &self.refresh_validation)
            .map(|data| data.claims.sub)
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        encode(&Header::new(SIGNING_ALGORITHM), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

fn to_datetime(timestamp: i64, fallback: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or(fallback)
}

/// Hashes a token using SHA256 for secure storage.
pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-that-is-at-least-32-chars";

    fn create_test_signer() -> TokenSigner {
        TokenSigner::new(TokenConfig::new(SECRET))
    }

    fn forge<T: Serialize>(alg: Algorithm, claims: &T) -> String {
        encode(
            &Header::new(alg),
            claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("should encode")
    }

    #[test]
    fn test_access_token_roundtrip() {
        let signer = create_test_signer();

        let issued = signer
            .issue_access_token(42, "user@test.com", true)
            .expect("should issue");
        let claims = signer
            .verify_access_token(&issued.token)
            .expect("should verify");

        assert_eq!(claims.sub, 42);
        assert_eq!(claims.email, "user@test.com");
        assert!(claims.is_admin);
        assert_eq!(claims.iat, claims.nbf);
        assert_eq!(claims.exp, claims.iat + 900);
        assert_eq!(issued.expires_at.timestamp(), claims.exp);
    }

    #[test]
    fn test_refresh_token_roundtrip() {
        let signer = create_test_signer();

        let issued = signer.issue_refresh_token(7).expect("should issue");
        let user_id = signer
            .verify_refresh_token(&issued.token)
            .expect("should verify");

        assert_eq!(user_id, 7);
        let lifetime = issued.expires_at - Utc::now();
        assert!(lifetime > Duration::days(7) - Duration::minutes(1));
    }

    #[test]
    fn test_refresh_tokens_are_unique() {
        let signer = create_test_signer();

        let first = signer.issue_refresh_token(7).unwrap();
        let second = signer.issue_refresh_token(7).unwrap();

        assert_ne!(first.token, second.token);
    }

    #[test]
    fn test_refresh_token_carries_no_profile_data() {
        let signer = create_test_signer();
        let issued = signer.issue_refresh_token(7).unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        let raw = decode::<serde_json::Value>(
            &issued.token,
            &DecodingKey::from_secret(SECRET.as_bytes()),
            &validation,
        )
        .unwrap()
        .claims;

        assert!(raw.get("email").is_none());
        assert!(raw.get("is_admin").is_none());
        assert_eq!(raw["sub"], "7");
    }

    #[test]
    fn test_invalid_token_rejected() {
        let signer = create_test_signer();

        assert!(signer.verify_access_token("invalid.token.here").is_err());
        assert!(signer.verify_refresh_token("").is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let signer1 = TokenSigner::new(TokenConfig::new("secret-one-that-is-32-chars-long"));
        let signer2 = TokenSigner::new(TokenConfig::new("secret-two-that-is-32-chars-long"));

        let issued = signer1.issue_access_token(1, "a@x.com", false).unwrap();
        assert!(signer2.verify_access_token(&issued.token).is_err());

        let refresh = signer1.issue_refresh_token(1).unwrap();
        assert!(signer2.verify_refresh_token(&refresh.token).is_err());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let signer = create_test_signer();
        let user = signer.issue_access_token(1, "a@x.com", false).unwrap();
        let admin = signer.issue_access_token(1, "a@x.com", true).unwrap();

        // admin payload glued onto the non-admin signature
        let user_parts: Vec<&str> = user.token.split('.').collect();
        let admin_parts: Vec<&str> = admin.token.split('.').collect();
        let spliced = format!("{}.{}.{}", user_parts[0], admin_parts[1], user_parts[2]);

        assert!(signer.verify_access_token(&spliced).is_err());
    }

    #[test]
    fn test_other_hmac_algorithm_rejected() {
        let signer = create_test_signer();
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: 1,
            email: "a@x.com".to_string(),
            is_admin: true,
            iat: now,
            nbf: now,
            exp: now + 600,
        };

        let token = forge(Algorithm::HS512, &claims);
        assert!(signer.verify_access_token(&token).is_err());

        // sanity check: the same claims signed with HS256 are fine
        let token = forge(Algorithm::HS256, &claims);
        assert!(signer.verify_access_token(&token).is_ok());
    }

    #[test]
    fn test_unsigned_token_rejected() {
        let signer = create_test_signer();
        let issued = signer.issue_access_token(1, "a@x.com", true).unwrap();
        let payload = issued.token.split('.').nth(1).unwrap();

        // {"alg":"none","typ":"JWT"}
        let unsigned = format!("eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.{}.", payload);
        assert!(signer.verify_access_token(&unsigned).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let signer = create_test_signer();
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: 1,
            email: "a@x.com".to_string(),
            is_admin: false,
            iat: now - 1000,
            nbf: now - 1000,
            exp: now - 100,
        };

        let token = forge(Algorithm::HS256, &claims);
        let err = signer.verify_access_token(&token).unwrap_err();
        assert!(matches!(err, TokenError::Invalid(_)));

        let refresh = RefreshClaims {
            sub: 1,
            jti: "x".to_string(),
            iat: now - 1000,
            exp: now - 1,
        };
        let token = forge(Algorithm::HS256, &refresh);
        assert!(signer.verify_refresh_token(&token).is_err());
    }

    #[test]
    fn test_expired_after_lifetime_elapses() {
        let signer = TokenSigner::new(TokenConfig {
            secret: SECRET.to_string(),
            access_ttl: Duration::seconds(1),
            refresh_ttl: Duration::seconds(1),
        });

        let issued = signer.issue_access_token(1, "a@x.com", false).unwrap();
        assert!(signer.verify_access_token(&issued.token).is_ok());

        std::thread::sleep(std::time::Duration::from_millis(2100));
        assert!(signer.verify_access_token(&issued.token).is_err());
    }

    #[test]
    fn test_premature_token_rejected() {
        let signer = create_test_signer();
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: 1,
            email: "a@x.com".to_string(),
            is_admin: false,
            iat: now,
            nbf: now + 300,
            exp: now + 900,
        };

        let token = forge(Algorithm::HS256, &claims);
        assert!(signer.verify_access_token(&token).is_err());
    }

    #[test]
    fn test_token_kinds_are_not_interchangeable() {
        let signer = create_test_signer();
        let access = signer.issue_access_token(1, "a@x.com", false).unwrap();
        let refresh = signer.issue_refresh_token(1).unwrap();

        assert!(signer.verify_refresh_token(&access.token).is_err());
        assert!(signer.verify_access_token(&refresh.token).is_err());
    }

    #[test]
    fn test_non_numeric_subject_rejected() {
        let signer = create_test_signer();
        let now = Utc::now().timestamp();
        let claims = serde_json::json!({
            "sub": "not-a-number",
            "jti": "abc",
            "iat": now,
            "exp": now + 600,
        });

        let token = forge(Algorithm::HS256, &claims);
        assert!(signer.verify_refresh_token(&token).is_err());
    }

    #[test]
    fn test_hash_token() {
        let hash1 = hash_token("some-refresh-token");
        let hash2 = hash_token("some-refresh-token");

        assert_eq!(hash1, hash2, "same token should hash to same value");
        assert_eq!(hash1.len(), 64, "SHA256 hash should be 64 hex characters");
        assert!(hash1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(hash1, hash_token("another-token"));
    }

    #[test]
    fn test_config_debug_redacts_secret() {
        let rendered = format!("{:?}", TokenConfig::new(SECRET));
        assert!(!rendered.contains(SECRET));
    }
}
