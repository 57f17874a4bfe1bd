//! TOML-based configuration for Warden
//!
//! Infrastructure settings (listen address, token lifetimes, Argon2 cost,
//! database location) come from a TOML file, `warden.toml` by default.
//! Secrets are never written in the file: it names the environment
//! variables that hold them.

use crate::auth::jwt::TokenConfig;
use crate::auth::password::{HashConfig, PasswordHasher};
use crate::db::DatabaseProvider;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Shortest accepted JWT signing secret, in bytes.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Root configuration structure loaded from warden.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// `production` switches logs to JSON lines
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            environment: default_environment(),
        }
    }
}

impl ServerConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

// ============= Authentication Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Environment variable name containing the JWT secret
    #[serde(default = "default_jwt_secret_env")]
    pub jwt_secret_env: String,

    /// Access token lifetime in seconds
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl: i64,

    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_token_ttl")]
    pub refresh_token_ttl: i64,

    #[serde(default = "default_password_min_length")]
    pub password_min_length: usize,

    /// Argon2 time cost
    #[serde(default = "default_hash_iterations")]
    pub hash_iterations: u32,

    /// Argon2 memory cost in KiB
    #[serde(default = "default_hash_memory_kib")]
    pub hash_memory_kib: u32,

    #[serde(default = "default_hash_parallelism")]
    pub hash_parallelism: u32,

    /// Maximum number of hash/verify jobs running at once
    #[serde(default = "default_hash_concurrency")]
    pub hash_concurrency: usize,
}

fn default_jwt_secret_env() -> String {
    "JWT_SECRET".to_string()
}

fn default_access_token_ttl() -> i64 {
    900
}

fn default_refresh_token_ttl() -> i64 {
    604800
}

fn default_password_min_length() -> usize {
    8
}

fn default_hash_iterations() -> u32 {
    3
}

fn default_hash_memory_kib() -> u32 {
    19456
}

fn default_hash_parallelism() -> u32 {
    1
}

fn default_hash_concurrency() -> usize {
    4
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret_env: default_jwt_secret_env(),
            access_token_ttl: default_access_token_ttl(),
            refresh_token_ttl: default_refresh_token_ttl(),
            password_min_length: default_password_min_length(),
            hash_iterations: default_hash_iterations(),
            hash_memory_kib: default_hash_memory_kib(),
            hash_parallelism: default_hash_parallelism(),
            hash_concurrency: default_hash_concurrency(),
        }
    }
}

// ============= Database Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Local database path; `:memory:` keeps everything in process memory
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Environment variable for Turso URL (optional cloud config)
    pub turso_url_env: Option<String>,

    /// Environment variable for Turso auth token
    pub turso_token_env: Option<String>,

    /// Seconds between sweeps of expired refresh tokens; 0 disables
    #[serde(default = "default_purge_interval")]
    pub purge_interval: u64,
}

fn default_database_url() -> String {
    "./data/warden.db".to_string()
}

fn default_purge_interval() -> u64 {
    3600
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            turso_url_env: None,
            turso_token_env: None,
            purge_interval: default_purge_interval(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl WardenConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: WardenConfig = toml::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        let secret = self.jwt_secret()?;
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::ValidationError(format!(
                "JWT secret in '{}' must be at least {} bytes",
                self.auth.jwt_secret_env, MIN_SECRET_LENGTH
            )));
        }

        if self.auth.access_token_ttl <= 0 || self.auth.refresh_token_ttl <= 0 {
            return Err(ConfigError::ValidationError(
                "token lifetimes must be positive".to_string(),
            ));
        }
        if self.auth.access_token_ttl >= self.auth.refresh_token_ttl {
            return Err(ConfigError::ValidationError(
                "access_token_ttl must be shorter than refresh_token_ttl".to_string(),
            ));
        }

        if self.auth.password_min_length == 0 {
            return Err(ConfigError::ValidationError(
                "password_min_length must be at least 1".to_string(),
            ));
        }
        if self.auth.hash_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "hash_concurrency must be at least 1".to_string(),
            ));
        }
        PasswordHasher::new(self.hash_config())
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        // Validate database env vars if specified
        if let Some(ref env) = self.database.turso_url_env {
            self.validate_env_var(env)?;
        }
        if let Some(ref env) = self.database.turso_token_env {
            self.validate_env_var(env)?;
        }

        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    /// Get the JWT secret from the environment
    pub fn jwt_secret(&self) -> Result<String, ConfigError> {
        self.resolve_env(&self.auth.jwt_secret_env)
            .ok_or_else(|| ConfigError::MissingEnvVar(self.auth.jwt_secret_env.clone()))
    }

    pub fn token_config(&self) -> Result<TokenConfig, ConfigError> {
        let mut config = TokenConfig::new(self.jwt_secret()?);
        config.access_ttl = chrono::Duration::seconds(self.auth.access_token_ttl);
        config.refresh_ttl = chrono::Duration::seconds(self.auth.refresh_token_ttl);
        Ok(config)
    }

    pub fn hash_config(&self) -> HashConfig {
        HashConfig {
            min_length: self.auth.password_min_length,
            iterations: self.auth.hash_iterations,
            memory_kib: self.auth.hash_memory_kib,
            parallelism: self.auth.hash_parallelism,
        }
    }

    /// Which credential store to open.
    ///
    /// A configured Turso URL wins over the local path when the `turso`
    /// feature is compiled in.
    pub fn database_provider(&self) -> Result<DatabaseProvider, ConfigError> {
        #[cfg(feature = "turso")]
        if let Some(ref url_env) = self.database.turso_url_env {
            let url = self
                .resolve_env(url_env)
                .ok_or_else(|| ConfigError::MissingEnvVar(url_env.clone()))?;
            let auth_token = match self.database.turso_token_env {
                Some(ref token_env) => self
                    .resolve_env(token_env)
                    .ok_or_else(|| ConfigError::MissingEnvVar(token_env.clone()))?,
                None => String::new(),
            };
            return Ok(DatabaseProvider::Turso { url, auth_token });
        }

        if self.database.url == ":memory:" {
            return Ok(DatabaseProvider::Memory);
        }

        Ok(DatabaseProvider::SQLite {
            path: self.database.url.clone(),
        })
    }
}
