//! Init command implementation
//!
//! Writes a starter `warden.toml`, `.env.example` and `.gitignore`.

use super::output::Output;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug, PartialEq, Eq)]
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// warden.toml already exists and --force was not given
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// Host address for the server
    pub host: String,
    /// Port for the server
    pub port: u16,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing Warden");

    let base_path = &config.path;

    let config_path = base_path.join("warden.toml");
    if config_path.exists() && !config.force {
        output.warning("warden.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    output.subheader("Creating directories");

    let data_dir = base_path.join("data");
    if !data_dir.exists() {
        if let Err(e) = fs::create_dir_all(&data_dir) {
            output.error(&format!("Failed to create data: {}", e));
            return InitResult::Error(e.to_string());
        }
        output.created_dir("data");
    } else {
        output.skipped("data", "already exists");
    }

    output.subheader("Creating configuration files");

    if let Err(e) = write_file(&config_path, &generate_warden_toml(&config), config.force) {
        output.error(&format!("Failed to create warden.toml: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", "warden.toml");

    let env_example_path = base_path.join(".env.example");
    if let Err(e) = write_file(&env_example_path, ENV_EXAMPLE, config.force) {
        output.error(&format!("Failed to create .env.example: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("env", ".env.example");

    let gitignore_path = base_path.join(".gitignore");
    if !gitignore_path.exists() {
        if let Err(e) = write_file(&gitignore_path, GITIGNORE, false) {
            output.warning(&format!("Failed to create .gitignore: {}", e));
        } else {
            output.created("file", ".gitignore");
        }
    }

    output.complete("Warden initialized successfully!");

    output.header("Next Steps");
    output.newline();
    output.info("1. Set up environment variables:");
    output.command("cp .env.example .env");
    output.command("# Edit .env and set JWT_SECRET (min 32 bytes)");
    output.newline();
    output.info("2. Start the server:");
    output.command("warden-server");
    output.newline();

    output.hint(&format!(
        "Server will be available at http://{}:{}",
        config.host, config.port
    ));

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(()); // Skip existing files unless force is true
    }
    fs::write(path, content)
}

fn generate_warden_toml(config: &InitConfig) -> String {
    format!(
        r#"# Warden configuration
# Secrets are read from the environment; this file only names the variables.

[server]
host = "{host}"
port = {port}
log_level = "info"
# "production" switches logs to JSON lines
environment = "development"

[auth]
jwt_secret_env = "JWT_SECRET"
# seconds
access_token_ttl = 900
refresh_token_ttl = 604800
password_min_length = 8
# Argon2id cost; raising these upgrades stored hashes on next login
hash_iterations = 3
hash_memory_kib = 19456
hash_parallelism = 1
hash_concurrency = 4

[database]
# ":memory:" keeps everything in process memory
url = "./data/warden.db"
# turso_url_env = "TURSO_URL"
# turso_token_env = "TURSO_AUTH_TOKEN"
# seconds between sweeps of expired refresh tokens, 0 disables
purge_interval = 3600
"#,
        host = config.host,
        port = config.port
    )
}

const ENV_EXAMPLE: &str = r#"# Warden Environment Variables
# ============================
# Copy this file to .env and fill in the values.

# REQUIRED: JWT secret for token signing (minimum 32 bytes)
# Generate with: openssl rand -base64 48
JWT_SECRET=change-me-in-production-use-at-least-32-characters

# Optional: Logging level (trace, debug, info, warn, error)
RUST_LOG=info,warden=debug

# Optional: Turso cloud database (requires the `turso` feature)
# TURSO_URL=libsql://your-db.turso.io
# TURSO_AUTH_TOKEN=your-token
"#;

const GITIGNORE: &str = r#"# Warden Generated Files
/data/
*.db
*.db-journal

# Environment
.env
.env.local
.env.*.local
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::toml_config::WardenConfig;
    use tempfile::TempDir;

    fn create_test_config(temp_dir: &TempDir) -> InitConfig {
        InitConfig {
            path: temp_dir.path().to_path_buf(),
            force: false,
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }

    #[test]
    fn test_generated_toml_parses() {
        let config = InitConfig {
            path: PathBuf::from("/tmp"),
            force: false,
            host: "0.0.0.0".to_string(),
            port: 8080,
        };

        let content = generate_warden_toml(&config);
        let parsed: WardenConfig = toml::from_str(&content).unwrap();

        assert_eq!(parsed.server.host, "0.0.0.0");
        assert_eq!(parsed.server.port, 8080);
        assert_eq!(parsed.auth.jwt_secret_env, "JWT_SECRET");
        assert_eq!(parsed.database.purge_interval, 3600);
    }

    #[test]
    fn test_run_creates_files() {
        let temp_dir = TempDir::new().unwrap();
        let result = run(create_test_config(&temp_dir), &Output::no_color());

        assert_eq!(result, InitResult::Success);
        assert!(temp_dir.path().join("warden.toml").exists());
        assert!(temp_dir.path().join(".env.example").exists());
        assert!(temp_dir.path().join(".gitignore").exists());
        assert!(temp_dir.path().join("data").is_dir());
    }

    #[test]
    fn test_run_refuses_to_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("warden.toml");
        fs::write(&config_path, "# mine").unwrap();

        let result = run(create_test_config(&temp_dir), &Output::no_color());
        assert_eq!(result, InitResult::AlreadyExists);
        assert_eq!(fs::read_to_string(&config_path).unwrap(), "# mine");

        let mut forced = create_test_config(&temp_dir);
        forced.force = true;
        assert_eq!(run(forced, &Output::no_color()), InitResult::Success);
        assert!(fs::read_to_string(&config_path)
            .unwrap()
            .contains("[auth]"));
    }
}
