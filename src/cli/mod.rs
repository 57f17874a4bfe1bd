//! CLI module for Warden
//!
//! Provides command-line interface parsing for the warden-server binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod init;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Warden - credential issuing server
///
/// Registers users, checks passwords and hands out short-lived access tokens
/// with rotating refresh tokens.
#[derive(Parser, Debug)]
#[command(
    name = "warden-server",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "Warden - credential issuing server",
    long_about = "Credential issuing server: Argon2id password storage, HS256 access tokens\n\
                  and single-use rotating refresh tokens.\n\n\
                  Run without arguments to start the server, or use 'init' to write a starter config.",
    after_help = "EXAMPLES:\n    \
                  warden-server init                   # Write warden.toml and .env.example\n    \
                  warden-server                        # Start the server (requires warden.toml)\n    \
                  warden-server --config my.toml       # Use a custom config file\n    \
                  echo -n 'secret' | warden-server hash-password"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "warden.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter warden.toml and .env.example
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files without prompting
        #[arg(short, long)]
        force: bool,

        /// Host address for the server
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port for the server
        #[arg(long, default_value = "3000")]
        port: u16,
    },

    /// Hash a password read from stdin with the configured Argon2 parameters
    ///
    /// Prints the PHC string, e.g. for seeding an admin account directly in
    /// the database.
    HashPassword,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
