//! CLI entry point for the launcher login tools.

pub mod auth;

use clap::{Parser, Subcommand};

/// Launcher account login
#[derive(Parser, Debug)]
#[command(name = "launcher-auth", version, about = "Sign the launcher into an account")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in with a Microsoft account, or offline with --offline
    Login(LoginArgs),
    /// Show the active account
    Status,
    /// Forget the active account
    Logout,
}

/// Arguments for `launcher-auth login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Play offline under this username instead of signing in
    #[arg(long, value_name = "NAME")]
    pub offline: Option<String>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
