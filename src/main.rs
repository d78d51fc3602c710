//! launcher-auth CLI binary entry point.

use clap::Parser;
use launcher_auth::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Login(args) => launcher_auth::cli::auth::handle_login(args.offline).await,
        Commands::Status => launcher_auth::cli::auth::handle_status().await,
        Commands::Logout => launcher_auth::cli::auth::handle_logout().await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
