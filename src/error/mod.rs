//! Crate-level error type.

use thiserror::Error;

use crate::auth::store::StoreError;
use crate::auth::AuthError;

/// Errors from setting up or running the launcher login stack.
#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Account store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, LauncherError>;
