use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Stable discriminant attached to every error returned by a [`CommandBridge`].
///
/// The first four variants mirror the RFC 8628 token endpoint error codes and
/// render as those exact strings.
///
/// [`CommandBridge`]: super::CommandBridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BridgeErrorKind {
    AuthorizationPending,
    SlowDown,
    ExpiredToken,
    AccessDenied,
    /// The backend could not be reached, or the call timed out.
    Transport,
    /// Any other failure reported by the backend.
    Backend,
}

/// Structured error returned by backend commands.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct BridgeError {
    pub kind: BridgeErrorKind,
    pub message: String,
}

impl BridgeError {
    pub fn new(kind: BridgeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(BridgeErrorKind::Transport, message)
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(BridgeErrorKind::Backend, message)
    }

    /// Classify a plain error string from a bridge that cannot carry a kind.
    ///
    /// Looks for the RFC 8628 error codes anywhere in the message; anything
    /// unrecognised becomes [`BridgeErrorKind::Backend`].
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = [
            BridgeErrorKind::AuthorizationPending,
            BridgeErrorKind::SlowDown,
            BridgeErrorKind::ExpiredToken,
            BridgeErrorKind::AccessDenied,
        ]
        .into_iter()
        .find(|kind| message.contains(&kind.to_string()))
        .unwrap_or(BridgeErrorKind::Backend);
        Self { kind, message }
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(error: reqwest::Error) -> Self {
        Self::transport(error.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(error: serde_json::Error) -> Self {
        Self::backend(format!("Invalid response: {error}"))
    }
}

/// Failure of a best-effort host side effect.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Clipboard unavailable: {0}")]
    Clipboard(String),
    #[error("Could not open browser: {0}")]
    Browser(String),
}

/// Errors surfaced by [`AuthCoordinator`](super::AuthCoordinator) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Authorization pending")]
    AuthorizationPending,
    #[error("Slow down requested by the token endpoint")]
    SlowDown,
    #[error("Device code expired, please try again")]
    ExpiredToken,
    #[error("Authorization denied")]
    AccessDenied,
    #[error("Device authorization cancelled")]
    Cancelled,
    #[error("Backend unreachable: {0}")]
    Transport(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

impl AuthError {
    /// Errors that keep a device flow polling.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::AuthorizationPending | Self::SlowDown)
    }

    /// Errors that end the current device flow attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ExpiredToken | Self::AccessDenied | Self::Transport(_) | Self::Backend(_)
        )
    }
}

impl From<BridgeError> for AuthError {
    fn from(error: BridgeError) -> Self {
        match error.kind {
            BridgeErrorKind::AuthorizationPending => Self::AuthorizationPending,
            BridgeErrorKind::SlowDown => Self::SlowDown,
            BridgeErrorKind::ExpiredToken => Self::ExpiredToken,
            BridgeErrorKind::AccessDenied => Self::AccessDenied,
            BridgeErrorKind::Transport => Self::Transport(error.message),
            BridgeErrorKind::Backend => Self::Backend(error.message),
        }
    }
}
