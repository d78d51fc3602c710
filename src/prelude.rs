//! Convenience re-exports for common use.

pub use crate::auth::{
    Account, AccountKind, AuthCoordinator, AuthError, AuthPhase, AuthSnapshot, BridgeError,
    BridgeErrorKind, CommandBridge, DeviceAuthorizationChallenge, HostEffects, LocalBridge,
    LocalProgressBus, LoginMode, NoopHost, ProgressBus,
};
pub use crate::config::{CoordinatorConfig, LauncherConfig};
pub use crate::error::{LauncherError, Result};
