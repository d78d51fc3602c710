//! Launcher login: device authorization coordinator, backend bridge and
//! account storage.

pub mod account;
pub mod bridge;
pub mod coordinator;
pub mod device_code;
pub mod error;
pub mod host;
pub mod local_bridge;
pub mod providers;
pub mod state;
pub mod store;

pub use account::{offline_uuid, Account, AccountKind};
pub use bridge::CommandBridge;
pub use coordinator::AuthCoordinator;
pub use device_code::{DeviceAuthorizationChallenge, DEFAULT_POLL_INTERVAL, MAX_POLL_INTERVAL};
pub use error::{AuthError, BridgeError, BridgeErrorKind, HostError};
pub use host::{HostEffects, LocalProgressBus, NoopHost, ProgressBus, ProgressSink, Subscription};
#[cfg(feature = "system-host")]
pub use host::SystemHost;
pub use local_bridge::LocalBridge;
pub use state::{AuthPhase, AuthSnapshot, LoginMode};
pub use store::{AccountStore, FileAccountStore, StoreError};
