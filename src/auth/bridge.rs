//! Command bridge to the native launcher backend.

use async_trait::async_trait;

use super::account::Account;
use super::device_code::DeviceAuthorizationChallenge;
use super::error::BridgeError;

/// Backend commands consumed by [`super::AuthCoordinator`].
///
/// Every call is a request/response round trip to the backend. Errors carry a
/// [`BridgeErrorKind`](super::BridgeErrorKind); bridges that only receive
/// plain strings should build them with [`BridgeError::from_message`].
#[async_trait]
pub trait CommandBridge: Send + Sync {
    /// The account the backend currently considers active, if any.
    async fn get_active_account(&self) -> Result<Option<Account>, BridgeError>;

    /// Request a fresh device/user code pair.
    async fn start_device_authorization(
        &self,
    ) -> Result<DeviceAuthorizationChallenge, BridgeError>;

    /// Exchange a device code for an account.
    ///
    /// Fails with `AuthorizationPending` until the user finishes signing in.
    async fn complete_device_authorization(
        &self,
        device_code: &str,
    ) -> Result<Account, BridgeError>;

    /// Mint an offline account for `username`.
    async fn login_offline(&self, username: &str) -> Result<Account, BridgeError>;

    /// Forget the active account.
    async fn logout(&self) -> Result<(), BridgeError>;
}
