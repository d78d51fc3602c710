//! Observable state of the login coordinator.

use serde::{Deserialize, Serialize};
use strum::Display;

use super::account::Account;
use super::device_code::DeviceAuthorizationChallenge;
use super::error::AuthError;

/// Which login branch the UI is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginMode {
    /// Mode selection screen.
    #[default]
    Unselected,
    OfflineEntry,
    DeviceFlow,
}

/// Coordinator state machine.
///
/// `AwaitingAuthorization` and `Polling` are both reported as
/// [`LoginMode::DeviceFlow`]; they differ in whether a challenge has arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum AuthPhase {
    #[default]
    Idle,
    OfflineEntry,
    AwaitingAuthorization,
    Polling,
    Authenticated,
}

impl AuthPhase {
    pub fn login_mode(self) -> LoginMode {
        match self {
            Self::Idle | Self::Authenticated => LoginMode::Unselected,
            Self::OfflineEntry => LoginMode::OfflineEntry,
            Self::AwaitingAuthorization | Self::Polling => LoginMode::DeviceFlow,
        }
    }

    /// Whether a device flow attempt owns a listener (and possibly a timer).
    pub fn is_device_flow(self) -> bool {
        self.login_mode() == LoginMode::DeviceFlow
    }
}

/// Point-in-time snapshot of everything the login UI renders.
///
/// Subscribe to changes via
/// [`AuthCoordinator::watch_snapshot`](super::AuthCoordinator::watch_snapshot).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthSnapshot {
    pub phase: AuthPhase,
    pub login_mode: LoginMode,
    pub current_account: Option<Account>,
    pub device_challenge: Option<DeviceAuthorizationChallenge>,
    /// Rolling, last-write-wins status line.
    pub status_message: String,
    /// A user-initiated backend call is outstanding.
    pub is_busy: bool,
    /// Blocking error to show until dismissed.
    pub notice: Option<AuthError>,
}

impl AuthSnapshot {
    pub(crate) fn set_phase(&mut self, phase: AuthPhase) {
        self.phase = phase;
        self.login_mode = phase.login_mode();
    }

    /// Return to mode selection, dropping any device flow details.
    pub(crate) fn reset_to_selection(&mut self) {
        self.set_phase(AuthPhase::Idle);
        self.device_challenge = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_collapse_into_login_modes() {
        assert_eq!(AuthPhase::Idle.login_mode(), LoginMode::Unselected);
        assert_eq!(AuthPhase::OfflineEntry.login_mode(), LoginMode::OfflineEntry);
        assert_eq!(
            AuthPhase::AwaitingAuthorization.login_mode(),
            LoginMode::DeviceFlow
        );
        assert_eq!(AuthPhase::Polling.login_mode(), LoginMode::DeviceFlow);
        assert_eq!(AuthPhase::Authenticated.login_mode(), LoginMode::Unselected);
    }

    #[test]
    fn set_phase_keeps_mode_in_sync() {
        let mut snapshot = AuthSnapshot::default();
        snapshot.set_phase(AuthPhase::Polling);
        assert_eq!(snapshot.login_mode, LoginMode::DeviceFlow);
        snapshot.reset_to_selection();
        assert_eq!(snapshot.phase, AuthPhase::Idle);
        assert_eq!(snapshot.login_mode, LoginMode::Unselected);
    }

    #[test]
    fn login_mode_serializes_snake_case() {
        let value = serde_json::to_value(LoginMode::OfflineEntry).unwrap();
        assert_eq!(value, "offline_entry");
    }
}
