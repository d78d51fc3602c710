//! In-process reference backend.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::account::Account;
use super::bridge::CommandBridge;
use super::device_code::DeviceAuthorizationChallenge;
use super::error::BridgeError;
use super::host::LocalProgressBus;
use super::providers::microsoft::MicrosoftDeviceAuth;
use super::store::{AccountStore, FileAccountStore};
use crate::config::LauncherConfig;

/// [`CommandBridge`] that talks to Microsoft directly and keeps the active
/// account in an [`AccountStore`].
///
/// Progress messages are published on the bus returned by
/// [`LocalBridge::progress`].
pub struct LocalBridge {
    microsoft: Option<MicrosoftDeviceAuth>,
    store: Arc<dyn AccountStore>,
    progress: LocalProgressBus,
}

impl LocalBridge {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self {
            microsoft: None,
            store,
            progress: LocalProgressBus::new(),
        }
    }

    /// Wire up a backend from resolved configuration.
    pub fn from_config(config: &LauncherConfig) -> Self {
        let store = FileAccountStore::new(&config.data_dir);
        let bridge = Self::new(Arc::new(store));
        match &config.microsoft.client_id {
            Some(client_id) => bridge.with_microsoft(
                MicrosoftDeviceAuth::new(client_id)
                    .with_tenant(&config.microsoft.tenant)
                    .with_scope(&config.microsoft.scope),
            ),
            None => bridge,
        }
    }

    pub fn with_microsoft(mut self, microsoft: MicrosoftDeviceAuth) -> Self {
        self.microsoft = Some(microsoft);
        self
    }

    pub fn with_progress(mut self, progress: LocalProgressBus) -> Self {
        self.progress = progress;
        self
    }

    pub fn progress(&self) -> LocalProgressBus {
        self.progress.clone()
    }

    fn microsoft(&self) -> Result<&MicrosoftDeviceAuth, BridgeError> {
        self.microsoft.as_ref().ok_or_else(|| {
            BridgeError::backend(
                "Microsoft login is not configured (set LAUNCHER_AUTH_CLIENT_ID)",
            )
        })
    }
}

#[async_trait]
impl CommandBridge for LocalBridge {
    async fn get_active_account(&self) -> Result<Option<Account>, BridgeError> {
        Ok(self.store.load()?)
    }

    async fn start_device_authorization(&self) -> Result<DeviceAuthorizationChallenge, BridgeError> {
        let microsoft = self.microsoft()?;
        self.progress.publish("Requesting device code...");
        let challenge = microsoft.start_device_code().await?;
        self.progress.publish("Waiting for authorization...");
        Ok(challenge)
    }

    async fn complete_device_authorization(&self, device_code: &str) -> Result<Account, BridgeError> {
        let session = self.microsoft()?.poll_device_code(device_code).await?;
        self.progress.publish("Fetching profile...");
        let account = session.into_account()?;
        self.store.save(&account)?;
        debug!(username = %account.username, "Stored Microsoft account");
        self.progress.publish(format!("Signed in as {}", account.username));
        Ok(account)
    }

    async fn login_offline(&self, username: &str) -> Result<Account, BridgeError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(BridgeError::backend("Username must not be empty"));
        }
        let account = Account::offline(username);
        self.store.save(&account)?;
        debug!(username = %account.username, "Stored offline account");
        Ok(account)
    }

    async fn logout(&self) -> Result<(), BridgeError> {
        self.store.clear()?;
        Ok(())
    }
}

impl std::fmt::Debug for LocalBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBridge")
            .field("microsoft", &self.microsoft.is_some())
            .field("progress", &self.progress)
            .finish()
    }
}
