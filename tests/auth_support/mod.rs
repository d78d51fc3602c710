#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use launcher_auth::auth::{
    Account, AccountStore, AuthCoordinator, BridgeError, CommandBridge,
    DeviceAuthorizationChallenge, HostEffects, HostError, LocalProgressBus, StoreError,
};
use launcher_auth::config::CoordinatorConfig;
use tokio::sync::oneshot;

/// One scripted answer to `complete_device_authorization`.
pub struct PollStep {
    pub delay: Duration,
    pub result: Result<Account, BridgeError>,
}

impl PollStep {
    pub fn now(result: Result<Account, BridgeError>) -> Self {
        Self {
            delay: Duration::ZERO,
            result,
        }
    }

    pub fn after(delay: Duration, result: Result<Account, BridgeError>) -> Self {
        Self { delay, result }
    }
}

pub fn pending() -> Result<Account, BridgeError> {
    Err(BridgeError::from_message("authorization_pending"))
}

pub fn challenge(device_code: &str, interval: u64, expires_in: u64) -> DeviceAuthorizationChallenge {
    DeviceAuthorizationChallenge {
        device_code: device_code.to_string(),
        user_code: format!("USER-{device_code}"),
        verification_uri: "https://www.microsoft.com/link".to_string(),
        expires_in,
        interval,
    }
}

pub fn microsoft_account(username: &str) -> Account {
    Account::microsoft(username, "00000000-0000-0000-0000-000000000001", serde_json::json!({}))
}

/// Bridge driven by per-test scripts. Polls with no script left stay pending.
#[derive(Default)]
pub struct ScriptedBridge {
    active_account: Mutex<Option<Result<Option<Account>, BridgeError>>>,
    challenges: Mutex<VecDeque<Result<DeviceAuthorizationChallenge, BridgeError>>>,
    challenge_gate: Mutex<Option<oneshot::Receiver<()>>>,
    polls: Mutex<VecDeque<PollStep>>,
    offline_error: Mutex<Option<BridgeError>>,
    logout_error: Mutex<Option<BridgeError>>,
    polled_codes: Mutex<Vec<String>>,
    polls_in_flight: AtomicUsize,
    pub max_concurrent_polls: AtomicUsize,
    pub active_calls: AtomicUsize,
    pub start_calls: AtomicUsize,
    pub poll_calls: AtomicUsize,
    pub offline_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
}

impl ScriptedBridge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_active_account(&self, result: Result<Option<Account>, BridgeError>) {
        *self.active_account.lock().unwrap() = Some(result);
    }

    pub fn push_challenge(&self, result: Result<DeviceAuthorizationChallenge, BridgeError>) {
        self.challenges.lock().unwrap().push_back(result);
    }

    /// Hold the next `start_device_authorization` until `gate` fires.
    pub fn gate_challenge(&self, gate: oneshot::Receiver<()>) {
        *self.challenge_gate.lock().unwrap() = Some(gate);
    }

    pub fn push_poll(&self, step: PollStep) {
        self.polls.lock().unwrap().push_back(step);
    }

    pub fn fail_offline(&self, error: BridgeError) {
        *self.offline_error.lock().unwrap() = Some(error);
    }

    pub fn fail_logout(&self, error: BridgeError) {
        *self.logout_error.lock().unwrap() = Some(error);
    }

    pub fn polled_codes(&self) -> Vec<String> {
        self.polled_codes.lock().unwrap().clone()
    }

    pub fn polls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandBridge for ScriptedBridge {
    async fn get_active_account(&self) -> Result<Option<Account>, BridgeError> {
        self.active_calls.fetch_add(1, Ordering::SeqCst);
        self.active_account.lock().unwrap().clone().unwrap_or(Ok(None))
    }

    async fn start_device_authorization(&self) -> Result<DeviceAuthorizationChallenge, BridgeError> {
        let call = self.start_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let gate = self.challenge_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let scripted = self.challenges.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(challenge(&format!("device-{call}"), 5, 900)))
    }

    async fn complete_device_authorization(&self, device_code: &str) -> Result<Account, BridgeError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        self.polled_codes.lock().unwrap().push(device_code.to_string());
        let now = self.polls_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_polls.fetch_max(now, Ordering::SeqCst);

        let step = self.polls.lock().unwrap().pop_front();
        let step = step.unwrap_or_else(|| PollStep::now(pending()));
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }

        self.polls_in_flight.fetch_sub(1, Ordering::SeqCst);
        step.result
    }

    async fn login_offline(&self, username: &str) -> Result<Account, BridgeError> {
        self.offline_calls.fetch_add(1, Ordering::SeqCst);
        match self.offline_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(Account::offline(username)),
        }
    }

    async fn logout(&self) -> Result<(), BridgeError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        match self.logout_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Host that records side effects, optionally failing them.
#[derive(Default)]
pub struct RecordingHost {
    pub copied: Mutex<Vec<String>>,
    pub opened: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingHost {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl HostEffects for RecordingHost {
    fn copy_to_clipboard(&self, text: &str) -> Result<(), HostError> {
        if self.fail {
            return Err(HostError::Clipboard("no display".to_string()));
        }
        self.copied.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn open_url(&self, url: &str) -> Result<(), HostError> {
        if self.fail {
            return Err(HostError::Browser("no browser".to_string()));
        }
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

pub struct Harness {
    pub coordinator: AuthCoordinator,
    pub bridge: Arc<ScriptedBridge>,
    pub host: Arc<RecordingHost>,
    pub bus: LocalProgressBus,
}

pub fn harness() -> Harness {
    harness_with(CoordinatorConfig::default(), RecordingHost::default())
}

pub fn harness_with(config: CoordinatorConfig, host: RecordingHost) -> Harness {
    let bridge = ScriptedBridge::new();
    let host = Arc::new(host);
    let bus = LocalProgressBus::new();
    let coordinator = AuthCoordinator::new(config, bridge.clone(), host.clone(), Arc::new(bus.clone()));
    Harness {
        coordinator,
        bridge,
        host,
        bus,
    }
}

pub async fn advance(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

#[derive(Default)]
pub struct InMemoryAccountStore {
    account: Mutex<Option<Account>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, account: Account) {
        *self.account.lock().expect("store lock poisoned") = Some(account);
    }

    pub fn get(&self) -> Option<Account> {
        self.account.lock().expect("store lock poisoned").clone()
    }
}

impl AccountStore for InMemoryAccountStore {
    fn load(&self) -> Result<Option<Account>, StoreError> {
        Ok(self.get())
    }

    fn save(&self, account: &Account) -> Result<(), StoreError> {
        *self.account.lock().expect("store lock poisoned") = Some(account.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.account.lock().expect("store lock poisoned") = None;
        Ok(())
    }
}
