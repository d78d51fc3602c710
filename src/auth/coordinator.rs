//! Interactive login coordinator.
//!
//! Drives the OAuth 2.0 device authorization grant (RFC 8628) through a
//! [`CommandBridge`] and owns the offline login path:
//! - [`AuthCoordinator::check_account`]: pick up a persisted session
//! - [`AuthCoordinator::begin_offline_login`]: mint an offline account
//! - [`AuthCoordinator::begin_device_flow`]: request a code and start polling
//! - [`AuthCoordinator::cancel_device_flow`]: abort the current attempt
//! - [`AuthCoordinator::logout`]: forget the current account
//!
//! Polling runs on an interval timer task. Every tick spawns one guarded poll;
//! a tick that lands while a poll is outstanding is dropped, so at most one
//! token request is ever in flight and the wall-clock cadence never drifts.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::account::Account;
use super::bridge::CommandBridge;
use super::device_code::{DeviceAuthorizationChallenge, MAX_POLL_INTERVAL};
use super::error::{AuthError, BridgeError};
use super::host::{HostEffects, ProgressBus, ProgressSink, Subscription};
use super::state::{AuthPhase, AuthSnapshot, LoginMode};
use crate::config::CoordinatorConfig;
use crate::util::timeout::with_timeout;

/// Login coordinator shared by every login view of the launcher.
///
/// Cheap to clone; all clones drive the same state. Observers read the
/// per-field getters or subscribe with [`AuthCoordinator::watch_snapshot`].
///
/// # Example
///
/// ```ignore
/// let coordinator = AuthCoordinator::new(config, bridge, host, progress);
/// coordinator.check_account().await;
/// let challenge = coordinator.begin_device_flow().await?;
/// println!("Visit {} and enter {}", challenge.verification_uri, challenge.user_code);
/// ```
#[derive(Clone)]
pub struct AuthCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    config: CoordinatorConfig,
    bridge: Arc<dyn CommandBridge>,
    host: Arc<dyn HostEffects>,
    progress: Arc<dyn ProgressBus>,
    flow: Mutex<Option<ActiveFlow>>,
    next_flow_id: AtomicU64,
    poll_in_flight: AtomicBool,
    active_timers: Arc<AtomicUsize>,
    snapshot_tx: watch::Sender<AuthSnapshot>,
}

/// Resources owned by one device flow attempt.
struct ActiveFlow {
    id: u64,
    listener: Option<Subscription>,
    poll: Option<PollTimer>,
}

impl ActiveFlow {
    /// Stop the timer and unsubscribe the listener. Safe to call repeatedly.
    fn release(&mut self) {
        if let Some(poll) = self.poll.take() {
            poll.handle.abort();
        }
        if let Some(mut listener) = self.listener.take() {
            listener.cancel();
        }
    }
}

impl Drop for ActiveFlow {
    fn drop(&mut self) {
        self.release();
    }
}

struct PollTimer {
    handle: JoinHandle<()>,
    period: Duration,
    target: Arc<PollTarget>,
    _lease: TimerLease,
}

/// What each tick polls for.
struct PollTarget {
    flow_id: u64,
    device_code: String,
    deadline: Option<Instant>,
}

/// Counts live timer handles.
struct TimerLease(Arc<AtomicUsize>);

impl TimerLease {
    fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for TimerLease {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Clears the in-flight flag however the poll ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AuthCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        bridge: Arc<dyn CommandBridge>,
        host: Arc<dyn HostEffects>,
        progress: Arc<dyn ProgressBus>,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(AuthSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                config,
                bridge,
                host,
                progress,
                flow: Mutex::new(None),
                next_flow_id: AtomicU64::new(0),
                poll_in_flight: AtomicBool::new(false),
                active_timers: Arc::new(AtomicUsize::new(0)),
                snapshot_tx,
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// Point-in-time copy of all observable fields.
    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Subscribe to snapshot changes via a [`watch::Receiver`].
    pub fn watch_snapshot(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    pub fn current_account(&self) -> Option<Account> {
        self.inner.snapshot_tx.borrow().current_account.clone()
    }

    pub fn login_mode(&self) -> LoginMode {
        self.inner.snapshot_tx.borrow().login_mode
    }

    pub fn phase(&self) -> AuthPhase {
        self.inner.snapshot_tx.borrow().phase
    }

    pub fn device_challenge(&self) -> Option<DeviceAuthorizationChallenge> {
        self.inner.snapshot_tx.borrow().device_challenge.clone()
    }

    pub fn status_message(&self) -> String {
        self.inner.snapshot_tx.borrow().status_message.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.snapshot_tx.borrow().is_busy
    }

    pub fn notice(&self) -> Option<AuthError> {
        self.inner.snapshot_tx.borrow().notice.clone()
    }

    /// Number of poll timers currently alive (0 or 1 outside of bugs).
    pub fn active_timer_count(&self) -> usize {
        self.inner.active_timers.load(Ordering::SeqCst)
    }

    /// Acknowledge the blocking notice.
    pub fn dismiss_notice(&self) {
        self.update(|s| s.notice = None);
    }

    /// Ask the backend for an already active account and publish it.
    ///
    /// Never fails: a bridge error is logged and the current account is left
    /// untouched. Busy is only cleared if this call was the one to set it.
    pub async fn check_account(&self) {
        let mut claimed_busy = false;
        self.update(|s| {
            if !s.is_busy {
                s.is_busy = true;
                claimed_busy = true;
            }
        });
        match self.call(self.inner.bridge.get_active_account()).await {
            Ok(account) => {
                debug!(found = account.is_some(), "Checked for active account");
                self.update(|s| {
                    if claimed_busy {
                        s.is_busy = false;
                    }
                    match (&account, s.phase) {
                        (Some(_), AuthPhase::Idle) => s.set_phase(AuthPhase::Authenticated),
                        (None, AuthPhase::Authenticated) => s.set_phase(AuthPhase::Idle),
                        _ => {}
                    }
                    s.current_account = account;
                });
            }
            Err(err) => {
                warn!(error = %err, "Could not query the active account");
                if claimed_busy {
                    self.update(|s| s.is_busy = false);
                }
            }
        }
    }

    /// Switch the login UI to `mode`.
    ///
    /// Leaving [`LoginMode::DeviceFlow`] cancels the running attempt;
    /// selecting it starts a new one.
    pub async fn select_mode(&self, mode: LoginMode) -> Result<(), AuthError> {
        match mode {
            LoginMode::DeviceFlow => self.begin_device_flow().await.map(|_| ()),
            LoginMode::OfflineEntry => {
                self.cancel_device_flow().await;
                self.update(|s| {
                    s.set_phase(AuthPhase::OfflineEntry);
                    s.notice = None;
                });
                Ok(())
            }
            LoginMode::Unselected => {
                self.cancel_device_flow().await;
                self.update(|s| {
                    if s.phase == AuthPhase::OfflineEntry {
                        s.reset_to_selection();
                    }
                });
                Ok(())
            }
        }
    }

    /// Log in offline as `username`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] without calling the backend when the
    /// trimmed name is empty. Backend failures leave the coordinator in
    /// offline entry. Both are also published as the notice.
    pub async fn begin_offline_login(&self, username: &str) -> Result<Account, AuthError> {
        self.cancel_device_flow().await;

        let username = username.trim();
        if username.is_empty() {
            let err = AuthError::Validation("Username must not be empty".to_string());
            self.update(|s| {
                s.set_phase(AuthPhase::OfflineEntry);
                s.notice = Some(err.clone());
            });
            return Err(err);
        }

        self.update(|s| {
            s.set_phase(AuthPhase::OfflineEntry);
            s.notice = None;
            s.is_busy = true;
        });

        match self.call(self.inner.bridge.login_offline(username)).await {
            Ok(account) => {
                info!(username = %account.username, "Offline login succeeded");
                self.update(|s| {
                    s.set_phase(AuthPhase::Authenticated);
                    s.current_account = Some(account.clone());
                    s.is_busy = false;
                });
                Ok(account)
            }
            Err(err) => {
                let err = AuthError::from(err);
                warn!(error = %err, "Offline login failed");
                self.update(|s| {
                    s.set_phase(AuthPhase::OfflineEntry);
                    s.is_busy = false;
                    s.notice = Some(err.clone());
                });
                Err(err)
            }
        }
    }

    /// Start a device authorization attempt.
    ///
    /// Any attempt already running is cancelled first. On success the user
    /// code is copied and the verification page opened (best-effort), and
    /// polling starts at the challenge's interval.
    ///
    /// # Errors
    ///
    /// Returns the backend error if no challenge could be obtained, or
    /// [`AuthError::Cancelled`] if the attempt was cancelled or superseded
    /// while the challenge was being requested.
    pub async fn begin_device_flow(&self) -> Result<DeviceAuthorizationChallenge, AuthError> {
        let flow_id = self.inner.next_flow_id.fetch_add(1, Ordering::Relaxed) + 1;
        {
            let mut slot = self.inner.flow.lock().await;
            if let Some(mut previous) = slot.take() {
                debug!(previous = previous.id, flow_id, "Restarting device flow");
                previous.release();
            }
            self.update(|s| {
                s.set_phase(AuthPhase::AwaitingAuthorization);
                s.device_challenge = None;
                s.status_message = self.inner.config.initial_status.clone();
                s.notice = None;
                s.is_busy = true;
            });
            let listener = match self.inner.progress.subscribe(self.status_sink()) {
                Ok(subscription) => Some(subscription),
                Err(err) => {
                    warn!(flow_id, error = %err, "Progress updates unavailable");
                    None
                }
            };
            *slot = Some(ActiveFlow {
                id: flow_id,
                listener,
                poll: None,
            });
        }

        let result = self
            .call(self.inner.bridge.start_device_authorization())
            .await;

        let mut slot = self.inner.flow.lock().await;
        if !is_current(&slot, flow_id) {
            debug!(flow_id, "Device flow cancelled before the challenge arrived");
            return Err(AuthError::Cancelled);
        }

        let challenge = match result {
            Ok(challenge) => challenge,
            Err(err) => {
                let err = AuthError::from(err);
                warn!(flow_id, error = %err, "Device authorization request failed");
                if let Some(mut flow) = slot.take() {
                    flow.release();
                }
                self.fail_to_selection(&err);
                return Err(err);
            }
        };

        if let Err(err) = self.inner.host.copy_to_clipboard(&challenge.user_code) {
            warn!(flow_id, error = %err, "Could not copy the user code");
        }
        if let Err(err) = self.inner.host.open_url(&challenge.verification_uri) {
            warn!(flow_id, error = %err, "Could not open the verification page");
        }

        let period = challenge.poll_interval_or(self.inner.config.default_poll_interval);
        let target = Arc::new(PollTarget {
            flow_id,
            device_code: challenge.device_code.clone(),
            // A lifetime too large to represent means no local deadline.
            deadline: challenge
                .lifetime()
                .and_then(|lifetime| Instant::now().checked_add(lifetime)),
        });
        if let Some(flow) = slot.as_mut() {
            flow.poll = Some(self.start_timer(target, period));
        }

        self.update(|s| {
            s.set_phase(AuthPhase::Polling);
            s.device_challenge = Some(challenge.clone());
            s.status_message = self.inner.config.waiting_status.clone();
            s.is_busy = false;
        });
        info!(
            flow_id,
            interval_secs = period.as_secs(),
            "Device authorization started"
        );
        Ok(challenge)
    }

    /// Abort the running device flow and return to mode selection.
    ///
    /// Idempotent. A poll already sent to the backend is not interrupted, but
    /// its result will be discarded.
    pub async fn cancel_device_flow(&self) {
        let mut slot = self.inner.flow.lock().await;
        let Some(mut flow) = slot.take() else {
            return;
        };
        debug!(flow_id = flow.id, "Device flow cancelled");
        flow.release();
        self.update(|s| {
            s.reset_to_selection();
            s.is_busy = false;
            s.status_message.clear();
        });
    }

    /// Log out through the backend and clear the current account.
    ///
    /// The account is cleared even when the backend call fails; the error is
    /// still returned and published as the notice.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.cancel_device_flow().await;
        self.update(|s| s.is_busy = true);

        let result = self.call(self.inner.bridge.logout()).await;
        self.update(|s| {
            s.current_account = None;
            s.reset_to_selection();
            s.is_busy = false;
        });

        match result {
            Ok(()) => {
                info!("Logged out");
                Ok(())
            }
            Err(err) => {
                let err = AuthError::from(err);
                warn!(error = %err, "Backend logout failed; local account cleared anyway");
                self.update(|s| s.notice = Some(err.clone()));
                Err(err)
            }
        }
    }

    /// Release every resource held by a running attempt.
    pub async fn shutdown(&self) {
        self.cancel_device_flow().await;
    }

    // -- Internal helpers --

    fn update(&self, modify: impl FnOnce(&mut AuthSnapshot)) {
        self.inner.snapshot_tx.send_modify(modify);
    }

    async fn call<T>(
        &self,
        future: impl std::future::Future<Output = Result<T, BridgeError>>,
    ) -> Result<T, BridgeError> {
        with_timeout(self.inner.config.bridge_timeout, future).await
    }

    /// Sink that mirrors progress messages into the status line.
    fn status_sink(&self) -> ProgressSink {
        let snapshot_tx = self.inner.snapshot_tx.clone();
        Arc::new(move |message: String| {
            snapshot_tx.send_modify(|s| s.status_message = message);
        })
    }

    fn fail_to_selection(&self, err: &AuthError) {
        self.update(|s| {
            s.reset_to_selection();
            s.is_busy = false;
            s.status_message = format!("Error: {err}");
            s.notice = Some(err.clone());
        });
    }

    fn start_timer(&self, target: Arc<PollTarget>, period: Duration) -> PollTimer {
        let lease = TimerLease::acquire(&self.inner.active_timers);
        let handle = spawn_ticker(Arc::downgrade(&self.inner), target.clone(), period);
        PollTimer {
            handle,
            period,
            target,
            _lease: lease,
        }
    }

    /// One guarded poll of the token endpoint.
    async fn poll_once(&self, target: &PollTarget) {
        let flow_id = target.flow_id;
        if !is_current(&*self.inner.flow.lock().await, flow_id) {
            return;
        }
        if self
            .inner
            .poll_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(flow_id, "Poll still in flight; skipping tick");
            return;
        }
        let _in_flight = InFlightGuard(&self.inner.poll_in_flight);

        if target.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            self.finish_with_error(flow_id, AuthError::ExpiredToken)
                .await;
            return;
        }

        let result = self
            .call(
                self.inner
                    .bridge
                    .complete_device_authorization(&target.device_code),
            )
            .await;

        match result {
            Ok(account) => self.finish_with_account(flow_id, account).await,
            Err(err) => match AuthError::from(err) {
                AuthError::AuthorizationPending => {
                    debug!(flow_id, "Authorization pending");
                }
                AuthError::SlowDown => self.slow_down(flow_id).await,
                err => self.finish_with_error(flow_id, err).await,
            },
        }
    }

    async fn finish_with_account(&self, flow_id: u64, account: Account) {
        let mut slot = self.inner.flow.lock().await;
        if !is_current(&slot, flow_id) {
            debug!(flow_id, "Discarding poll result for an inactive device flow");
            return;
        }
        if let Some(mut flow) = slot.take() {
            flow.release();
        }
        info!(flow_id, username = %account.username, "Device authorization completed");
        self.update(|s| {
            s.set_phase(AuthPhase::Authenticated);
            s.device_challenge = None;
            s.status_message = format!("Signed in as {}", account.username);
            s.current_account = Some(account);
            s.notice = None;
        });
    }

    async fn finish_with_error(&self, flow_id: u64, err: AuthError) {
        let mut slot = self.inner.flow.lock().await;
        if !is_current(&slot, flow_id) {
            debug!(flow_id, error = %err, "Discarding poll error for an inactive device flow");
            return;
        }
        if let Some(mut flow) = slot.take() {
            flow.release();
        }
        warn!(flow_id, error = %err, "Device authorization failed");
        self.fail_to_selection(&err);
    }

    async fn slow_down(&self, flow_id: u64) {
        if !self.inner.config.honor_slow_down {
            debug!(flow_id, "slow_down treated as pending");
            return;
        }
        let mut slot = self.inner.flow.lock().await;
        let Some(flow) = slot.as_mut().filter(|flow| flow.id == flow_id) else {
            return;
        };
        let Some(current) = flow.poll.take() else {
            return;
        };
        current.handle.abort();
        let period = current
            .period
            .saturating_add(self.inner.config.slow_down_step)
            .min(MAX_POLL_INTERVAL);
        let target = current.target.clone();
        drop(current);
        flow.poll = Some(self.start_timer(target, period));
        debug!(
            flow_id,
            interval_secs = period.as_secs(),
            "Token endpoint asked to slow down"
        );
    }
}

impl fmt::Debug for AuthCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCoordinator")
            .field("config", &self.inner.config)
            .field("snapshot", &*self.inner.snapshot_tx.borrow())
            .finish()
    }
}

fn is_current(slot: &Option<ActiveFlow>, flow_id: u64) -> bool {
    slot.as_ref().is_some_and(|flow| flow.id == flow_id)
}

/// Interval timer: each tick spawns a poll and goes straight back to waiting.
///
/// Holds only a weak reference so a dropped coordinator stops its timer.
fn spawn_ticker(inner: Weak<Inner>, target: Arc<PollTarget>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = period.clamp(Duration::from_millis(1), MAX_POLL_INTERVAL);
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else {
                break;
            };
            let coordinator = AuthCoordinator { inner };
            let target = target.clone();
            tokio::spawn(async move {
                coordinator.poll_once(&target).await;
            });
        }
    })
}
