//! Host-provided side effects and the progress event channel.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use super::error::{BridgeError, HostError};

/// Clipboard and browser access supplied by the host shell.
///
/// Both operations are best-effort from the coordinator's point of view: a
/// failure is logged and the login flow carries on.
pub trait HostEffects: Send + Sync {
    fn copy_to_clipboard(&self, text: &str) -> Result<(), HostError>;
    fn open_url(&self, url: &str) -> Result<(), HostError>;
}

/// Host without a clipboard or browser (headless runs, tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHost;

impl HostEffects for NoopHost {
    fn copy_to_clipboard(&self, _text: &str) -> Result<(), HostError> {
        Ok(())
    }

    fn open_url(&self, _url: &str) -> Result<(), HostError> {
        Ok(())
    }
}

/// Desktop host backed by the system clipboard and default browser.
#[cfg(feature = "system-host")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

#[cfg(feature = "system-host")]
impl HostEffects for SystemHost {
    fn copy_to_clipboard(&self, text: &str) -> Result<(), HostError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| HostError::Clipboard(e.to_string()))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| HostError::Clipboard(e.to_string()))
    }

    fn open_url(&self, url: &str) -> Result<(), HostError> {
        webbrowser::open(url).map_err(|e| HostError::Browser(e.to_string()))
    }
}

/// Callback receiving free-text progress messages.
pub type ProgressSink = Arc<dyn Fn(String) + Send + Sync>;

/// Subscribable channel of progress messages emitted by the backend.
pub trait ProgressBus: Send + Sync {
    fn subscribe(&self, sink: ProgressSink) -> Result<Subscription, BridgeError>;
}

/// Handle returned by [`ProgressBus::subscribe`].
///
/// Unsubscribes at most once, either through [`Subscription::cancel`] or on
/// drop.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// A subscription with nothing to release.
    pub fn detached() -> Self {
        Self { unsubscribe: None }
    }

    pub fn cancel(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }

    pub fn is_active(&self) -> bool {
        self.unsubscribe.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    sinks: HashMap<u64, ProgressSink>,
}

/// In-process [`ProgressBus`] shared between a backend and its observers.
///
/// # Example
/// ```
/// use std::sync::{Arc, Mutex};
/// use launcher_auth::auth::{LocalProgressBus, ProgressBus};
///
/// let bus = LocalProgressBus::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink_seen = seen.clone();
/// let subscription = bus
///     .subscribe(Arc::new(move |msg: String| sink_seen.lock().unwrap().push(msg)))
///     .unwrap();
/// bus.publish("Requesting device code...");
/// drop(subscription);
/// bus.publish("ignored");
/// assert_eq!(seen.lock().unwrap().len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct LocalProgressBus {
    state: Arc<Mutex<BusState>>,
}

impl LocalProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `message` to every current subscriber.
    pub fn publish(&self, message: impl Into<String>) {
        let message = message.into();
        let sinks: Vec<ProgressSink> = match self.state.lock() {
            Ok(state) => state.sinks.values().cloned().collect(),
            Err(_) => return,
        };
        for sink in sinks {
            sink(message.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().map(|state| state.sinks.len()).unwrap_or(0)
    }
}

impl ProgressBus for LocalProgressBus {
    fn subscribe(&self, sink: ProgressSink) -> Result<Subscription, BridgeError> {
        let id = {
            let mut state = self
                .state
                .lock()
                .map_err(|_| BridgeError::backend("progress bus lock poisoned"))?;
            let id = state.next_id;
            state.next_id += 1;
            state.sinks.insert(id, sink);
            id
        };
        let state: Weak<Mutex<BusState>> = Arc::downgrade(&self.state);
        Ok(Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                if let Ok(mut state) = state.lock() {
                    state.sinks.remove(&id);
                }
            }
        }))
    }
}

impl fmt::Debug for LocalProgressBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalProgressBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
