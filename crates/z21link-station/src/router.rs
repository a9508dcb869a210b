use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::{error, trace, warn};
use z21link_frame::{Envelope, MessageKind};

use crate::error::{Result, RouteError, StationError};

/// What a subscriber returns; errors are logged by the router.
pub type CallbackResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A persistent subscriber, invoked on the read path for every matching envelope.
pub type Callback = Arc<dyn Fn(&Envelope) -> CallbackResult + Send + Sync>;

/// Outcome of routing one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub kind: MessageKind,
    /// Whether a waiter queue took the envelope.
    pub queued: bool,
    /// Subscribers invoked.
    pub subscribers: usize,
    /// Subscribers that returned an error or panicked.
    pub failed: usize,
}

struct Slot {
    tx: Sender<Envelope>,
    rx: Arc<tokio::sync::Mutex<Receiver<Envelope>>>,
}

/// Handle on the reply queue of one message kind.
///
/// Every handle for a kind shares one queue. Concurrent awaiters are served
/// in the order they started waiting; replies carry no correlation id, so
/// which reply each of them gets is not defined beyond that.
#[derive(Clone)]
pub struct Waiter {
    kind: MessageKind,
    rx: Arc<tokio::sync::Mutex<Receiver<Envelope>>>,
}

impl Waiter {
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Wait for the next envelope of this kind.
    pub async fn recv(&self, timeout: Duration) -> Result<Envelope> {
        let next = async {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        };
        match tokio::time::timeout(timeout, next).await {
            Ok(Some(envelope)) => Ok(envelope),
            Ok(None) => Err(StationError::NotConnected),
            Err(_) => Err(StationError::Timeout {
                kind: self.kind,
                after: timeout,
            }),
        }
    }
}

impl std::fmt::Debug for Waiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter").field("kind", &self.kind).finish()
    }
}

/// Kind-keyed dispatch table for inbound envelopes.
pub struct Router {
    capacity: usize,
    waiters: Mutex<HashMap<MessageKind, Slot>>,
    subscribers: Mutex<HashMap<MessageKind, Vec<Callback>>>,
}

impl Router {
    /// Create a router whose waiter queues hold `capacity` envelopes each.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            waiters: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create the waiter queue for `kind`.
    pub fn register_waiter(&self, kind: MessageKind) -> Waiter {
        let mut waiters = self.waiters.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = waiters.entry(kind).or_insert_with(|| {
            let (tx, rx) = mpsc::channel(self.capacity);
            Slot {
                tx,
                rx: Arc::new(tokio::sync::Mutex::new(rx)),
            }
        });
        Waiter {
            kind,
            rx: Arc::clone(&slot.rx),
        }
    }

    /// Append a subscriber for `kind`. Subscriptions last as long as the router.
    pub fn register_subscriber<F>(&self, kind: MessageKind, callback: F)
    where
        F: Fn(&Envelope) -> CallbackResult + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(callback);
    }

    pub fn subscriber_count(&self, kind: MessageKind) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Deliver `envelope` to the waiter queue and the subscribers of its kind.
    ///
    /// Subscribers run even when the waiter queue is full; the overflow is
    /// reported afterwards as [`RouteError::QueueFull`].
    pub fn route(&self, envelope: &Envelope) -> std::result::Result<Delivery, RouteError> {
        let kind = envelope.route_kind()?;

        let tx = self
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map(|slot| slot.tx.clone());

        let mut overflow = false;
        let queued = match tx.map(|tx| tx.try_send(envelope.clone())) {
            Some(Ok(())) => true,
            Some(Err(TrySendError::Full(_))) => {
                overflow = true;
                false
            }
            Some(Err(TrySendError::Closed(_))) | None => false,
        };

        // Cloned out so callbacks may register further subscribers.
        let callbacks = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        let mut failed = 0;
        for callback in &callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(envelope))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    failed += 1;
                    warn!(%kind, error = %err, "subscriber returned an error");
                }
                Err(panic) => {
                    failed += 1;
                    error!(%kind, panic = panic_message(&*panic), "subscriber panicked");
                }
            }
        }

        trace!(%kind, queued, subscribers = callbacks.len(), failed, "envelope routed");

        if overflow {
            return Err(RouteError::QueueFull(kind));
        }
        Ok(Delivery {
            kind,
            queued,
            subscribers: callbacks.len(),
            failed,
        })
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(100)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic>"
    }
}
