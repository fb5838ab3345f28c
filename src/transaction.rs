//! Pending transaction bookkeeping.
//!
//! Every command that expects a native acknowledgment registers a
//! continuation under its [`TransactionKey`] before the command is issued.
//! The dispatcher later settles the continuation when a completion event
//! carrying the same key arrives.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::bridge::EventData;
use crate::error::{Error, NativeError, Result};
use crate::identifier::TransactionKey;

/// Outcome delivered to a waiting continuation.
pub type Settlement = std::result::Result<EventData, NativeError>;

type Responder = oneshot::Sender<Settlement>;

/// Identifier of one continuation inside a shared transaction.
pub type CallbackId = u64;

/// A registry slot.
enum PendingTransaction {
    /// One waiter, settled once.
    Single(Responder),
    /// Several waiters sharing one key, all settled by the same event.
    Multi(Vec<(CallbackId, Responder)>),
}

/// Result of settling a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The key was registered; this many continuations were settled.
    Settled(usize),
    /// No continuation was registered under the key.
    Unmatched,
}

/// Maps transaction keys to pending continuations.
#[derive(Default)]
pub struct TransactionRegistry {
    pending: Mutex<HashMap<TransactionKey, PendingTransaction>>,
    callback_counter: AtomicU64,
}

impl TransactionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single-shot continuation.
    ///
    /// Any continuation already registered under `key` is dropped, which
    /// its waiter observes as [`Error::TransactionDropped`].
    pub fn register(&self, key: TransactionKey) -> oneshot::Receiver<Settlement> {
        let (tx, rx) = oneshot::channel();
        if self
            .pending
            .lock()
            .insert(key.clone(), PendingTransaction::Single(tx))
            .is_some()
        {
            debug!("Replaced pending transaction {}", key);
        }
        trace!("Registered transaction {}", key);
        rx
    }

    /// Register a continuation that shares `key` with other waiters.
    pub fn register_shared(&self, key: TransactionKey) -> (CallbackId, oneshot::Receiver<Settlement>) {
        let (tx, rx) = oneshot::channel();
        let id = self.callback_counter.fetch_add(1, Ordering::SeqCst);

        let mut pending = self.pending.lock();
        match pending.get_mut(&key) {
            Some(PendingTransaction::Multi(callbacks)) => callbacks.push((id, tx)),
            _ => {
                pending.insert(key.clone(), PendingTransaction::Multi(vec![(id, tx)]));
            }
        }
        trace!("Registered shared transaction {} (callback {})", key, id);

        (id, rx)
    }

    /// Settle `key` successfully.
    pub fn resolve(&self, key: &TransactionKey, data: EventData) -> Resolution {
        self.settle(key, Ok(data))
    }

    /// Settle `key` with a native failure.
    pub fn reject(&self, key: &TransactionKey, error: NativeError) -> Resolution {
        self.settle(key, Err(error))
    }

    /// Settle every continuation registered under `key`.
    ///
    /// Unknown keys are logged and dropped: cleanup can race with
    /// in-flight native events.
    pub fn settle(&self, key: &TransactionKey, outcome: Settlement) -> Resolution {
        let entry = self.pending.lock().remove(key);

        match entry {
            None => {
                warn!(
                    "Unhandled transaction {} ({} pending)",
                    key,
                    self.pending.lock().len()
                );
                Resolution::Unmatched
            }
            Some(PendingTransaction::Single(responder)) => {
                if responder.send(outcome).is_err() {
                    debug!("Waiter for {} went away before settlement", key);
                }
                Resolution::Settled(1)
            }
            Some(PendingTransaction::Multi(mut callbacks)) => {
                let count = callbacks.len();
                while let Some((id, responder)) = callbacks.pop() {
                    if responder.send(outcome.clone()).is_err() {
                        debug!("Callback {} for {} went away before settlement", id, key);
                    }
                }
                Resolution::Settled(count)
            }
        }
    }

    /// Remove `key` without settling it.
    ///
    /// Returns `true` if something was registered.
    pub fn discard(&self, key: &TransactionKey) -> bool {
        self.pending.lock().remove(key).is_some()
    }

    /// Remove one continuation from a shared transaction.
    ///
    /// The entry is deleted together with its last continuation.
    pub fn remove_callback(&self, key: &TransactionKey, id: CallbackId) -> bool {
        let mut pending = self.pending.lock();
        let Some(PendingTransaction::Multi(callbacks)) = pending.get_mut(key) else {
            return false;
        };

        let before = callbacks.len();
        callbacks.retain(|(callback_id, _)| *callback_id != id);
        let removed = callbacks.len() != before;

        if callbacks.is_empty() {
            pending.remove(key);
        }
        removed
    }

    /// Check if `key` is pending.
    pub fn contains(&self, key: &TransactionKey) -> bool {
        self.pending.lock().contains_key(key)
    }

    /// Number of continuations registered under `key`.
    pub fn waiters(&self, key: &TransactionKey) -> usize {
        match self.pending.lock().get(key) {
            None => 0,
            Some(PendingTransaction::Single(_)) => 1,
            Some(PendingTransaction::Multi(callbacks)) => callbacks.len(),
        }
    }

    /// Number of pending keys.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Check if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

/// Wait for a registered continuation to settle.
pub(crate) async fn settled(
    key: &TransactionKey,
    receiver: oneshot::Receiver<Settlement>,
) -> Result<EventData> {
    match receiver.await {
        Ok(Ok(data)) => Ok(data),
        Ok(Err(error)) => Err(Error::Native(error)),
        Err(_) => Err(Error::TransactionDropped {
            key: key.to_string(),
        }),
    }
}
