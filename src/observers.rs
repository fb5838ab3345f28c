//! Subscriber lists for scan results, central state and cache updates.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

use crate::model::{Central, CentralState, Peripheral};

/// Callback handle for unregistering callbacks.
pub struct CallbackHandle {
    id: u64,
    unregister_fn: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl CallbackHandle {
    /// Create a new callback handle.
    pub(crate) fn new(id: u64, unregister_fn: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            unregister_fn: Some(Box::new(unregister_fn)),
        }
    }

    /// A handle for a registration that never happened.
    pub(crate) fn noop() -> Self {
        Self {
            id: u64::MAX,
            unregister_fn: None,
        }
    }

    /// Unregister this callback.
    pub fn unregister(mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }

    /// Keep the callback registered after this handle is dropped.
    pub fn detach(mut self) {
        self.unregister_fn = None;
    }

    /// Get the callback ID.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }
}

impl std::fmt::Debug for CallbackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackHandle")
            .field("id", &self.id)
            .field("registered", &self.unregister_fn.is_some())
            .finish()
    }
}

/// A peripheral reported while scanning.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    /// Central snapshot sent with the discovery, if any.
    pub central: Option<Central>,
    /// The discovered peripheral.
    pub peripheral: Option<Peripheral>,
}

/// Event categories observers can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserverCategory {
    /// Scan results.
    Discovery,
    /// Central state changes.
    CentralState,
    /// Any change to the peripheral cache.
    Updates,
}

struct Observers<F: ?Sized> {
    entries: RwLock<Vec<(u64, Arc<F>)>>,
}

impl<F: ?Sized> Default for Observers<F> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl<F: ?Sized> Observers<F> {
    fn push(&self, id: u64, callback: Arc<F>) {
        self.entries.write().push((id, callback));
    }

    fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    fn clear(&self) {
        self.entries.write().clear();
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Copy of the current list, so callbacks run without the lock held.
    fn snapshot(&self) -> Vec<Arc<F>> {
        self.entries
            .read()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect()
    }
}

/// Subscribers grouped by event category.
#[derive(Default)]
pub struct ObserverRegistry {
    discovery: Observers<dyn Fn(&ScanResult) + Send + Sync>,
    central_state: Observers<dyn Fn(CentralState) + Send + Sync>,
    updates: Observers<dyn Fn(&HashMap<String, Peripheral>) + Send + Sync>,
    callback_counter: AtomicU64,
}

impl ObserverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to scan results.
    pub fn on_discover<F>(self: &Arc<Self>, callback: F) -> CallbackHandle
    where
        F: Fn(&ScanResult) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.discovery.push(id, Arc::new(callback));
        self.handle(ObserverCategory::Discovery, id)
    }

    /// Subscribe to central state changes.
    pub fn on_central_state<F>(self: &Arc<Self>, callback: F) -> CallbackHandle
    where
        F: Fn(CentralState) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.central_state.push(id, Arc::new(callback));
        self.handle(ObserverCategory::CentralState, id)
    }

    /// Subscribe to peripheral cache changes.
    pub fn on_updates<F>(self: &Arc<Self>, callback: F) -> CallbackHandle
    where
        F: Fn(&HashMap<String, Peripheral>) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.updates.push(id, Arc::new(callback));
        self.handle(ObserverCategory::Updates, id)
    }

    /// Remove one subscriber.
    pub fn remove(&self, category: ObserverCategory, id: u64) -> bool {
        let removed = match category {
            ObserverCategory::Discovery => self.discovery.remove(id),
            ObserverCategory::CentralState => self.central_state.remove(id),
            ObserverCategory::Updates => self.updates.remove(id),
        };
        if removed {
            trace!("Removed {:?} observer {}", category, id);
        }
        removed
    }

    /// Remove every subscriber of a category.
    pub fn clear(&self, category: ObserverCategory) {
        match category {
            ObserverCategory::Discovery => self.discovery.clear(),
            ObserverCategory::CentralState => self.central_state.clear(),
            ObserverCategory::Updates => self.updates.clear(),
        }
    }

    /// Number of subscribers in a category.
    pub fn count(&self, category: ObserverCategory) -> usize {
        match category {
            ObserverCategory::Discovery => self.discovery.len(),
            ObserverCategory::CentralState => self.central_state.len(),
            ObserverCategory::Updates => self.updates.len(),
        }
    }

    /// Deliver a scan result to every discovery subscriber.
    pub fn notify_discovery(&self, result: &ScanResult) {
        for callback in self.discovery.snapshot() {
            callback(result);
        }
    }

    /// Deliver a central state to every state subscriber.
    pub fn notify_central_state(&self, state: CentralState) {
        for callback in self.central_state.snapshot() {
            callback(state);
        }
    }

    /// Deliver the peripheral cache to every update subscriber.
    pub fn notify_updates(&self, peripherals: &HashMap<String, Peripheral>) {
        for callback in self.updates.snapshot() {
            callback(peripherals);
        }
    }

    fn next_id(&self) -> u64 {
        self.callback_counter.fetch_add(1, Ordering::SeqCst)
    }

    fn handle(self: &Arc<Self>, category: ObserverCategory, id: u64) -> CallbackHandle {
        let registry: Weak<Self> = Arc::downgrade(self);
        CallbackHandle::new(id, move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove(category, id);
            }
        })
    }
}
