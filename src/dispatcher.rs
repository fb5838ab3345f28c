//! Routing of native events into the session state.
//!
//! Every event from the native stack passes through [`Session::dispatch`],
//! one at a time. Routing order:
//!
//! 1. A peripheral carried by the event is merged into the entity store,
//!    together with any advertisement data and RSSI sent alongside it.
//! 2. A peripheral list carried by the event is merged entry by entry.
//! 3. Completions record any characteristic or descriptor they carry into
//!    the cached tree, notify cache observers (on success) and then settle
//!    the transaction registered under their key.
//! 4. Everything else is routed by event kind. Pushed characteristic
//!    values are recorded the same way and reported to cache observers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::bridge::{EventData, NativeEvent, NativeEventKind};
use crate::config::BluetoothConfig;
use crate::error::{Error, Result};
use crate::identifier::{peripheral_id_from_id, TransactionTag};
use crate::model::{Central, Peripheral};
use crate::observers::{ObserverRegistry, ScanResult};
use crate::store::EntityStore;
use crate::transaction::{Resolution, TransactionRegistry};

/// Receiving half of the native event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<NativeEvent>;
/// Sending half of the native event channel, handed to bridges.
pub type EventSender = mpsc::UnboundedSender<NativeEvent>;

/// Create the channel that carries native events to the dispatcher.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// State shared by one Bluetooth session.
pub struct Session {
    /// Behaviour switches.
    pub(crate) config: BluetoothConfig,
    /// Pending transactions.
    pub(crate) transactions: TransactionRegistry,
    /// Cached peripherals.
    pub(crate) store: EntityStore,
    /// Subscribers.
    pub(crate) observers: Arc<ObserverRegistry>,
    /// Completions that arrived with no registered continuation.
    unmatched: AtomicU64,
}

impl Session {
    /// Create an empty session.
    pub fn new(config: BluetoothConfig) -> Self {
        Self {
            config,
            transactions: TransactionRegistry::new(),
            store: EntityStore::new(),
            observers: Arc::new(ObserverRegistry::new()),
            unmatched: AtomicU64::new(0),
        }
    }

    /// Number of completions dropped because nothing was waiting for them.
    pub fn unmatched_transactions(&self) -> u64 {
        self.unmatched.load(Ordering::SeqCst)
    }

    /// Route one native event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnhandledEvent`] for events this crate does not
    /// recognize. Unmatched completions are not errors.
    pub fn dispatch(&self, event: NativeEvent) -> Result<()> {
        let NativeEvent { kind, mut data } = event;

        if let Some(peripheral) = data.peripheral.take() {
            data.peripheral = Some(self.cache_peripheral(peripheral, &data));
        }

        if let Some(peripherals) = &data.peripherals {
            for peripheral in peripherals {
                self.store.upsert_peripheral(peripheral.clone());
            }
        }

        match kind {
            NativeEventKind::Completion { transaction, error } => {
                let resolution = match error {
                    None => {
                        let subscription = matches!(
                            transaction.tag(),
                            TransactionTag::Notify | TransactionTag::Indicate
                        );
                        let notifying = data
                            .characteristic
                            .as_ref()
                            .filter(|_| subscription)
                            .map(|c| c.is_notifying);
                        self.record_attributes(&mut data, notifying);

                        self.observers.notify_updates(&self.store.get_all());
                        self.transactions.resolve(&transaction, data)
                    }
                    Some(error) => {
                        debug!("Transaction {} failed: {}", transaction, error);
                        self.transactions.reject(&transaction, error)
                    }
                };

                if resolution == Resolution::Unmatched {
                    self.unmatched.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            }
            NativeEventKind::PeripheralDiscovered => {
                trace!(
                    "Discovered peripheral {:?}",
                    data.peripheral.as_ref().map(|p| &p.id)
                );
                self.observers.notify_discovery(&ScanResult {
                    central: data.central,
                    peripheral: data.peripheral,
                });
                Ok(())
            }
            NativeEventKind::ValueChanged => {
                if data.characteristic.is_none() {
                    warn!("Value change without a characteristic; ignoring");
                    return Ok(());
                }
                self.record_attributes(&mut data, Some(true));
                self.observers.notify_updates(&self.store.get_all());
                Ok(())
            }
            NativeEventKind::CentralStateChanged(central) => {
                self.central_state_changed(central);
                Ok(())
            }
            NativeEventKind::PeripheralsRetrieved
            | NativeEventKind::ConnectedPeripheralsRetrieved => Ok(()),
            NativeEventKind::Unrecognized(event) => Err(Error::UnhandledEvent { event }),
        }
    }

    /// Drive [`Session::dispatch`] from a channel until every sender is gone.
    ///
    /// Unrecognized events mean the native layer speaks a different
    /// protocol; they are logged and abort the loop in debug builds.
    pub fn spawn_event_loop(self: &Arc<Self>, mut events: EventReceiver) -> JoinHandle<()> {
        let session = self.clone();

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Err(e) = session.dispatch(event) {
                    error!("Failed to dispatch native event: {}", e);
                    if cfg!(debug_assertions) {
                        panic!("native event protocol mismatch: {}", e);
                    }
                }
            }

            debug!("Native event loop ended");
        })
    }

    fn cache_peripheral(&self, mut peripheral: Peripheral, data: &EventData) -> Peripheral {
        if let Some(advertisement_data) = &data.advertisement_data {
            self.store
                .upsert_advertisement(&peripheral.id, advertisement_data.clone());
            peripheral.advertisement_data = Some(advertisement_data.clone());
        }
        if let Some(rssi) = data.rssi {
            peripheral.rssi = Some(rssi);
        }
        self.store.upsert_peripheral(peripheral)
    }

    /// Write a reported characteristic or descriptor into the cached tree
    /// of its peripheral. `notifying`, when given, replaces the cached
    /// subscription flag of the characteristic.
    fn record_attributes(&self, data: &mut EventData, notifying: Option<bool>) {
        let mut recorded = None;

        if let Some(characteristic) = &data.characteristic {
            let owner = peripheral_id_from_id(&characteristic.id);
            if !owner.is_empty() {
                trace!("Recording characteristic {}", characteristic.id);
                recorded = Some(self.store.modify_peripheral(owner, |peripheral| {
                    let cached = peripheral.record_characteristic(characteristic);
                    if let Some(notifying) = notifying {
                        cached.is_notifying = notifying;
                    }
                }));
            }
        }

        if let Some(descriptor) = &data.descriptor {
            let owner = peripheral_id_from_id(&descriptor.id);
            if !owner.is_empty() {
                trace!("Recording descriptor {}", descriptor.id);
                recorded = Some(
                    self.store
                        .modify_peripheral(owner, |peripheral| peripheral.record_descriptor(descriptor)),
                );
            }
        }

        if let (Some(snapshot), Some(recorded)) = (&mut data.peripheral, recorded) {
            if snapshot.id == recorded.id {
                *snapshot = recorded;
            }
        }
    }

    fn central_state_changed(&self, central: Central) {
        info!("Central state changed to {}", central.state);

        if self.config.invalidate_on_untrusted_state && !central.state.keeps_peripherals_valid() {
            warn!(
                "Central is {}; cached peripherals are no longer valid",
                central.state
            );
            self.store.invalidate_all();
            self.observers.notify_updates(&self.store.get_all());
        }

        self.observers.notify_central_state(central.state);
    }
}
