//! Public command surface.
//!
//! [`Bluetooth`] validates arguments, registers a transaction, issues the
//! native command and waits for the dispatcher to settle the transaction.

use bytes::Bytes;
use futures::future::{try_join_all, BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bridge::{
    CharacteristicUpdate, ConnectOptions, DescriptorUpdate, DiscoverRequest, EventData,
    NativeBridge, NativeEvent, Operation, ScanOptions,
};
use crate::config::BluetoothConfig;
use crate::dispatcher::{EventReceiver, Session};
use crate::error::{Error, Result};
use crate::identifier::{peripheral_id_from_id, NodeKind, NodePath, TransactionKey, TransactionTag};
use crate::model::{
    AdvertisementData, Central, CentralState, Characteristic, Peripheral, Service,
};
use crate::observers::{CallbackHandle, ObserverCategory, ScanResult};
use crate::transaction::{settled, Settlement};
use crate::utils::dedup_uuids;

/// A Bluetooth Low Energy central session backed by a native bridge.
///
/// Cloning is cheap; clones share the same session state.
#[derive(Clone)]
pub struct Bluetooth {
    /// Outbound native commands.
    bridge: Arc<dyn NativeBridge>,
    /// Transactions, cache and observers.
    session: Arc<Session>,
}

impl Bluetooth {
    /// Create a session with the default configuration.
    pub fn new(bridge: Arc<dyn NativeBridge>) -> Self {
        Self::with_config(bridge, BluetoothConfig::default())
    }

    /// Create a session with an explicit configuration.
    pub fn with_config(bridge: Arc<dyn NativeBridge>, config: BluetoothConfig) -> Self {
        Self {
            bridge,
            session: Arc::new(Session::new(config)),
        }
    }

    /// The session configuration.
    pub fn config(&self) -> &BluetoothConfig {
        &self.session.config
    }

    // === Events ===

    /// Feed one native event to the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnhandledEvent`] for unrecognized events.
    pub fn handle_event(&self, event: NativeEvent) -> Result<()> {
        self.session.dispatch(event)
    }

    /// Dispatch every event received on `events` in a background task.
    pub fn spawn_event_loop(&self, events: EventReceiver) -> JoinHandle<()> {
        self.session.spawn_event_loop(events)
    }

    /// Number of completions that arrived with nothing waiting for them.
    pub fn unmatched_transactions(&self) -> u64 {
        self.session.unmatched_transactions()
    }

    /// Number of transactions still waiting for a native event.
    pub fn pending_transactions(&self) -> usize {
        self.session.transactions.len()
    }

    // === Scanning ===

    /// Start scanning for peripherals advertising any of `service_uuids`.
    ///
    /// An empty filter scans for every peripheral. Duplicate UUIDs are
    /// removed before the filter reaches the native layer.
    pub async fn start_scan<S: AsRef<str>>(
        &self,
        service_uuids: &[S],
        options: ScanOptions,
    ) -> Result<()> {
        self.require(Operation::StartScan)?;

        let service_uuids = dedup_uuids(service_uuids);
        info!("Starting scan for {} service filters", service_uuids.len());

        self.bridge.start_scan(service_uuids, options).await
    }

    /// Start scanning and deliver every scan result to `on_discover`.
    ///
    /// The callback stays registered until [`Bluetooth::stop_scan`] is
    /// called or the returned handle is unregistered or dropped.
    pub async fn start_scan_with_callback<S, F>(
        &self,
        service_uuids: &[S],
        options: ScanOptions,
        on_discover: F,
    ) -> Result<CallbackHandle>
    where
        S: AsRef<str>,
        F: Fn(&ScanResult) + Send + Sync + 'static,
    {
        self.start_scan(service_uuids, options).await?;
        Ok(self.session.observers.on_discover(on_discover))
    }

    /// Stop scanning and drop every scan result callback.
    pub async fn stop_scan(&self) -> Result<()> {
        self.require(Operation::StopScan)?;

        info!("Stopping scan");
        self.session.observers.clear(ObserverCategory::Discovery);
        self.bridge.stop_scan().await
    }

    // === Central ===

    /// Query the central from the native layer.
    pub async fn get_central(&self) -> Result<Central> {
        self.require(Operation::GetCentral)?;
        self.bridge.get_central().await
    }

    /// Check if the central is scanning.
    pub async fn is_scanning(&self) -> Result<bool> {
        Ok(self.get_central().await?.is_scanning)
    }

    /// Call `callback` with the current central state, then with every change.
    pub async fn observe_state<F>(&self, callback: F) -> Result<CallbackHandle>
    where
        F: Fn(CentralState) + Send + Sync + 'static,
    {
        let central = self.get_central().await?;
        callback(central.state);
        Ok(self.session.observers.on_central_state(callback))
    }

    /// Call `callback` with the whole peripheral cache whenever it changes.
    pub fn observe_updates<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(&HashMap<String, Peripheral>) + Send + Sync + 'static,
    {
        self.session.observers.on_updates(callback)
    }

    // === Cache ===

    /// Every cached peripheral, keyed by identifier.
    pub fn peripherals(&self) -> HashMap<String, Peripheral> {
        self.session.store.get_all()
    }

    /// Cached peripheral owning `id` (any depth).
    pub fn peripheral(&self, id: &str) -> Option<Peripheral> {
        self.session.store.get(id)
    }

    /// Latest advertisement recorded for a peripheral.
    pub fn advertisement_data(&self, peripheral_id: &str) -> Option<AdvertisementData> {
        self.session.store.advertisement(peripheral_id)
    }

    /// Ask the native layer for every peripheral it knows about.
    ///
    /// The result is merged into the cache.
    pub async fn fetch_peripherals(&self) -> Result<Vec<Peripheral>> {
        self.require(Operation::GetPeripherals)?;

        let peripherals = self.bridge.get_peripherals().await?;
        Ok(peripherals
            .into_iter()
            .map(|p| self.session.store.upsert_peripheral(p))
            .collect())
    }

    // === Connection ===

    /// Connect to a peripheral.
    ///
    /// Without an explicit `timeout` the configured default applies.
    pub async fn connect(&self, peripheral_uuid: &str, timeout: Option<Duration>) -> Result<Peripheral> {
        self.connect_with_options(peripheral_uuid, ConnectOptions::default(), timeout)
            .await
    }

    /// Connect to a peripheral with native connection options.
    ///
    /// If `timeout` elapses first, the pending connect is discarded, a
    /// disconnect is issued for the same peripheral and
    /// [`Error::Timeout`] is returned. A late native completion is then
    /// ignored. The disconnect is given the same time to complete before
    /// its transaction is dropped as well.
    pub async fn connect_with_options(
        &self,
        peripheral_uuid: &str,
        options: ConnectOptions,
        timeout: Option<Duration>,
    ) -> Result<Peripheral> {
        self.require(Operation::Connect)?;
        let path = NodePath::peripheral(peripheral_uuid)?;
        let key = TransactionKey::new(TransactionTag::Connect, path);

        let receiver = self.session.transactions.register(key.clone());
        if let Err(e) = self.bridge.connect(peripheral_uuid, &options) {
            self.session.transactions.discard(&key);
            return Err(e);
        }
        debug!("Connecting to {}", peripheral_uuid);

        let data = match timeout.or(self.session.config.default_connect_timeout) {
            None => settled(&key, receiver).await?,
            Some(limit) => match tokio::time::timeout(limit, settled(&key, receiver)).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!("Connection to {} timed out after {:?}", peripheral_uuid, limit);
                    self.session.transactions.discard(&key);
                    match self.begin_disconnect(peripheral_uuid) {
                        Ok((cancel, receiver)) => self.retire_after(cancel, receiver, limit),
                        Err(e) => {
                            warn!("Failed to cancel connection to {}: {}", peripheral_uuid, e)
                        }
                    }
                    return Err(Error::Timeout {
                        operation: "connect",
                        timeout: limit,
                    });
                }
            },
        };

        info!("Connected to {}", peripheral_uuid);
        self.peripheral_from(data, peripheral_uuid)
    }

    /// Disconnect from a peripheral.
    pub async fn disconnect(&self, peripheral_uuid: &str) -> Result<()> {
        let (key, receiver) = self.begin_disconnect(peripheral_uuid)?;
        settled(&key, receiver).await?;
        info!("Disconnected from {}", peripheral_uuid);
        Ok(())
    }

    /// Issue a disconnect without waiting for it to finish.
    fn begin_disconnect(
        &self,
        peripheral_uuid: &str,
    ) -> Result<(TransactionKey, oneshot::Receiver<Settlement>)> {
        self.require(Operation::Disconnect)?;
        let path = NodePath::peripheral(peripheral_uuid)?;
        let key = TransactionKey::new(TransactionTag::Disconnect, path);

        let receiver = self.session.transactions.register(key.clone());
        if let Err(e) = self.bridge.disconnect(peripheral_uuid) {
            self.session.transactions.discard(&key);
            return Err(e);
        }
        Ok((key, receiver))
    }

    /// Forget `key` unless its completion arrives within `limit`.
    fn retire_after(
        &self,
        key: TransactionKey,
        receiver: oneshot::Receiver<Settlement>,
        limit: Duration,
    ) {
        let session = self.session.clone();

        tokio::spawn(async move {
            if tokio::time::timeout(limit, receiver).await.is_err() {
                debug!("No answer to {} within {:?}; discarding", key, limit);
                session.transactions.discard(&key);
            }
        });
    }

    /// Read the signal strength of a connected peripheral.
    pub async fn read_rssi(&self, peripheral_uuid: &str) -> Result<i16> {
        self.require(Operation::ReadRssi)?;
        let path = NodePath::peripheral(peripheral_uuid)?;
        let key = TransactionKey::new(TransactionTag::Rssi, path);

        let data = self
            .transact(key, || self.bridge.read_rssi(peripheral_uuid))
            .await?;

        data.rssi
            .or_else(|| data.peripheral.and_then(|p| p.rssi))
            .ok_or_else(|| Error::MissingPayload {
                entity: "rssi",
                id: peripheral_uuid.to_string(),
            })
    }

    // === Characteristics and descriptors ===

    /// Read a characteristic value.
    pub async fn read_characteristic(
        &self,
        peripheral_uuid: &str,
        service_uuid: &str,
        characteristic_uuid: &str,
    ) -> Result<Option<Bytes>> {
        let data = self
            .update_characteristic(
                peripheral_uuid,
                service_uuid,
                characteristic_uuid,
                TransactionTag::Read,
                None,
                None,
            )
            .await?;

        match data.characteristic {
            Some(characteristic) => Ok(characteristic.value),
            None => Err(Error::MissingPayload {
                entity: "characteristic",
                id: format!("{}|{}|{}", peripheral_uuid, service_uuid, characteristic_uuid),
            }),
        }
    }

    /// Write a characteristic value and wait for the acknowledgment.
    pub async fn write_characteristic(
        &self,
        peripheral_uuid: &str,
        service_uuid: &str,
        characteristic_uuid: &str,
        data: impl Into<Bytes>,
    ) -> Result<Option<Characteristic>> {
        let data = self
            .update_characteristic(
                peripheral_uuid,
                service_uuid,
                characteristic_uuid,
                TransactionTag::Write,
                Some(data.into()),
                None,
            )
            .await?;
        Ok(data.characteristic)
    }

    /// Write a characteristic value without asking for an acknowledgment.
    ///
    /// Returns as soon as the native command has been issued.
    pub async fn write_characteristic_without_response(
        &self,
        peripheral_uuid: &str,
        service_uuid: &str,
        characteristic_uuid: &str,
        data: impl Into<Bytes>,
    ) -> Result<()> {
        self.update_characteristic(
            peripheral_uuid,
            service_uuid,
            characteristic_uuid,
            TransactionTag::WriteWithoutResponse,
            Some(data.into()),
            None,
        )
        .await?;
        Ok(())
    }

    /// Enable or disable notifications for a characteristic.
    pub async fn set_notify(
        &self,
        peripheral_uuid: &str,
        service_uuid: &str,
        characteristic_uuid: &str,
        enabled: bool,
    ) -> Result<Option<Characteristic>> {
        let data = self
            .update_characteristic(
                peripheral_uuid,
                service_uuid,
                characteristic_uuid,
                TransactionTag::Notify,
                None,
                Some(enabled),
            )
            .await?;
        Ok(data.characteristic)
    }

    async fn update_characteristic(
        &self,
        peripheral_uuid: &str,
        service_uuid: &str,
        characteristic_uuid: &str,
        property: TransactionTag,
        data: Option<Bytes>,
        is_enabled: Option<bool>,
    ) -> Result<EventData> {
        self.require(Operation::UpdateCharacteristic)?;
        let path = NodePath::characteristic(peripheral_uuid, service_uuid, characteristic_uuid)?;

        let request = CharacteristicUpdate {
            peripheral_uuid: peripheral_uuid.to_string(),
            service_uuid: service_uuid.to_string(),
            characteristic_uuid: characteristic_uuid.to_string(),
            property,
            data,
            is_enabled,
        };

        if !property.expects_response() {
            self.bridge.update_characteristic(request)?;
            return Ok(EventData::default());
        }

        let key = TransactionKey::new(property, path);
        self.transact(key, || self.bridge.update_characteristic(request))
            .await
    }

    /// Read a descriptor value.
    pub async fn read_descriptor(
        &self,
        peripheral_uuid: &str,
        service_uuid: &str,
        characteristic_uuid: &str,
        descriptor_uuid: &str,
    ) -> Result<Option<Bytes>> {
        let data = self
            .update_descriptor(
                peripheral_uuid,
                service_uuid,
                characteristic_uuid,
                descriptor_uuid,
                TransactionTag::Read,
                None,
            )
            .await?;

        match data.descriptor {
            Some(descriptor) => Ok(descriptor.value),
            None => Err(Error::MissingPayload {
                entity: "descriptor",
                id: format!(
                    "{}|{}|{}|{}",
                    peripheral_uuid, service_uuid, characteristic_uuid, descriptor_uuid
                ),
            }),
        }
    }

    /// Write a descriptor value.
    pub async fn write_descriptor(
        &self,
        peripheral_uuid: &str,
        service_uuid: &str,
        characteristic_uuid: &str,
        descriptor_uuid: &str,
        data: impl Into<Bytes>,
    ) -> Result<()> {
        self.update_descriptor(
            peripheral_uuid,
            service_uuid,
            characteristic_uuid,
            descriptor_uuid,
            TransactionTag::Write,
            Some(data.into()),
        )
        .await?;
        Ok(())
    }

    async fn update_descriptor(
        &self,
        peripheral_uuid: &str,
        service_uuid: &str,
        characteristic_uuid: &str,
        descriptor_uuid: &str,
        property: TransactionTag,
        data: Option<Bytes>,
    ) -> Result<EventData> {
        self.require(Operation::UpdateDescriptor)?;
        let path = NodePath::descriptor(
            peripheral_uuid,
            service_uuid,
            characteristic_uuid,
            descriptor_uuid,
        )?;

        let request = DescriptorUpdate {
            peripheral_uuid: peripheral_uuid.to_string(),
            service_uuid: service_uuid.to_string(),
            characteristic_uuid: characteristic_uuid.to_string(),
            descriptor_uuid: descriptor_uuid.to_string(),
            property,
            data,
        };

        let key = TransactionKey::new(property, path);
        self.transact(key, || self.bridge.update_descriptor(request))
            .await
    }

    // === Discovery ===

    /// Discover the services of a peripheral.
    ///
    /// An empty `service_uuids` discovers every service.
    pub async fn discover_services<S: AsRef<str>>(
        &self,
        id: &str,
        service_uuids: &[S],
    ) -> Result<Peripheral> {
        self.require(Operation::Discover)?;
        let path = expect_kind(id, NodeKind::Peripheral)?;
        let data = self.discover(&path, dedup_uuids(service_uuids)).await?;
        self.peripheral_from(data, path.peripheral_uuid())
    }

    /// Discover the characteristics of a service.
    pub async fn discover_characteristics(&self, id: &str) -> Result<Service> {
        self.require(Operation::Discover)?;
        let path = expect_kind(id, NodeKind::Service)?;
        let data = self.discover(&path, Vec::new()).await?;

        data.service
            .or_else(|| {
                let peripheral = data.peripheral.or_else(|| self.peripheral(id))?;
                peripheral.service(path.service_uuid()?).cloned()
            })
            .ok_or_else(|| Error::MissingPayload {
                entity: "service",
                id: id.to_string(),
            })
    }

    /// Discover the descriptors of a characteristic.
    pub async fn discover_descriptors(&self, id: &str) -> Result<Characteristic> {
        self.require(Operation::Discover)?;
        let path = expect_kind(id, NodeKind::Characteristic)?;
        let data = self.discover(&path, Vec::new()).await?;

        data.characteristic
            .or_else(|| {
                let peripheral = data.peripheral.or_else(|| self.peripheral(id))?;
                peripheral.characteristic(&path).cloned()
            })
            .ok_or_else(|| Error::MissingPayload {
                entity: "characteristic",
                id: id.to_string(),
            })
    }

    /// Discover everything below `id`.
    ///
    /// A peripheral discovers its services, a service its characteristics
    /// and a characteristic its descriptors; every child found is then
    /// walked concurrently, and the call returns once the whole subtree
    /// has been discovered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoChildren`] for descriptor identifiers and
    /// [`Error::UnknownIdentifier`] for malformed ones.
    pub fn discover_children<'a>(&'a self, id: &str) -> BoxFuture<'a, Result<()>> {
        let id = id.to_string();

        async move {
            let path = NodePath::parse(&id)?;

            match path.kind() {
                NodeKind::Descriptor => Err(Error::NoChildren { id }),
                NodeKind::Characteristic => {
                    debug!("Loading characteristic {}", id);
                    self.discover_descriptors(&id).await?;
                    Ok(())
                }
                NodeKind::Service => {
                    debug!("Loading service {}", id);
                    let service = self.discover_characteristics(&id).await?;
                    let children = service
                        .characteristics
                        .iter()
                        .map(|c| path.child(&c.uuid).map(|child| child.to_string()))
                        .collect::<Result<Vec<_>>>()?;

                    try_join_all(children.iter().map(|child| self.discover_children(child)))
                        .await?;
                    Ok(())
                }
                NodeKind::Peripheral => {
                    debug!("Loading peripheral {}", id);
                    let no_filter: &[&str] = &[];
                    let peripheral = self.discover_services(&id, no_filter).await?;
                    let children = peripheral
                        .services
                        .iter()
                        .map(|s| path.child(&s.uuid).map(|child| child.to_string()))
                        .collect::<Result<Vec<_>>>()?;

                    try_join_all(children.iter().map(|child| self.discover_children(child)))
                        .await?;
                    Ok(())
                }
            }
        }
        .boxed()
    }

    /// Connect to a cached peripheral if needed and discover its whole tree.
    ///
    /// Returns the cached snapshot once discovery has finished.
    pub async fn load_peripheral(&self, id: &str) -> Result<Peripheral> {
        let peripheral_id = peripheral_id_from_id(id);
        let mut connected = false;

        loop {
            let peripheral = self.cached(peripheral_id)?;

            if peripheral.state.is_connected() {
                self.discover_children(peripheral_id).await?;
                break;
            }

            if connected {
                warn!(
                    "Peripheral {} is {} after connecting; skipping discovery",
                    peripheral_id, peripheral.state
                );
                break;
            }

            self.connect(peripheral_id, None).await?;
            connected = true;
        }

        self.cached(peripheral_id)
    }

    async fn discover(&self, path: &NodePath, service_uuids_to_query: Vec<String>) -> Result<EventData> {
        self.require(Operation::Discover)?;

        let request = DiscoverRequest {
            peripheral_uuid: path.peripheral_uuid().to_string(),
            service_uuid: path.service_uuid().map(str::to_string),
            characteristic_uuid: path.characteristic_uuid().map(str::to_string),
            service_uuids_to_query,
        };

        let key = TransactionKey::new(TransactionTag::Discover, path.clone());
        let (callback, receiver) = self.session.transactions.register_shared(key.clone());
        if let Err(e) = self.bridge.discover(request) {
            self.session.transactions.remove_callback(&key, callback);
            return Err(e);
        }

        settled(&key, receiver).await
    }

    // === Helpers ===

    fn require(&self, operation: Operation) -> Result<()> {
        if self.bridge.supports(operation) {
            Ok(())
        } else {
            Err(Error::Unavailable { operation })
        }
    }

    /// Register a single-shot transaction, issue the command, wait.
    async fn transact<F>(&self, key: TransactionKey, issue: F) -> Result<EventData>
    where
        F: FnOnce() -> Result<()>,
    {
        let receiver = self.session.transactions.register(key.clone());
        if let Err(e) = issue() {
            self.session.transactions.discard(&key);
            return Err(e);
        }
        settled(&key, receiver).await
    }

    fn cached(&self, peripheral_id: &str) -> Result<Peripheral> {
        self.session
            .store
            .get(peripheral_id)
            .ok_or_else(|| Error::PeripheralNotFound {
                id: peripheral_id.to_string(),
            })
    }

    fn peripheral_from(&self, data: EventData, peripheral_uuid: &str) -> Result<Peripheral> {
        data.peripheral
            .or_else(|| self.session.store.get(peripheral_uuid))
            .ok_or_else(|| Error::MissingPayload {
                entity: "peripheral",
                id: peripheral_uuid.to_string(),
            })
    }
}

fn expect_kind(id: &str, kind: NodeKind) -> Result<NodePath> {
    let path = NodePath::parse(id)?;
    if path.kind() != kind {
        return Err(Error::InvalidParameter {
            name: format!("{} id", kind),
            value: id.to_string(),
        });
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MockNativeBridge;
    use crate::error::NativeError;
    use crate::model::PeripheralState;
    use crate::testing::{wait_for, Command, Harness};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    fn key(tag: TransactionTag, id: &str) -> TransactionKey {
        TransactionKey::new(tag, NodePath::parse(id).unwrap())
    }

    fn connect_responder(command: &Command) -> Vec<NativeEvent> {
        match command {
            Command::Connect(uuid) => vec![NativeEvent::completed(
                key(TransactionTag::Connect, uuid),
                EventData::with_peripheral(
                    Peripheral::new(uuid).with_state(PeripheralState::Connected),
                ),
            )],
            _ => Vec::new(),
        }
    }

    /// Serves a peripheral with services S1 and S2, each holding one
    /// characteristic C1 without descriptors.
    fn tree_responder(
        tree: Arc<Mutex<Peripheral>>,
    ) -> impl Fn(&Command) -> Vec<NativeEvent> + Send + Sync + 'static {
        move |command| {
            let mut peripheral = tree.lock();
            match command {
                Command::Connect(uuid) => {
                    peripheral.state = PeripheralState::Connected;
                    vec![NativeEvent::completed(
                        key(TransactionTag::Connect, uuid),
                        EventData::with_peripheral(peripheral.clone()),
                    )]
                }
                Command::Discover(request) => {
                    let (id, data) = match (&request.service_uuid, &request.characteristic_uuid) {
                        (None, _) => {
                            peripheral.services =
                                vec![Service::new("P1", "S1"), Service::new("P1", "S2")];
                            ("P1".to_string(), EventData::with_peripheral(peripheral.clone()))
                        }
                        (Some(s), None) => {
                            let service = peripheral
                                .services
                                .iter_mut()
                                .find(|service| service.uuid == *s)
                                .unwrap();
                            service.characteristics = vec![Characteristic::new("P1", s, "C1")];
                            let service = service.clone();
                            let data = EventData {
                                peripheral: Some(peripheral.clone()),
                                service: Some(service),
                                ..Default::default()
                            };
                            (format!("P1|{}", s), data)
                        }
                        (Some(s), Some(c)) => {
                            let characteristic = peripheral
                                .service(s)
                                .and_then(|service| service.characteristic(c))
                                .cloned();
                            let data = EventData {
                                peripheral: Some(peripheral.clone()),
                                characteristic,
                                ..Default::default()
                            };
                            (format!("P1|{}|{}", s, c), data)
                        }
                    };
                    vec![NativeEvent::completed(key(TransactionTag::Discover, &id), data)]
                }
                _ => Vec::new(),
            }
        }
    }

    #[tokio::test]
    async fn test_scan_then_connect() {
        let harness = Harness::new();
        harness.bridge.respond(connect_responder);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = harness
            .bluetooth
            .start_scan_with_callback(&["180D", "180D"], ScanOptions::default(), move |result| {
                let _ = tx.send(result.clone());
            })
            .await
            .unwrap();
        assert_eq!(
            harness.bridge.commands(),
            vec![Command::StartScan(vec!["180D".to_string()])]
        );

        harness.send(NativeEvent::discovered(Peripheral::new("P1"), None, Some(-50), None));
        let result = rx.recv().await.unwrap();
        assert_eq!(result.peripheral.unwrap().rssi, Some(-50));

        let peripheral = harness.bluetooth.connect("P1", None).await.unwrap();
        assert_eq!(peripheral.state, PeripheralState::Connected);
        assert!(peripheral.discovery_timestamp.is_some());
        assert_eq!(peripheral.rssi, Some(-50));
        assert_eq!(harness.bluetooth.pending_transactions(), 0);
    }

    #[tokio::test]
    async fn test_load_peripheral_discovers_whole_tree() {
        let harness = Harness::new();
        let tree = Arc::new(Mutex::new(Peripheral::new("P1")));
        harness.bridge.respond(tree_responder(tree));

        harness.send(NativeEvent::discovered(Peripheral::new("P1"), None, None, None));
        wait_for(|| harness.bluetooth.peripheral("P1").is_some()).await;

        let peripheral = harness.bluetooth.load_peripheral("P1").await.unwrap();

        let commands = harness.bridge.commands();
        let discovers = commands
            .iter()
            .filter(|c| matches!(c, Command::Discover(_)))
            .count();
        let connects = commands
            .iter()
            .filter(|c| matches!(c, Command::Connect(_)))
            .count();
        assert_eq!(discovers, 5);
        assert_eq!(connects, 1);

        assert_eq!(peripheral.state, PeripheralState::Connected);
        assert_eq!(peripheral.services.len(), 2);
        assert_eq!(peripheral.characteristic_count(), 2);
        assert_eq!(harness.bluetooth.pending_transactions(), 0);
    }

    #[tokio::test]
    async fn test_load_unknown_peripheral() {
        let harness = Harness::new();
        let result = harness.bluetooth.load_peripheral("P9|S1").await;
        assert!(matches!(result, Err(Error::PeripheralNotFound { id }) if id == "P9"));
        assert!(harness.bridge.commands().is_empty());
    }

    #[tokio::test]
    async fn test_discover_children_rejects_descriptors() {
        let harness = Harness::new();

        let result = harness.bluetooth.discover_children("P1|S1|C1|D1").await;
        assert!(matches!(result, Err(Error::NoChildren { .. })));

        let result = harness.bluetooth.discover_children("P1||C1").await;
        assert!(matches!(result, Err(Error::UnknownIdentifier { .. })));
        assert!(harness.bridge.commands().is_empty());
    }

    #[tokio::test]
    async fn test_discover_requires_matching_kind() {
        let harness = Harness::new();
        let result = harness.bluetooth.discover_characteristics("P1").await;
        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }

    #[tokio::test]
    async fn test_discover_checks_capability_before_identifier() {
        let harness = Harness::new();
        harness.bridge.disable(Operation::Discover);

        let result = harness.bluetooth.discover_characteristics("P1").await;
        assert!(matches!(
            result,
            Err(Error::Unavailable {
                operation: Operation::Discover
            })
        ));
        let result = harness.bluetooth.discover_services("P1|S1", &[] as &[&str]).await;
        assert!(matches!(result, Err(Error::Unavailable { .. })));
        let result = harness.bluetooth.discover_descriptors("P1|S1").await;
        assert!(matches!(result, Err(Error::Unavailable { .. })));
        assert!(harness.bridge.commands().is_empty());
    }

    #[tokio::test]
    async fn test_unmatched_completion_is_ignored() {
        let harness = Harness::new();
        harness.send(NativeEvent::completed(
            key(TransactionTag::Read, "P1|S1|C1"),
            EventData::default(),
        ));

        wait_for(|| harness.bluetooth.unmatched_transactions() == 1).await;
        assert_eq!(harness.bluetooth.pending_transactions(), 0);
    }

    #[tokio::test]
    async fn test_connect_timeout_cancels_once() {
        let harness = Harness::new();

        let result = harness
            .bluetooth
            .connect("P1", Some(Duration::from_millis(20)))
            .await;
        assert!(matches!(
            result,
            Err(Error::Timeout {
                operation: "connect",
                ..
            })
        ));
        assert_eq!(
            harness.bridge.commands(),
            vec![
                Command::Connect("P1".to_string()),
                Command::Disconnect("P1".to_string()),
            ]
        );

        harness.send(NativeEvent::completed(
            key(TransactionTag::Connect, "P1"),
            EventData::with_peripheral(Peripheral::new("P1").with_state(PeripheralState::Connected)),
        ));
        wait_for(|| harness.bluetooth.unmatched_transactions() == 1).await;

        // The unanswered disconnect does not outlive its deadline.
        wait_for(|| harness.bluetooth.pending_transactions() == 0).await;
    }

    #[tokio::test]
    async fn test_answered_cancel_settles_normally() {
        let harness = Harness::new();
        harness.bridge.respond(|command| match command {
            Command::Disconnect(uuid) => vec![NativeEvent::completed(
                key(TransactionTag::Disconnect, uuid),
                EventData::with_peripheral(Peripheral::new(uuid)),
            )],
            _ => Vec::new(),
        });

        let result = harness
            .bluetooth
            .connect("P1", Some(Duration::from_millis(20)))
            .await;
        assert!(matches!(result, Err(Error::Timeout { .. })));

        wait_for(|| harness.bluetooth.pending_transactions() == 0).await;
        assert_eq!(harness.bluetooth.unmatched_transactions(), 0);
        assert_eq!(
            harness.bluetooth.peripheral("P1").unwrap().state,
            PeripheralState::Disconnected
        );
    }

    #[tokio::test]
    async fn test_configured_connect_timeout() {
        let harness = Harness::with_config(
            BluetoothConfig::default().with_default_connect_timeout(Some(Duration::from_millis(10))),
        );
        let result = harness.bluetooth.connect("P1", None).await;
        assert!(matches!(result, Err(Error::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_write_without_response_resolves_immediately() {
        let harness = Harness::new();

        harness
            .bluetooth
            .write_characteristic_without_response("P1", "S1", "C1", vec![0x01u8, 0x02])
            .await
            .unwrap();

        match harness.bridge.commands().as_slice() {
            [Command::UpdateCharacteristic(request)] => {
                assert_eq!(request.property, TransactionTag::WriteWithoutResponse);
                assert_eq!(request.data, Some(Bytes::from_static(&[0x01, 0x02])));
            }
            other => panic!("unexpected commands: {:?}", other),
        }
        assert_eq!(harness.bluetooth.pending_transactions(), 0);
    }

    #[tokio::test]
    async fn test_read_characteristic() {
        let harness = Harness::new();
        harness.bridge.respond(|command| match command {
            Command::UpdateCharacteristic(request) if request.property == TransactionTag::Read => {
                let characteristic = Characteristic {
                    value: Some(Bytes::from_static(b"\x2a")),
                    ..Characteristic::new("P1", "S1", "C1")
                };
                vec![NativeEvent::completed(
                    key(TransactionTag::Read, "P1|S1|C1"),
                    EventData {
                        characteristic: Some(characteristic),
                        ..Default::default()
                    },
                )]
            }
            _ => Vec::new(),
        });

        let value = harness
            .bluetooth
            .read_characteristic("P1", "S1", "C1")
            .await
            .unwrap();
        assert_eq!(value, Some(Bytes::from_static(b"\x2a")));
    }

    #[tokio::test]
    async fn test_read_value_is_cached() {
        let harness = Harness::new();
        harness.bridge.respond(|command| match command {
            Command::UpdateCharacteristic(request) if request.property == TransactionTag::Read => {
                // Native snapshots list the tree without attribute values.
                let mut service = Service::new("P1", "S1");
                service.characteristics.push(Characteristic::new("P1", "S1", "C1"));
                let snapshot = Peripheral {
                    services: vec![service],
                    ..Peripheral::new("P1").with_state(PeripheralState::Connected)
                };
                vec![NativeEvent::completed(
                    key(TransactionTag::Read, "P1|S1|C1"),
                    EventData {
                        peripheral: Some(snapshot),
                        characteristic: Some(Characteristic {
                            value: Some(Bytes::from_static(&[0x2a])),
                            ..Characteristic::new("P1", "S1", "C1")
                        }),
                        ..Default::default()
                    },
                )]
            }
            _ => Vec::new(),
        });

        harness
            .bluetooth
            .read_characteristic("P1", "S1", "C1")
            .await
            .unwrap();

        let path = NodePath::characteristic("P1", "S1", "C1").unwrap();
        let cached = harness.bluetooth.peripheral("P1").unwrap();
        assert_eq!(
            cached.characteristic(&path).unwrap().value,
            Some(Bytes::from_static(&[0x2a]))
        );
    }

    #[tokio::test]
    async fn test_subscribed_values_reach_observers() {
        let harness = Harness::new();
        harness.bridge.respond(|command| match command {
            Command::UpdateCharacteristic(request) => vec![NativeEvent::completed(
                key(request.property, "P1|S1|C1"),
                EventData {
                    characteristic: Some(Characteristic {
                        is_notifying: request.is_enabled.unwrap_or(false),
                        ..Characteristic::new("P1", "S1", "C1")
                    }),
                    ..Default::default()
                },
            )],
            _ => Vec::new(),
        });

        let path = NodePath::characteristic("P1", "S1", "C1").unwrap();
        let values = Arc::new(Mutex::new(Vec::new()));
        let recorded = values.clone();
        let watched = path.clone();
        let _handle = harness.bluetooth.observe_updates(move |peripherals| {
            let value = peripherals
                .get("P1")
                .and_then(|p| p.characteristic(&watched))
                .and_then(|c| c.value.clone());
            if let Some(value) = value {
                recorded.lock().push(value);
            }
        });

        let characteristic = harness
            .bluetooth
            .set_notify("P1", "S1", "C1", true)
            .await
            .unwrap()
            .unwrap();
        assert!(characteristic.is_notifying);

        harness.send(NativeEvent::value_changed(Characteristic {
            value: Some(Bytes::from_static(&[0x07])),
            is_notifying: true,
            ..Characteristic::new("P1", "S1", "C1")
        }));
        wait_for(|| !values.lock().is_empty()).await;

        assert_eq!(*values.lock(), vec![Bytes::from_static(&[0x07])]);
        assert_eq!(harness.bluetooth.unmatched_transactions(), 0);
        let cached = harness.bluetooth.peripheral("P1").unwrap();
        assert!(cached.characteristic(&path).unwrap().is_notifying);
    }

    #[tokio::test]
    async fn test_native_failure_rejects() {
        let harness = Harness::new();
        harness.bridge.respond(|command| match command {
            Command::UpdateCharacteristic(_) => vec![NativeEvent::failed(
                key(TransactionTag::Write, "P1|S1|C1"),
                NativeError::new("ERR_WRITE", "write rejected"),
                EventData::default(),
            )],
            _ => Vec::new(),
        });

        let result = harness
            .bluetooth
            .write_characteristic("P1", "S1", "C1", vec![0x00u8])
            .await;
        match result {
            Err(Error::Native(error)) => assert_eq!(error.code, "ERR_WRITE"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_set_notify_sends_enabled_flag() {
        let harness = Harness::new();
        harness.bridge.respond(|command| match command {
            Command::UpdateCharacteristic(request) => vec![NativeEvent::completed(
                key(request.property, "P1|S1|C1"),
                EventData::default(),
            )],
            _ => Vec::new(),
        });

        harness
            .bluetooth
            .set_notify("P1", "S1", "C1", true)
            .await
            .unwrap();

        match harness.bridge.commands().as_slice() {
            [Command::UpdateCharacteristic(request)] => {
                assert_eq!(request.property, TransactionTag::Notify);
                assert_eq!(request.is_enabled, Some(true));
            }
            other => panic!("unexpected commands: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_descriptor_without_payload() {
        let harness = Harness::new();
        harness.bridge.respond(|command| match command {
            Command::UpdateDescriptor(_) => vec![NativeEvent::completed(
                key(TransactionTag::Read, "P1|S1|C1|D1"),
                EventData::default(),
            )],
            _ => Vec::new(),
        });

        let result = harness
            .bluetooth
            .read_descriptor("P1", "S1", "C1", "D1")
            .await;
        assert!(matches!(
            result,
            Err(Error::MissingPayload {
                entity: "descriptor",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_read_rssi() {
        let harness = Harness::new();
        harness.bridge.respond(|command| match command {
            Command::ReadRssi(uuid) => vec![NativeEvent::completed(
                key(TransactionTag::Rssi, uuid),
                EventData {
                    rssi: Some(-61),
                    ..Default::default()
                },
            )],
            _ => Vec::new(),
        });

        assert_eq!(harness.bluetooth.read_rssi("P1").await.unwrap(), -61);
    }

    #[tokio::test]
    async fn test_unsupported_operation() {
        let harness = Harness::new();
        harness.bridge.disable(Operation::ReadRssi);

        let error = harness.bluetooth.read_rssi("P1").await.unwrap_err();
        assert_eq!(
            error.to_string(),
            "The method readRSSI is not available on this platform"
        );
        assert!(harness.bridge.commands().is_empty());
    }

    #[tokio::test]
    async fn test_empty_uuid_never_reaches_bridge() {
        let mut bridge = MockNativeBridge::new();
        bridge.expect_supports().returning(|_| true);
        bridge.expect_connect().times(0);
        bridge.expect_update_characteristic().times(0);

        let bluetooth = Bluetooth::new(Arc::new(bridge));

        let result = bluetooth.connect("", None).await;
        assert!(matches!(
            result,
            Err(Error::InvalidUuid {
                name: "peripheralUUID"
            })
        ));

        let result = bluetooth.read_characteristic("P1", "", "C1").await;
        assert!(matches!(
            result,
            Err(Error::InvalidUuid {
                name: "serviceUUID"
            })
        ));
        assert_eq!(bluetooth.pending_transactions(), 0);
    }

    #[tokio::test]
    async fn test_stop_scan_clears_scan_callbacks() {
        let harness = Harness::new();
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();

        let handle = harness
            .bluetooth
            .start_scan_with_callback(&[] as &[&str], ScanOptions::default(), move |_| {
                *counter.lock() += 1
            })
            .await
            .unwrap();
        handle.detach();
        assert!(harness.bluetooth.is_scanning().await.unwrap());

        harness.bluetooth.stop_scan().await.unwrap();
        assert!(!harness.bluetooth.is_scanning().await.unwrap());

        harness.send(NativeEvent::discovered(Peripheral::new("P1"), None, None, None));
        wait_for(|| harness.bluetooth.peripheral("P1").is_some()).await;
        assert_eq!(*calls.lock(), 0);
    }

    #[tokio::test]
    async fn test_observe_state_reports_current_state_first() {
        let harness = Harness::new();
        let states = Arc::new(Mutex::new(Vec::new()));
        let recorded = states.clone();

        let _handle = harness
            .bluetooth
            .observe_state(move |state| recorded.lock().push(state))
            .await
            .unwrap();
        assert_eq!(*states.lock(), vec![CentralState::PoweredOn]);

        harness.send(NativeEvent::central_state_changed(Central::new(
            CentralState::PoweredOff,
            false,
        )));
        wait_for(|| states.lock().len() == 2).await;
        assert_eq!(
            *states.lock(),
            vec![CentralState::PoweredOn, CentralState::PoweredOff]
        );
    }

    #[tokio::test]
    async fn test_fetch_peripherals_fills_cache() {
        let harness = Harness::new();
        harness
            .bridge
            .set_peripherals(vec![Peripheral::new("P1"), Peripheral::new("P2")]);

        let fetched = harness.bluetooth.fetch_peripherals().await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(harness.bluetooth.peripherals().len(), 2);
    }

    #[tokio::test]
    async fn test_observe_updates_on_completion() {
        let harness = Harness::new();
        harness.bridge.respond(connect_responder);
        harness.bridge.set_central(Central::new(CentralState::PoweredOn, false));

        let sizes = Arc::new(Mutex::new(Vec::new()));
        let recorded = sizes.clone();
        let _handle = harness
            .bluetooth
            .observe_updates(move |peripherals| recorded.lock().push(peripherals.len()));

        harness.bluetooth.connect("P1", None).await.unwrap();
        assert_eq!(*sizes.lock(), vec![1]);
    }
}
