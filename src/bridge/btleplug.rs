//! Native bridge backed by the `btleplug` crate.
//!
//! Commands are executed on spawned Tokio tasks; each task reports its
//! outcome as a completion event keyed the same way the façade keys the
//! transaction. Adapter events become discovery and central state events.

use ::btleplug::api::bleuuid::uuid_from_u16;
use ::btleplug::api::{
    Central as _, CentralEvent, CentralState as AdapterState, CharPropFlags,
    Characteristic as GattCharacteristic, Manager as _, Peripheral as _, PeripheralProperties,
    ScanFilter, Service as GattService, WriteType,
};
use ::btleplug::platform::{Adapter, Manager, Peripheral as Device, PeripheralId};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::StreamExt;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use super::{
    CharacteristicUpdate, ConnectOptions, DescriptorUpdate, DiscoverRequest, EventData,
    NativeBridge, NativeEvent, ScanOptions,
};
use crate::dispatcher::EventSender;
use crate::error::{Error, NativeError, Result};
use crate::identifier::{NodePath, TransactionKey, TransactionTag};
use crate::model::{
    AdvertisementData, Central, CentralState, Characteristic, CharacteristicProperty, Descriptor,
    Peripheral, PeripheralState, Service,
};

/// A [`NativeBridge`] driving the first Bluetooth adapter of the host.
pub struct BtleplugBridge {
    inner: Arc<Inner>,
    /// Handle to the adapter event task.
    event_task: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    adapter: Adapter,
    events: EventSender,
    /// Devices seen so far, by peripheral UUID.
    devices: RwLock<HashMap<String, Device>>,
    central: RwLock<Central>,
    allow_duplicates: AtomicBool,
    /// Peripherals whose notification stream is being forwarded.
    forwarding: Mutex<HashSet<String>>,
}

impl BtleplugBridge {
    /// Create a bridge on the first available adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new(events: EventSender) -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapters = manager.adapters().await?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Ok(Self::with_adapter(adapter, events).await)
    }

    /// Create a bridge on a specific adapter.
    ///
    /// The central state starts from what the adapter reports, or
    /// `unknown` if it cannot tell.
    pub async fn with_adapter(adapter: Adapter, events: EventSender) -> Self {
        let state = initial_state(adapter.adapter_state().await);
        debug!("Adapter is {}", state);

        Self {
            inner: Arc::new(Inner {
                adapter,
                events,
                devices: RwLock::new(HashMap::new()),
                central: RwLock::new(Central::new(state, false)),
                allow_duplicates: AtomicBool::new(false),
                forwarding: Mutex::new(HashSet::new()),
            }),
            event_task: Mutex::new(None),
        }
    }

    /// Get the underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.inner.adapter
    }

    /// Run `operation` on a task and report its outcome under `key`.
    fn spawn_transaction<F>(&self, key: TransactionKey, operation: F)
    where
        F: Future<Output = Result<EventData>> + Send + 'static,
    {
        let inner = self.inner.clone();

        tokio::spawn(async move {
            let event = match operation.await {
                Ok(data) => NativeEvent::completed(key, data),
                Err(e) => {
                    debug!("Transaction {} failed: {}", key, e);
                    NativeEvent::failed(key, native_error(&e), EventData::default())
                }
            };
            inner.emit(event);
        });
    }

    fn listen(&self) {
        let mut task = self.event_task.lock();
        if task.is_some() {
            return;
        }

        let inner = self.inner.clone();
        *task = Some(tokio::spawn(async move {
            let mut events = match inner.adapter.events().await {
                Ok(events) => events,
                Err(e) => {
                    error!("Failed to get adapter events: {}", e);
                    return;
                }
            };

            while let Some(event) = events.next().await {
                inner.handle_event(event).await;
            }

            debug!("Adapter event stream ended");
        }));
    }
}

impl Drop for BtleplugBridge {
    fn drop(&mut self) {
        if let Some(task) = self.event_task.lock().take() {
            task.abort();
        }
    }
}

#[async_trait]
impl NativeBridge for BtleplugBridge {
    async fn start_scan(&self, service_uuids: Vec<String>, options: ScanOptions) -> Result<()> {
        let services = service_uuids
            .iter()
            .map(|uuid| parse_uuid("serviceUUIDs", uuid))
            .collect::<Result<Vec<_>>>()?;

        if !options.solicited_service_uuids.is_empty() {
            debug!("Solicited service filters are not supported by this adapter; ignoring");
        }

        self.listen();
        self.inner
            .allow_duplicates
            .store(options.allow_duplicates, Ordering::SeqCst);
        self.inner.adapter.start_scan(ScanFilter { services }).await?;
        self.inner.central.write().is_scanning = true;

        info!("BLE scan started");
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        self.inner.adapter.stop_scan().await?;
        self.inner.central.write().is_scanning = false;

        info!("BLE scan stopped");
        Ok(())
    }

    fn connect(&self, peripheral_uuid: &str, _options: &ConnectOptions) -> Result<()> {
        let key = TransactionKey::new(TransactionTag::Connect, NodePath::peripheral(peripheral_uuid)?);
        let inner = self.inner.clone();
        let uuid = peripheral_uuid.to_string();

        self.spawn_transaction(key, async move {
            let device = inner.device(&uuid).await?;
            if !device.is_connected().await? {
                device.connect().await?;
            }
            info!("Successfully connected to {}", uuid);
            Ok(EventData::with_peripheral(snapshot(&device).await?))
        });
        Ok(())
    }

    fn disconnect(&self, peripheral_uuid: &str) -> Result<()> {
        let key = TransactionKey::new(
            TransactionTag::Disconnect,
            NodePath::peripheral(peripheral_uuid)?,
        );
        let inner = self.inner.clone();
        let uuid = peripheral_uuid.to_string();

        self.spawn_transaction(key, async move {
            let device = inner.device(&uuid).await?;
            device.disconnect().await?;
            inner.forwarding.lock().remove(&uuid);
            info!("Successfully disconnected from {}", uuid);
            Ok(EventData::with_peripheral(snapshot(&device).await?))
        });
        Ok(())
    }

    fn update_characteristic(&self, request: CharacteristicUpdate) -> Result<()> {
        let path = NodePath::characteristic(
            &request.peripheral_uuid,
            &request.service_uuid,
            &request.characteristic_uuid,
        )?;
        let inner = self.inner.clone();

        if !request.property.expects_response() {
            tokio::spawn(async move {
                if let Err(e) = inner.update_characteristic(request).await {
                    warn!("Write without response to {} failed: {}", path, e);
                }
            });
            return Ok(());
        }

        let key = TransactionKey::new(request.property, path);
        self.spawn_transaction(key, async move { inner.update_characteristic(request).await });
        Ok(())
    }

    fn update_descriptor(&self, request: DescriptorUpdate) -> Result<()> {
        let path = NodePath::descriptor(
            &request.peripheral_uuid,
            &request.service_uuid,
            &request.characteristic_uuid,
            &request.descriptor_uuid,
        )?;
        let key = TransactionKey::new(request.property, path);
        let inner = self.inner.clone();

        self.spawn_transaction(key, async move { inner.update_descriptor(request).await });
        Ok(())
    }

    fn read_rssi(&self, peripheral_uuid: &str) -> Result<()> {
        let key = TransactionKey::new(TransactionTag::Rssi, NodePath::peripheral(peripheral_uuid)?);
        let inner = self.inner.clone();
        let uuid = peripheral_uuid.to_string();

        self.spawn_transaction(key, async move {
            let device = inner.device(&uuid).await?;
            let rssi = device
                .properties()
                .await?
                .and_then(|properties| properties.rssi)
                .ok_or_else(|| Error::MissingPayload {
                    entity: "rssi",
                    id: uuid.clone(),
                })?;

            Ok(EventData {
                peripheral: Some(snapshot(&device).await?),
                rssi: Some(rssi),
                ..Default::default()
            })
        });
        Ok(())
    }

    fn discover(&self, request: DiscoverRequest) -> Result<()> {
        let mut path = NodePath::peripheral(&request.peripheral_uuid)?;
        if let Some(service_uuid) = &request.service_uuid {
            path = path.child(service_uuid)?;
        }
        if let Some(characteristic_uuid) = &request.characteristic_uuid {
            path = path.child(characteristic_uuid)?;
        }

        let key = TransactionKey::new(TransactionTag::Discover, path);
        let inner = self.inner.clone();

        self.spawn_transaction(key, async move { inner.discover(request).await });
        Ok(())
    }

    async fn get_peripherals(&self) -> Result<Vec<Peripheral>> {
        let devices = self.inner.adapter.peripherals().await?;

        let mut peripherals = Vec::with_capacity(devices.len());
        for device in devices {
            let peripheral = snapshot(&device).await?;
            self.inner
                .devices
                .write()
                .insert(peripheral.uuid.clone(), device);
            peripherals.push(peripheral);
        }
        Ok(peripherals)
    }

    async fn get_central(&self) -> Result<Central> {
        let state = central_state(self.inner.adapter.adapter_state().await?);

        let mut central = self.inner.central.write();
        central.state = state;
        Ok(central.clone())
    }
}

impl Inner {
    fn emit(&self, event: NativeEvent) {
        if self.events.send(event).is_err() {
            trace!("Event channel closed; dropping native event");
        }
    }

    /// Look up a device by peripheral UUID, asking the adapter on a miss.
    async fn device(&self, uuid: &str) -> Result<Device> {
        let cached = self.devices.read().get(uuid).cloned();
        if let Some(device) = cached {
            return Ok(device);
        }

        let device = self
            .adapter
            .peripherals()
            .await?
            .into_iter()
            .find(|device| device.id().to_string() == uuid)
            .ok_or_else(|| Error::PeripheralNotFound {
                id: uuid.to_string(),
            })?;

        self.devices.write().insert(uuid.to_string(), device.clone());
        Ok(device)
    }

    async fn handle_event(&self, event: CentralEvent) {
        match event {
            CentralEvent::DeviceDiscovered(id) => {
                trace!("Device discovered: {:?}", id);
                self.report_discovery(id).await;
            }
            CentralEvent::DeviceUpdated(id) => {
                if self.allow_duplicates.load(Ordering::SeqCst) {
                    self.report_discovery(id).await;
                }
            }
            CentralEvent::DeviceConnected(id) => {
                debug!("Device connected: {:?}", id);
            }
            CentralEvent::DeviceDisconnected(id) => {
                debug!("Device disconnected: {:?}", id);
                self.forwarding.lock().remove(&id.to_string());
            }
            CentralEvent::ManufacturerDataAdvertisement { .. } => {}
            CentralEvent::ServiceDataAdvertisement { .. } => {}
            CentralEvent::ServicesAdvertisement { .. } => {}
            CentralEvent::StateUpdate(state) => {
                let central = {
                    let mut central = self.central.write();
                    central.state = central_state(state);
                    central.clone()
                };
                self.emit(NativeEvent::central_state_changed(central));
            }
        }
    }

    async fn report_discovery(&self, id: PeripheralId) {
        let device = match self.adapter.peripheral(&id).await {
            Ok(device) => device,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                return;
            }
        };

        let properties = match device.properties().await {
            Ok(Some(properties)) => properties,
            _ => return,
        };

        let peripheral = match snapshot(&device).await {
            Ok(peripheral) => peripheral,
            Err(e) => {
                trace!("Failed to read peripheral {:?}: {}", id, e);
                return;
            }
        };

        self.devices
            .write()
            .insert(peripheral.uuid.clone(), device);

        let central = self.central.read().clone();
        self.emit(NativeEvent::discovered(
            peripheral,
            Some(advertisement(&properties)),
            properties.rssi,
            Some(central),
        ));
    }

    async fn update_characteristic(self: &Arc<Self>, request: CharacteristicUpdate) -> Result<EventData> {
        let device = self.device(&request.peripheral_uuid).await?;
        let target = find_characteristic(&device, &request.service_uuid, &request.characteristic_uuid)?;
        let mut characteristic = convert_characteristic(&request.peripheral_uuid, &target);

        match request.property {
            TransactionTag::Read => {
                let value = device.read(&target).await?;
                trace!("Read {} bytes from characteristic {}", value.len(), target.uuid);
                characteristic.value = Some(Bytes::from(value));
            }
            TransactionTag::Write | TransactionTag::WriteWithoutResponse => {
                let data = request.data.unwrap_or_default();
                let write_type = if request.property == TransactionTag::Write {
                    WriteType::WithResponse
                } else {
                    WriteType::WithoutResponse
                };

                device.write(&target, &data, write_type).await?;
                trace!("Wrote {} bytes to characteristic {}", data.len(), target.uuid);
                characteristic.value = Some(data);
            }
            TransactionTag::Notify | TransactionTag::Indicate => {
                let enabled = request.is_enabled.unwrap_or(true);
                if enabled {
                    device.subscribe(&target).await?;
                    self.forward_notifications(&request.peripheral_uuid, &device)
                        .await?;
                } else {
                    device.unsubscribe(&target).await?;
                }
                debug!(
                    "Notifications for {} are {}",
                    target.uuid,
                    if enabled { "on" } else { "off" }
                );
                characteristic.is_notifying = enabled;
            }
            other => {
                return Err(Error::InvalidParameter {
                    name: "property".to_string(),
                    value: other.to_string(),
                })
            }
        }

        Ok(EventData {
            peripheral: Some(snapshot(&device).await?),
            characteristic: Some(characteristic),
            ..Default::default()
        })
    }

    async fn update_descriptor(&self, request: DescriptorUpdate) -> Result<EventData> {
        let device = self.device(&request.peripheral_uuid).await?;
        let characteristic =
            find_characteristic(&device, &request.service_uuid, &request.characteristic_uuid)?;

        let uuid = parse_uuid("descriptorUUID", &request.descriptor_uuid)?;
        let target = characteristic
            .descriptors
            .iter()
            .find(|d| d.uuid == uuid)
            .cloned()
            .ok_or_else(|| Error::MissingPayload {
                entity: "descriptor",
                id: request.descriptor_uuid.clone(),
            })?;

        let mut descriptor = Descriptor::new(
            &request.peripheral_uuid,
            &characteristic.service_uuid.to_string(),
            &characteristic.uuid.to_string(),
            &target.uuid.to_string(),
        );

        match request.property {
            TransactionTag::Read => {
                descriptor.value = Some(Bytes::from(device.read_descriptor(&target).await?));
            }
            TransactionTag::Write => {
                let data = request.data.unwrap_or_default();
                device.write_descriptor(&target, &data).await?;
                descriptor.value = Some(data);
            }
            other => {
                return Err(Error::InvalidParameter {
                    name: "property".to_string(),
                    value: other.to_string(),
                })
            }
        }

        Ok(EventData {
            descriptor: Some(descriptor),
            ..Default::default()
        })
    }

    async fn discover(&self, request: DiscoverRequest) -> Result<EventData> {
        let device = self.device(&request.peripheral_uuid).await?;

        if request.service_uuid.is_none() || device.services().is_empty() {
            device.discover_services().await?;
        }

        let mut peripheral = snapshot(&device).await?;
        if !request.service_uuids_to_query.is_empty() {
            let wanted = request
                .service_uuids_to_query
                .iter()
                .map(|uuid| parse_uuid("serviceUUIDs", uuid).map(|uuid| uuid.to_string()))
                .collect::<Result<Vec<_>>>()?;
            peripheral.services.retain(|s| wanted.contains(&s.uuid));
        }

        let service = match &request.service_uuid {
            None => None,
            Some(uuid) => {
                let canonical = parse_uuid("serviceUUID", uuid)?.to_string();
                let service = peripheral.service(&canonical).cloned().ok_or_else(|| {
                    Error::MissingPayload {
                        entity: "service",
                        id: uuid.clone(),
                    }
                })?;
                Some(service)
            }
        };

        let characteristic = match (&service, &request.characteristic_uuid) {
            (Some(service), Some(uuid)) => {
                let canonical = parse_uuid("characteristicUUID", uuid)?.to_string();
                let characteristic = service.characteristic(&canonical).cloned().ok_or_else(|| {
                    Error::MissingPayload {
                        entity: "characteristic",
                        id: uuid.clone(),
                    }
                })?;
                Some(characteristic)
            }
            _ => None,
        };

        debug!(
            "Discovered {} services on {}",
            peripheral.services.len(),
            request.peripheral_uuid
        );

        Ok(EventData {
            peripheral: Some(peripheral),
            service,
            characteristic,
            ..Default::default()
        })
    }

    /// Report values pushed by subscribed characteristics as
    /// value-changed events.
    async fn forward_notifications(self: &Arc<Self>, peripheral_uuid: &str, device: &Device) -> Result<()> {
        if !self.forwarding.lock().insert(peripheral_uuid.to_string()) {
            return Ok(());
        }

        let mut notifications = match device.notifications().await {
            Ok(notifications) => notifications,
            Err(e) => {
                self.forwarding.lock().remove(peripheral_uuid);
                return Err(e.into());
            }
        };

        let inner = self.clone();
        let device = device.clone();
        let uuid = peripheral_uuid.to_string();

        tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                let services = device.services();
                let target = services
                    .iter()
                    .flat_map(|s| s.characteristics.iter())
                    .find(|c| c.uuid == notification.uuid)
                    .cloned();
                let Some(target) = target else {
                    trace!("Notification from unknown characteristic {}", notification.uuid);
                    continue;
                };

                inner.emit(notification_event(&uuid, &target, notification.value));
            }

            inner.forwarding.lock().remove(&uuid);
            debug!("Notification stream for {} ended", uuid);
        });

        Ok(())
    }
}

fn notification_event(peripheral_uuid: &str, target: &GattCharacteristic, value: Vec<u8>) -> NativeEvent {
    let mut characteristic = convert_characteristic(peripheral_uuid, target);
    characteristic.value = Some(Bytes::from(value));
    characteristic.is_notifying = true;
    NativeEvent::value_changed(characteristic)
}

/// Current state of a device as a [`Peripheral`] snapshot.
async fn snapshot(device: &Device) -> Result<Peripheral> {
    let uuid = device.id().to_string();
    let properties = device.properties().await?;
    let state = if device.is_connected().await? {
        PeripheralState::Connected
    } else {
        PeripheralState::Disconnected
    };

    let mut peripheral = Peripheral::new(&uuid).with_state(state);
    if let Some(properties) = properties {
        peripheral.name = properties.local_name.clone();
        peripheral.rssi = properties.rssi;
    }
    peripheral.services = device
        .services()
        .iter()
        .map(|service| convert_service(&uuid, service))
        .collect();

    Ok(peripheral)
}

fn advertisement(properties: &PeripheralProperties) -> AdvertisementData {
    // Company identifier first, little endian, as it appears on air.
    let manufacturer_data = properties
        .manufacturer_data
        .iter()
        .min_by_key(|(company, _)| **company)
        .map(|(company, data)| {
            let mut bytes = company.to_le_bytes().to_vec();
            bytes.extend_from_slice(data);
            Bytes::from(bytes)
        });

    AdvertisementData {
        local_name: properties.local_name.clone(),
        manufacturer_data,
        service_data: properties
            .service_data
            .iter()
            .map(|(uuid, data)| (uuid.to_string(), Bytes::from(data.clone())))
            .collect(),
        service_uuids: properties.services.iter().map(|uuid| uuid.to_string()).collect(),
        tx_power_level: properties.tx_power_level,
        ..Default::default()
    }
}

fn convert_service(peripheral_uuid: &str, service: &GattService) -> Service {
    Service {
        is_primary: service.primary,
        characteristics: service
            .characteristics
            .iter()
            .map(|c| convert_characteristic(peripheral_uuid, c))
            .collect(),
        ..Service::new(peripheral_uuid, &service.uuid.to_string())
    }
}

fn convert_characteristic(peripheral_uuid: &str, characteristic: &GattCharacteristic) -> Characteristic {
    let service_uuid = characteristic.service_uuid.to_string();
    let uuid = characteristic.uuid.to_string();

    Characteristic {
        properties: convert_properties(characteristic.properties),
        descriptors: characteristic
            .descriptors
            .iter()
            .map(|d| Descriptor::new(peripheral_uuid, &service_uuid, &uuid, &d.uuid.to_string()))
            .collect(),
        ..Characteristic::new(peripheral_uuid, &service_uuid, &uuid)
    }
}

fn convert_properties(flags: CharPropFlags) -> Vec<CharacteristicProperty> {
    [
        (CharPropFlags::BROADCAST, CharacteristicProperty::Broadcast),
        (CharPropFlags::READ, CharacteristicProperty::Read),
        (
            CharPropFlags::WRITE_WITHOUT_RESPONSE,
            CharacteristicProperty::WriteWithoutResponse,
        ),
        (CharPropFlags::WRITE, CharacteristicProperty::Write),
        (CharPropFlags::NOTIFY, CharacteristicProperty::Notify),
        (CharPropFlags::INDICATE, CharacteristicProperty::Indicate),
        (
            CharPropFlags::AUTHENTICATED_SIGNED_WRITES,
            CharacteristicProperty::AuthenticatedSignedWrites,
        ),
        (
            CharPropFlags::EXTENDED_PROPERTIES,
            CharacteristicProperty::ExtendedProperties,
        ),
    ]
    .into_iter()
    .filter(|(flag, _)| flags.contains(*flag))
    .map(|(_, property)| property)
    .collect()
}

fn central_state(state: AdapterState) -> CentralState {
    match state {
        AdapterState::PoweredOn => CentralState::PoweredOn,
        AdapterState::PoweredOff => CentralState::PoweredOff,
        #[allow(unreachable_patterns)]
        _ => CentralState::Unknown,
    }
}

fn initial_state(reported: ::btleplug::Result<AdapterState>) -> CentralState {
    match reported {
        Ok(state) => central_state(state),
        Err(e) => {
            warn!("Failed to read adapter state: {}", e);
            CentralState::Unknown
        }
    }
}

fn find_characteristic(
    device: &Device,
    service_uuid: &str,
    characteristic_uuid: &str,
) -> Result<GattCharacteristic> {
    let service = parse_uuid("serviceUUID", service_uuid)?;
    let uuid = parse_uuid("characteristicUUID", characteristic_uuid)?;

    device
        .services()
        .into_iter()
        .find(|s| s.uuid == service)
        .and_then(|s| s.characteristics.into_iter().find(|c| c.uuid == uuid))
        .ok_or_else(|| Error::MissingPayload {
            entity: "characteristic",
            id: format!("{}|{}", service_uuid, characteristic_uuid),
        })
}

/// Parse a full UUID or a 16-bit SIG short form such as `180D`.
fn parse_uuid(name: &str, value: &str) -> Result<Uuid> {
    if value.len() == 4 {
        if let Ok(short) = u16::from_str_radix(value, 16) {
            return Ok(uuid_from_u16(short));
        }
    }

    Uuid::parse_str(value).map_err(|_| Error::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Describe a failure the way a native stack would report it.
fn native_error(error: &Error) -> NativeError {
    let code = match error {
        Error::Bluetooth(::btleplug::Error::NotConnected) => "ERR_NOT_CONNECTED",
        Error::Bluetooth(::btleplug::Error::PermissionDenied) => "ERR_PERMISSION_DENIED",
        Error::Bluetooth(::btleplug::Error::TimedOut(_)) => "ERR_TIMEOUT",
        Error::Bluetooth(::btleplug::Error::NotSupported(_)) => "ERR_UNSUPPORTED",
        Error::Bluetooth(_) => "ERR_BLUETOOTH",
        Error::PeripheralNotFound { .. } => "ERR_NO_PERIPHERAL",
        Error::MissingPayload { .. } => "ERR_NO_ENTITY",
        Error::InvalidParameter { .. } | Error::InvalidUuid { .. } => "ERR_INVALID_ARGUMENT",
        _ => "ERR_UNEXPECTED",
    };

    NativeError {
        domain: Some("btleplug".to_string()),
        ..NativeError::new(code, error.to_string())
    }
}
