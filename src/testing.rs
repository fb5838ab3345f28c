//! Scripted native bridge for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::bluetooth::Bluetooth;
use crate::bridge::{
    CharacteristicUpdate, ConnectOptions, DescriptorUpdate, DiscoverRequest, NativeBridge,
    NativeEvent, Operation, ScanOptions,
};
use crate::config::BluetoothConfig;
use crate::dispatcher::{event_channel, EventSender};
use crate::error::Result;
use crate::model::{Central, CentralState, Peripheral};

/// A command received by [`FakeBridge`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    StartScan(Vec<String>),
    StopScan,
    Connect(String),
    Disconnect(String),
    UpdateCharacteristic(CharacteristicUpdate),
    UpdateDescriptor(DescriptorUpdate),
    ReadRssi(String),
    Discover(DiscoverRequest),
}

type Responder = Arc<dyn Fn(&Command) -> Vec<NativeEvent> + Send + Sync>;

/// Records commands and answers them with scripted events.
pub(crate) struct FakeBridge {
    events: EventSender,
    commands: Mutex<Vec<Command>>,
    responder: Mutex<Option<Responder>>,
    unsupported: Mutex<Vec<Operation>>,
    central: Mutex<Central>,
    peripherals: Mutex<Vec<Peripheral>>,
}

impl FakeBridge {
    pub(crate) fn new(events: EventSender) -> Self {
        Self {
            events,
            commands: Mutex::new(Vec::new()),
            responder: Mutex::new(None),
            unsupported: Mutex::new(Vec::new()),
            central: Mutex::new(Central::new(CentralState::PoweredOn, false)),
            peripherals: Mutex::new(Vec::new()),
        }
    }

    /// Answer every later command with the events `responder` returns.
    pub(crate) fn respond<F>(&self, responder: F)
    where
        F: Fn(&Command) -> Vec<NativeEvent> + Send + Sync + 'static,
    {
        *self.responder.lock() = Some(Arc::new(responder));
    }

    pub(crate) fn disable(&self, operation: Operation) {
        self.unsupported.lock().push(operation);
    }

    pub(crate) fn set_central(&self, central: Central) {
        *self.central.lock() = central;
    }

    pub(crate) fn set_peripherals(&self, peripherals: Vec<Peripheral>) {
        *self.peripherals.lock() = peripherals;
    }

    pub(crate) fn commands(&self) -> Vec<Command> {
        self.commands.lock().clone()
    }

    fn issue(&self, command: Command) -> Result<()> {
        self.commands.lock().push(command.clone());

        let responder = self.responder.lock().clone();
        if let Some(responder) = responder {
            for event in responder(&command) {
                // The receiver only closes when the test is over.
                let _ = self.events.send(event);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl NativeBridge for FakeBridge {
    fn supports(&self, operation: Operation) -> bool {
        !self.unsupported.lock().contains(&operation)
    }

    async fn start_scan(&self, service_uuids: Vec<String>, _options: ScanOptions) -> Result<()> {
        self.central.lock().is_scanning = true;
        self.issue(Command::StartScan(service_uuids))
    }

    async fn stop_scan(&self) -> Result<()> {
        self.central.lock().is_scanning = false;
        self.issue(Command::StopScan)
    }

    fn connect(&self, peripheral_uuid: &str, _options: &ConnectOptions) -> Result<()> {
        self.issue(Command::Connect(peripheral_uuid.to_string()))
    }

    fn disconnect(&self, peripheral_uuid: &str) -> Result<()> {
        self.issue(Command::Disconnect(peripheral_uuid.to_string()))
    }

    fn update_characteristic(&self, request: CharacteristicUpdate) -> Result<()> {
        self.issue(Command::UpdateCharacteristic(request))
    }

    fn update_descriptor(&self, request: DescriptorUpdate) -> Result<()> {
        self.issue(Command::UpdateDescriptor(request))
    }

    fn read_rssi(&self, peripheral_uuid: &str) -> Result<()> {
        self.issue(Command::ReadRssi(peripheral_uuid.to_string()))
    }

    fn discover(&self, request: DiscoverRequest) -> Result<()> {
        self.issue(Command::Discover(request))
    }

    async fn get_peripherals(&self) -> Result<Vec<Peripheral>> {
        Ok(self.peripherals.lock().clone())
    }

    async fn get_central(&self) -> Result<Central> {
        Ok(self.central.lock().clone())
    }
}

/// A session wired to a [`FakeBridge`] with a running event loop.
pub(crate) struct Harness {
    pub(crate) bluetooth: Bluetooth,
    pub(crate) bridge: Arc<FakeBridge>,
    /// Injects events as if the native stack had sent them.
    pub(crate) events: EventSender,
    _event_loop: JoinHandle<()>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_config(BluetoothConfig::default())
    }

    pub(crate) fn with_config(config: BluetoothConfig) -> Self {
        let (events, receiver) = event_channel();
        let bridge = Arc::new(FakeBridge::new(events.clone()));
        let bluetooth = Bluetooth::with_config(bridge.clone(), config);
        let event_loop = bluetooth.spawn_event_loop(receiver);

        Self {
            bluetooth,
            bridge,
            events,
            _event_loop: event_loop,
        }
    }

    pub(crate) fn send(&self, event: NativeEvent) {
        self.events
            .send(event)
            .expect("event loop should be running");
    }
}

/// Poll `condition` until it holds, failing the test after one second.
pub(crate) async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
