//! Boundary with the platform-native Bluetooth stack.
//!
//! The native stack is a black box that accepts one-way commands and
//! reports outcomes later through a single event channel. This module
//! defines that contract:
//!
//! - [`NativeBridge`]: outbound commands, with per-operation capability checks
//! - [`NativeEvent`]: the tagged event type delivered back to the dispatcher
//! - [`raw`]: conversion from loosely shaped native payloads into [`NativeEvent`]
//! - [`btleplug`](self::btleplug): a bridge backed by the `btleplug` crate

pub mod btleplug;
pub mod event;
#[cfg(feature = "serde")]
pub mod raw;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::identifier::TransactionTag;
use crate::model::{Central, Peripheral};

pub use event::{EventData, NativeEvent, NativeEventKind};

/// Native operations a bridge may or may not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Start scanning.
    StartScan,
    /// Stop scanning.
    StopScan,
    /// Connect to a peripheral.
    Connect,
    /// Disconnect from a peripheral.
    Disconnect,
    /// Read, write or subscribe to a characteristic.
    UpdateCharacteristic,
    /// Read or write a descriptor.
    UpdateDescriptor,
    /// Read signal strength.
    ReadRssi,
    /// Discover services, characteristics or descriptors.
    Discover,
    /// Fetch the peripherals known to the native stack.
    GetPeripherals,
    /// Fetch the central snapshot.
    GetCentral,
}

impl Operation {
    /// Name of the native method.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartScan => "startScan",
            Self::StopScan => "stopScan",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::UpdateCharacteristic => "updateCharacteristic",
            Self::UpdateDescriptor => "updateDescriptor",
            Self::ReadRssi => "readRSSI",
            Self::Discover => "discover",
            Self::GetPeripherals => "getPeripherals",
            Self::GetCentral => "getCentral",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Options forwarded to the native scan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct ScanOptions {
    /// Report every advertisement instead of coalescing duplicates.
    pub allow_duplicates: bool,
    /// Service UUIDs the peripherals should solicit.
    #[cfg_attr(feature = "serde", serde(rename = "solicitedServiceUUIDs"))]
    pub solicited_service_uuids: Vec<String>,
}

/// Options forwarded to the native connect.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct ConnectOptions {
    /// Alert the user when the peripheral connects while suspended.
    pub notify_on_connection: bool,
    /// Alert the user when the peripheral disconnects while suspended.
    pub notify_on_disconnection: bool,
    /// Alert the user for every notification while suspended.
    pub notify_on_notification: bool,
}

/// Request to read, write or subscribe to a characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicUpdate {
    /// Peripheral UUID.
    pub peripheral_uuid: String,
    /// Service UUID.
    pub service_uuid: String,
    /// Characteristic UUID.
    pub characteristic_uuid: String,
    /// What to do with the characteristic.
    pub property: TransactionTag,
    /// Payload for writes.
    pub data: Option<Bytes>,
    /// Target state for notify/indicate updates.
    pub is_enabled: Option<bool>,
}

/// Request to read or write a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorUpdate {
    /// Peripheral UUID.
    pub peripheral_uuid: String,
    /// Service UUID.
    pub service_uuid: String,
    /// Characteristic UUID.
    pub characteristic_uuid: String,
    /// Descriptor UUID.
    pub descriptor_uuid: String,
    /// What to do with the descriptor.
    pub property: TransactionTag,
    /// Payload for writes.
    pub data: Option<Bytes>,
}

/// Request to discover the children of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverRequest {
    /// Peripheral UUID.
    pub peripheral_uuid: String,
    /// Service whose characteristics should be discovered.
    pub service_uuid: Option<String>,
    /// Characteristic whose descriptors should be discovered.
    pub characteristic_uuid: Option<String>,
    /// Restrict service discovery to these UUIDs.
    pub service_uuids_to_query: Vec<String>,
}

/// Outbound command surface of a native Bluetooth stack.
///
/// One-way commands return as soon as the command was handed to the
/// native layer; their outcome arrives later as a
/// [`NativeEventKind::Completion`] event keyed by the transaction the
/// caller registered. Bridges that only implement part of the surface
/// report the rest through [`NativeBridge::supports`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NativeBridge: Send + Sync {
    /// Whether the bridge implements `operation`.
    fn supports(&self, _operation: Operation) -> bool {
        true
    }

    /// Start scanning. Resolves once the native scan has started.
    async fn start_scan(&self, service_uuids: Vec<String>, options: ScanOptions) -> Result<()>;

    /// Stop scanning.
    async fn stop_scan(&self) -> Result<()>;

    /// Begin connecting to a peripheral.
    fn connect(&self, peripheral_uuid: &str, options: &ConnectOptions) -> Result<()>;

    /// Begin disconnecting from a peripheral.
    fn disconnect(&self, peripheral_uuid: &str) -> Result<()>;

    /// Read, write or subscribe to a characteristic.
    fn update_characteristic(&self, request: CharacteristicUpdate) -> Result<()>;

    /// Read or write a descriptor.
    fn update_descriptor(&self, request: DescriptorUpdate) -> Result<()>;

    /// Request the signal strength of a peripheral.
    fn read_rssi(&self, peripheral_uuid: &str) -> Result<()>;

    /// Discover the children of a node.
    fn discover(&self, request: DiscoverRequest) -> Result<()>;

    /// Peripherals currently known to the native stack.
    async fn get_peripherals(&self) -> Result<Vec<Peripheral>>;

    /// Current central snapshot.
    async fn get_central(&self) -> Result<Central>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::ReadRssi.to_string(), "readRSSI");
        assert_eq!(Operation::UpdateDescriptor.name(), "updateDescriptor");
    }
}
