//! Events delivered by the native stack.

use crate::error::NativeError;
use crate::identifier::TransactionKey;
use crate::model::{AdvertisementData, Central, Characteristic, Descriptor, Peripheral, Service};

/// Entities carried by a native event.
///
/// Every field is optional; which ones are set depends on the event.
/// This is also the payload a completed transaction resolves with.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct EventData {
    /// Snapshot of a single peripheral.
    pub peripheral: Option<Peripheral>,
    /// Snapshots of several peripherals.
    pub peripherals: Option<Vec<Peripheral>>,
    /// Central snapshot.
    pub central: Option<Central>,
    /// Service the event concerns.
    pub service: Option<Service>,
    /// Characteristic the event concerns.
    pub characteristic: Option<Characteristic>,
    /// Descriptor the event concerns.
    pub descriptor: Option<Descriptor>,
    /// Advertisement seen with the peripheral.
    pub advertisement_data: Option<AdvertisementData>,
    /// Signal strength seen with the peripheral.
    pub rssi: Option<i16>,
}

impl EventData {
    /// Payload carrying one peripheral.
    pub fn with_peripheral(peripheral: Peripheral) -> Self {
        Self {
            peripheral: Some(peripheral),
            ..Default::default()
        }
    }
}

/// What happened, as reported by the native stack.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeEventKind {
    /// A previously issued command finished.
    Completion {
        /// Transaction the command was issued under.
        transaction: TransactionKey,
        /// Failure reported by the native stack, if any.
        error: Option<NativeError>,
    },
    /// A peripheral was seen while scanning.
    PeripheralDiscovered,
    /// A subscribed characteristic pushed a new value, carried in
    /// [`EventData::characteristic`].
    ValueChanged,
    /// The central changed state.
    CentralStateChanged(Central),
    /// Known peripherals were retrieved.
    PeripheralsRetrieved,
    /// Connected peripherals were retrieved.
    ConnectedPeripheralsRetrieved,
    /// An event this crate does not understand.
    Unrecognized(String),
}

/// A single event from the native stack.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeEvent {
    /// Event category.
    pub kind: NativeEventKind,
    /// Entities carried by the event.
    pub data: EventData,
}

impl NativeEvent {
    /// Successful completion of `transaction`.
    pub fn completed(transaction: TransactionKey, data: EventData) -> Self {
        Self {
            kind: NativeEventKind::Completion {
                transaction,
                error: None,
            },
            data,
        }
    }

    /// Failed completion of `transaction`.
    pub fn failed(transaction: TransactionKey, error: NativeError, data: EventData) -> Self {
        Self {
            kind: NativeEventKind::Completion {
                transaction,
                error: Some(error),
            },
            data,
        }
    }

    /// A peripheral seen during a scan.
    pub fn discovered(
        peripheral: Peripheral,
        advertisement_data: Option<AdvertisementData>,
        rssi: Option<i16>,
        central: Option<Central>,
    ) -> Self {
        Self {
            kind: NativeEventKind::PeripheralDiscovered,
            data: EventData {
                peripheral: Some(peripheral),
                central,
                advertisement_data,
                rssi,
                ..Default::default()
            },
        }
    }

    /// A notification or indication from a subscribed characteristic.
    pub fn value_changed(characteristic: Characteristic) -> Self {
        Self {
            kind: NativeEventKind::ValueChanged,
            data: EventData {
                characteristic: Some(characteristic),
                ..Default::default()
            },
        }
    }

    /// The central moved to a new state.
    pub fn central_state_changed(central: Central) -> Self {
        Self {
            kind: NativeEventKind::CentralStateChanged(central.clone()),
            data: EventData {
                central: Some(central),
                ..Default::default()
            },
        }
    }
}
