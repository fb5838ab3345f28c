// Allow derivable impls for clarity
#![allow(clippy::derivable_impls)]

//! # ble-central-bridge
//!
//! A Bluetooth Low Energy central API layered over a native Bluetooth
//! stack that only speaks in one-way commands and asynchronous events.
//!
//! Every call that needs an answer registers a transaction under a
//! structured key (`tag|peripheral|service|characteristic|descriptor`),
//! issues the native command and waits. The native stack reports back
//! through a single event channel; the dispatcher updates the peripheral
//! cache, notifies observers and settles the matching transaction.
//!
//! ## Features
//!
//! - **Scanning**: Scan with service filters and per-result callbacks
//! - **Connections**: Connect with an optional deadline, disconnect
//! - **GATT access**: Read, write and subscribe to characteristics and descriptors
//! - **Discovery**: Discover services, characteristics and descriptors, or a whole tree at once
//! - **Peripheral cache**: Merged snapshots of every peripheral the stack has reported
//! - **Observers**: Central state changes and cache updates
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ble_central_bridge::{event_channel, Bluetooth, BtleplugBridge, Result, ScanOptions};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let (events, receiver) = event_channel();
//!     let bridge = BtleplugBridge::new(events).await?;
//!
//!     let bluetooth = Bluetooth::new(Arc::new(bridge));
//!     bluetooth.spawn_event_loop(receiver);
//!
//!     let _scan = bluetooth
//!         .start_scan_with_callback(&["180D"], ScanOptions::default(), |result| {
//!             if let Some(peripheral) = &result.peripheral {
//!                 println!("Found {} ({:?})", peripheral.id, peripheral.name);
//!             }
//!         })
//!         .await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!     bluetooth.stop_scan().await?;
//!
//!     for (id, peripheral) in bluetooth.peripherals() {
//!         println!("{}: rssi {:?}", id, peripheral.rssi);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Custom native stacks
//!
//! Implement [`NativeBridge`] to drive another stack. Commands that expect
//! an answer must eventually produce a [`NativeEvent`] completion keyed
//! with the same [`TransactionKey`] the façade registered. With the
//! `serde` feature, [`RawEvent`] decodes JSON-shaped native records.
//!
//! ## Feature Flags
//!
//! - `serde` (default): Serialization for data types and the raw event adapter

// Public modules
pub mod bluetooth;
pub mod bridge;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod identifier;
pub mod model;
pub mod observers;
pub mod store;
pub mod transaction;
pub mod utils;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use bluetooth::Bluetooth;
pub use config::BluetoothConfig;
pub use dispatcher::{event_channel, EventReceiver, EventSender, Session};
pub use error::{Error, NativeError, Result};
pub use identifier::{NodeKind, NodePath, TransactionKey, TransactionTag};
pub use observers::{CallbackHandle, ObserverCategory, ScanResult};

// Re-export commonly used types from submodules
pub use bridge::btleplug::BtleplugBridge;
#[cfg(feature = "serde")]
pub use bridge::raw::RawEvent;
pub use bridge::{
    CharacteristicUpdate, ConnectOptions, DescriptorUpdate, DiscoverRequest, EventData,
    NativeBridge, NativeEvent, NativeEventKind, Operation, ScanOptions,
};
pub use model::{
    AdvertisementData, Central, CentralState, Characteristic, CharacteristicProperty, Descriptor,
    Peripheral, PeripheralState, Service,
};
