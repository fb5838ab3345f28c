//! Data model mirrored from the native Bluetooth stack.
//!
//! This module contains the central, peripheral and GATT attribute types
//! cached by the entity store and handed to application callbacks.

pub mod advertisement;
pub mod central;
pub mod gatt;
pub mod peripheral;

pub use advertisement::AdvertisementData;
pub use central::{Central, CentralState};
pub use gatt::{Characteristic, CharacteristicProperty, Descriptor, Service};
pub use peripheral::{Peripheral, PeripheralState};
