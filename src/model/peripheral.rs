//! Peripheral snapshots and connection state.

use chrono::{DateTime, Utc};

use super::advertisement::AdvertisementData;
use super::gatt::{Characteristic, Descriptor, Service};
use crate::identifier::NodePath;

/// Connection state for a peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum PeripheralState {
    /// Not connected to the peripheral.
    #[default]
    Disconnected,
    /// Currently attempting to connect.
    Connecting,
    /// Connected to the peripheral.
    Connected,
    /// Currently disconnecting.
    Disconnecting,
}

impl PeripheralState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if in a transitional state.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting | Self::Disconnecting)
    }
}

impl std::fmt::Display for PeripheralState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnecting => write!(f, "disconnecting"),
        }
    }
}

/// Cached view of a remote device.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct Peripheral {
    /// Identifier (same as the UUID for peripherals).
    pub id: String,
    /// Platform UUID of the peripheral.
    pub uuid: String,
    /// Device name, if known.
    pub name: Option<String>,
    /// Connection state.
    pub state: PeripheralState,
    /// Signal strength in dBm.
    pub rssi: Option<i16>,
    /// Last advertisement seen.
    pub advertisement_data: Option<AdvertisementData>,
    /// When the peripheral was first seen.
    pub discovery_timestamp: Option<DateTime<Utc>>,
    /// Discovered services.
    pub services: Vec<Service>,
}

impl Peripheral {
    /// Create a disconnected peripheral snapshot.
    pub fn new(uuid: &str) -> Self {
        Self {
            id: uuid.to_string(),
            uuid: uuid.to_string(),
            ..Default::default()
        }
    }

    /// Set the connection state.
    pub fn with_state(mut self, state: PeripheralState) -> Self {
        self.state = state;
        self
    }

    /// Fold a newer snapshot into this one.
    ///
    /// Discovery timestamp, advertisement data and RSSI survive when the
    /// newer snapshot leaves them unset; every other field is replaced.
    /// The service tree comes from the newer snapshot, but attribute
    /// values it does not report are carried over from this one, and so
    /// are notification flags while the peripheral stays connected.
    pub fn merge(self, newer: Peripheral) -> Peripheral {
        let Peripheral {
            discovery_timestamp,
            advertisement_data,
            rssi,
            services: known_services,
            ..
        } = self;

        let mut merged = Peripheral {
            discovery_timestamp: newer.discovery_timestamp.or(discovery_timestamp),
            advertisement_data: newer.advertisement_data.or(advertisement_data),
            rssi: newer.rssi.or(rssi),
            ..newer
        };

        let connected = merged.state.is_connected();
        for characteristic in merged
            .services
            .iter_mut()
            .flat_map(|s| s.characteristics.iter_mut())
        {
            let known = known_services
                .iter()
                .flat_map(|s| s.characteristics.iter())
                .find(|c| c.id == characteristic.id);
            let Some(known) = known else {
                continue;
            };
            if characteristic.value.is_none() {
                characteristic.value = known.value.clone();
            }
            if connected && known.is_notifying {
                characteristic.is_notifying = true;
            }
            for descriptor in characteristic.descriptors.iter_mut() {
                if descriptor.value.is_none() {
                    descriptor.value = known
                        .descriptors
                        .iter()
                        .find(|d| d.id == descriptor.id)
                        .and_then(|d| d.value.clone());
                }
            }
        }

        merged
    }

    /// Record a characteristic reported by the native stack.
    ///
    /// Services and characteristics missing from the tree are added. A
    /// known characteristic takes the reported value, properties and
    /// descriptors only when they are present.
    pub fn record_characteristic(&mut self, reported: &Characteristic) -> &mut Characteristic {
        let peripheral_uuid = self.uuid.clone();
        let service = self.service_entry(&reported.service_uuid);

        let index = match service
            .characteristics
            .iter()
            .position(|c| c.uuid.eq_ignore_ascii_case(&reported.uuid))
        {
            Some(index) => {
                let existing = &mut service.characteristics[index];
                if reported.value.is_some() {
                    existing.value = reported.value.clone();
                }
                if !reported.properties.is_empty() {
                    existing.properties = reported.properties.clone();
                }
                if !reported.descriptors.is_empty() {
                    existing.descriptors = reported.descriptors.clone();
                }
                index
            }
            None => {
                service.characteristics.push(Characteristic {
                    peripheral_uuid,
                    ..reported.clone()
                });
                service.characteristics.len() - 1
            }
        };

        &mut service.characteristics[index]
    }

    /// Record a descriptor reported by the native stack, adding any
    /// missing ancestors.
    pub fn record_descriptor(&mut self, reported: &Descriptor) {
        let owner = Characteristic::new(
            &self.uuid,
            &reported.service_uuid,
            &reported.characteristic_uuid,
        );
        let characteristic = self.record_characteristic(&owner);

        match characteristic
            .descriptors
            .iter_mut()
            .find(|d| d.uuid.eq_ignore_ascii_case(&reported.uuid))
        {
            Some(existing) => {
                if reported.value.is_some() {
                    existing.value = reported.value.clone();
                }
            }
            None => characteristic.descriptors.push(reported.clone()),
        }
    }

    fn service_entry(&mut self, uuid: &str) -> &mut Service {
        let index = match self
            .services
            .iter()
            .position(|s| s.uuid.eq_ignore_ascii_case(uuid))
        {
            Some(index) => index,
            None => {
                self.services.push(Service::new(&self.uuid, uuid));
                self.services.len() - 1
            }
        };
        &mut self.services[index]
    }

    /// Find a service by UUID.
    pub fn service(&self, uuid: &str) -> Option<&Service> {
        self.services
            .iter()
            .find(|s| s.uuid.eq_ignore_ascii_case(uuid))
    }

    /// Find a characteristic by path.
    pub fn characteristic(&self, path: &NodePath) -> Option<&Characteristic> {
        self.service(path.service_uuid()?)?
            .characteristic(path.characteristic_uuid()?)
    }

    /// Find a descriptor by path.
    pub fn descriptor(&self, path: &NodePath) -> Option<&Descriptor> {
        self.characteristic(path)?
            .descriptor(path.descriptor_uuid()?)
    }

    /// Total number of characteristics across all services.
    pub fn characteristic_count(&self) -> usize {
        self.services.iter().map(|s| s.characteristics.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_peripheral_state() {
        assert!(!PeripheralState::Disconnected.is_connected());
        assert!(PeripheralState::Connected.is_connected());
        assert!(!PeripheralState::Connecting.is_connected());

        assert!(PeripheralState::Connecting.is_transitioning());
        assert!(PeripheralState::Disconnecting.is_transitioning());
        assert!(!PeripheralState::Connected.is_transitioning());
    }

    #[test]
    fn test_peripheral_state_display() {
        assert_eq!(format!("{}", PeripheralState::Connected), "connected");
        assert_eq!(format!("{}", PeripheralState::Disconnected), "disconnected");
    }

    #[test]
    fn test_merge_preserves_sticky_fields() {
        let first_seen = Utc::now();
        let older = Peripheral {
            name: Some("Heart Rate".to_string()),
            rssi: Some(-60),
            advertisement_data: Some(AdvertisementData {
                local_name: Some("HRM".to_string()),
                ..Default::default()
            }),
            discovery_timestamp: Some(first_seen),
            ..Peripheral::new("P1")
        };

        let newer = Peripheral::new("P1").with_state(PeripheralState::Connected);
        let merged = older.clone().merge(newer);

        assert_eq!(merged.state, PeripheralState::Connected);
        assert_eq!(merged.rssi, Some(-60));
        assert_eq!(merged.discovery_timestamp, Some(first_seen));
        assert_eq!(merged.advertisement_data, older.advertisement_data);
        // Non-sticky fields are replaced wholesale.
        assert_eq!(merged.name, None);
    }

    #[test]
    fn test_merge_keeps_unreported_values() {
        let mut characteristic = Characteristic::new("P1", "S1", "C1");
        characteristic.value = Some(Bytes::from_static(&[0x07]));
        characteristic.is_notifying = true;
        let mut descriptor = Descriptor::new("P1", "S1", "C1", "D1");
        descriptor.value = Some(Bytes::from_static(&[0x01, 0x00]));
        characteristic.descriptors.push(descriptor);

        let mut service = Service::new("P1", "S1");
        service.characteristics.push(characteristic);
        let older = Peripheral {
            services: vec![service],
            ..Peripheral::new("P1").with_state(PeripheralState::Connected)
        };

        let mut bare = Characteristic::new("P1", "S1", "C1");
        bare.descriptors.push(Descriptor::new("P1", "S1", "C1", "D1"));
        let mut service = Service::new("P1", "S1");
        service.characteristics.push(bare);
        let newer = Peripheral {
            services: vec![service, Service::new("P1", "S2")],
            ..Peripheral::new("P1").with_state(PeripheralState::Connected)
        };

        let merged = older.clone().merge(newer.clone());
        let path = NodePath::descriptor("P1", "S1", "C1", "D1").unwrap();
        assert_eq!(merged.services.len(), 2);
        let kept = merged.characteristic(&path).unwrap();
        assert_eq!(kept.value, Some(Bytes::from_static(&[0x07])));
        assert!(kept.is_notifying);
        assert_eq!(
            merged.descriptor(&path).unwrap().value,
            Some(Bytes::from_static(&[0x01, 0x00]))
        );

        // Subscriptions end with the connection.
        let disconnected = older.merge(newer.with_state(PeripheralState::Disconnected));
        let kept = disconnected.characteristic(&path).unwrap();
        assert!(!kept.is_notifying);
        assert_eq!(kept.value, Some(Bytes::from_static(&[0x07])));
    }

    #[test]
    fn test_record_characteristic_builds_missing_branches() {
        let mut peripheral = Peripheral::new("P1");
        let reported = Characteristic {
            value: Some(Bytes::from_static(&[0x2a])),
            ..Characteristic::new("P1", "S1", "C1")
        };

        peripheral.record_characteristic(&reported).is_notifying = true;
        let path = NodePath::characteristic("P1", "S1", "C1").unwrap();
        let recorded = peripheral.characteristic(&path).unwrap();
        assert_eq!(recorded.value, Some(Bytes::from_static(&[0x2a])));
        assert!(recorded.is_notifying);
        assert_eq!(peripheral.services[0].id, "P1|S1");

        // A payload without a value leaves the cached one alone.
        peripheral.record_characteristic(&Characteristic::new("P1", "S1", "C1"));
        assert_eq!(peripheral.characteristic_count(), 1);
        assert_eq!(
            peripheral.characteristic(&path).unwrap().value,
            Some(Bytes::from_static(&[0x2a]))
        );
    }

    #[test]
    fn test_record_descriptor() {
        let mut peripheral = Peripheral::new("P1");
        let reported = Descriptor {
            value: Some(Bytes::from_static(&[0x01])),
            ..Descriptor::new("P1", "S1", "C1", "D1")
        };

        peripheral.record_descriptor(&reported);
        peripheral.record_descriptor(&reported);

        let path = NodePath::descriptor("P1", "S1", "C1", "D1").unwrap();
        assert_eq!(peripheral.characteristic(&path).unwrap().descriptors.len(), 1);
        assert_eq!(
            peripheral.descriptor(&path).unwrap().value,
            Some(Bytes::from_static(&[0x01]))
        );
    }

    #[test]
    fn test_find_by_path() {
        let mut characteristic = Characteristic::new("P1", "S1", "C1");
        characteristic
            .descriptors
            .push(Descriptor::new("P1", "S1", "C1", "D1"));
        let mut service = Service::new("P1", "S1");
        service.characteristics.push(characteristic);
        let peripheral = Peripheral {
            services: vec![service],
            ..Peripheral::new("P1")
        };

        let path = NodePath::descriptor("P1", "S1", "C1", "D1").unwrap();
        assert_eq!(peripheral.descriptor(&path).unwrap().id, "P1|S1|C1|D1");
        assert_eq!(peripheral.characteristic(&path).unwrap().id, "P1|S1|C1");
        assert_eq!(peripheral.characteristic_count(), 1);

        let missing = NodePath::characteristic("P1", "S2", "C1").unwrap();
        assert!(peripheral.characteristic(&missing).is_none());
    }
}
