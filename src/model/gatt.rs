//! GATT attribute snapshots: services, characteristics and descriptors.

use bytes::Bytes;

use crate::identifier::SEPARATOR;

/// Property flags a characteristic can advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum CharacteristicProperty {
    /// Value can be broadcast.
    Broadcast,
    /// Value can be read.
    Read,
    /// Value can be written without a response.
    WriteWithoutResponse,
    /// Value can be written with a response.
    Write,
    /// Value changes can be notified.
    Notify,
    /// Value changes can be indicated.
    Indicate,
    /// Signed writes are supported.
    #[cfg_attr(feature = "serde", serde(rename = "authenticateSignedWrites"))]
    AuthenticatedSignedWrites,
    /// Extended properties descriptor is present.
    ExtendedProperties,
}

/// A descriptor belonging to a characteristic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct Descriptor {
    /// Composite identifier `peripheral|service|characteristic|descriptor`.
    pub id: String,
    /// Descriptor UUID.
    pub uuid: String,
    /// Owning characteristic UUID.
    #[cfg_attr(feature = "serde", serde(rename = "characteristicUUID"))]
    pub characteristic_uuid: String,
    /// Owning service UUID.
    #[cfg_attr(feature = "serde", serde(rename = "serviceUUID"))]
    pub service_uuid: String,
    /// Owning peripheral UUID.
    #[cfg_attr(feature = "serde", serde(rename = "peripheralUUID"))]
    pub peripheral_uuid: String,
    /// Last known value.
    #[cfg_attr(feature = "serde", serde(with = "crate::utils::base64_option"))]
    pub value: Option<Bytes>,
}

impl Descriptor {
    /// Create a descriptor snapshot with a derived identifier.
    pub fn new(
        peripheral_uuid: &str,
        service_uuid: &str,
        characteristic_uuid: &str,
        uuid: &str,
    ) -> Self {
        Self {
            id: join_id(&[peripheral_uuid, service_uuid, characteristic_uuid, uuid]),
            uuid: uuid.to_string(),
            characteristic_uuid: characteristic_uuid.to_string(),
            service_uuid: service_uuid.to_string(),
            peripheral_uuid: peripheral_uuid.to_string(),
            value: None,
        }
    }
}

/// A characteristic belonging to a service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct Characteristic {
    /// Composite identifier `peripheral|service|characteristic`.
    pub id: String,
    /// Characteristic UUID.
    pub uuid: String,
    /// Owning service UUID.
    #[cfg_attr(feature = "serde", serde(rename = "serviceUUID"))]
    pub service_uuid: String,
    /// Owning peripheral UUID.
    #[cfg_attr(feature = "serde", serde(rename = "peripheralUUID"))]
    pub peripheral_uuid: String,
    /// Supported operations.
    pub properties: Vec<CharacteristicProperty>,
    /// Last known value.
    #[cfg_attr(feature = "serde", serde(with = "crate::utils::base64_option"))]
    pub value: Option<Bytes>,
    /// Whether notifications or indications are enabled.
    pub is_notifying: bool,
    /// Discovered descriptors.
    pub descriptors: Vec<Descriptor>,
}

impl Characteristic {
    /// Create a characteristic snapshot with a derived identifier.
    pub fn new(peripheral_uuid: &str, service_uuid: &str, uuid: &str) -> Self {
        Self {
            id: join_id(&[peripheral_uuid, service_uuid, uuid]),
            uuid: uuid.to_string(),
            service_uuid: service_uuid.to_string(),
            peripheral_uuid: peripheral_uuid.to_string(),
            ..Default::default()
        }
    }

    /// Check if a property flag is set.
    pub fn has_property(&self, property: CharacteristicProperty) -> bool {
        self.properties.contains(&property)
    }

    /// Find a descriptor by UUID.
    pub fn descriptor(&self, uuid: &str) -> Option<&Descriptor> {
        self.descriptors
            .iter()
            .find(|d| d.uuid.eq_ignore_ascii_case(uuid))
    }
}

/// A service belonging to a peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct Service {
    /// Composite identifier `peripheral|service`.
    pub id: String,
    /// Service UUID.
    pub uuid: String,
    /// Owning peripheral UUID.
    #[cfg_attr(feature = "serde", serde(rename = "peripheralUUID"))]
    pub peripheral_uuid: String,
    /// Whether this is a primary service.
    pub is_primary: bool,
    /// Discovered characteristics.
    pub characteristics: Vec<Characteristic>,
}

impl Service {
    /// Create a service snapshot with a derived identifier.
    pub fn new(peripheral_uuid: &str, uuid: &str) -> Self {
        Self {
            id: join_id(&[peripheral_uuid, uuid]),
            uuid: uuid.to_string(),
            peripheral_uuid: peripheral_uuid.to_string(),
            is_primary: true,
            characteristics: Vec::new(),
        }
    }

    /// Find a characteristic by UUID.
    pub fn characteristic(&self, uuid: &str) -> Option<&Characteristic> {
        self.characteristics
            .iter()
            .find(|c| c.uuid.eq_ignore_ascii_case(uuid))
    }
}

fn join_id(segments: &[&str]) -> String {
    segments.join(&SEPARATOR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_identifiers() {
        assert_eq!(Service::new("P1", "S1").id, "P1|S1");
        assert_eq!(Characteristic::new("P1", "S1", "C1").id, "P1|S1|C1");
        assert_eq!(Descriptor::new("P1", "S1", "C1", "D1").id, "P1|S1|C1|D1");
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut characteristic = Characteristic::new("P1", "180D", "2A37");
        characteristic.properties = vec![CharacteristicProperty::Notify];
        characteristic
            .descriptors
            .push(Descriptor::new("P1", "180D", "2A37", "2902"));

        let mut service = Service::new("P1", "180D");
        service.characteristics.push(characteristic);

        let found = service.characteristic("2a37").unwrap();
        assert!(found.has_property(CharacteristicProperty::Notify));
        assert!(!found.has_property(CharacteristicProperty::Read));
        assert!(found.descriptor("2902").is_some());
    }
}
