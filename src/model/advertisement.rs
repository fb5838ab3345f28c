//! Advertisement data received while scanning.

use std::collections::HashMap;

use bytes::Bytes;

/// Broadcast metadata seen for a peripheral before connecting.
///
/// Binary fields travel as base64 strings at the native boundary.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct AdvertisementData {
    /// Advertised local name.
    pub local_name: Option<String>,
    /// Raw manufacturer-specific data, company identifier first.
    #[cfg_attr(feature = "serde", serde(with = "crate::utils::base64_option"))]
    pub manufacturer_data: Option<Bytes>,
    /// Service data keyed by service UUID.
    #[cfg_attr(feature = "serde", serde(with = "crate::utils::base64_map"))]
    pub service_data: HashMap<String, Bytes>,
    /// Advertised service UUIDs.
    #[cfg_attr(feature = "serde", serde(rename = "serviceUUIDs"))]
    pub service_uuids: Vec<String>,
    /// Service UUIDs found in the overflow area.
    #[cfg_attr(feature = "serde", serde(rename = "overflowServiceUUIDs"))]
    pub overflow_service_uuids: Vec<String>,
    /// Solicited service UUIDs.
    #[cfg_attr(feature = "serde", serde(rename = "solicitedServiceUUIDs"))]
    pub solicited_service_uuids: Vec<String>,
    /// Transmit power level in dBm.
    pub tx_power_level: Option<i16>,
    /// Whether the advertiser accepts connections.
    pub is_connectable: Option<bool>,
}

impl AdvertisementData {
    /// Check whether a service UUID is advertised.
    pub fn advertises_service(&self, uuid: &str) -> bool {
        self.service_uuids
            .iter()
            .chain(&self.overflow_service_uuids)
            .any(|s| s.eq_ignore_ascii_case(uuid))
    }

    /// Bluetooth SIG company identifier from the manufacturer data.
    pub fn company_identifier(&self) -> Option<u16> {
        match self.manufacturer_data.as_deref() {
            Some([lo, hi, ..]) => Some(u16::from_le_bytes([*lo, *hi])),
            _ => None,
        }
    }
}
