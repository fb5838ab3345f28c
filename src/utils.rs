//! Utility functions for the ble-central-bridge crate.

use std::collections::HashSet;

use bytes::Bytes;
use data_encoding::BASE64;

use crate::error::{Error, Result};

/// Remove duplicate UUIDs, keeping the first occurrence of each.
///
/// Native scan APIs reject filter lists that name a service twice.
///
/// # Example
///
/// ```
/// use ble_central_bridge::utils::dedup_uuids;
///
/// let uuids = dedup_uuids(&["180D", "180F", "180D"]);
/// assert_eq!(uuids, vec!["180D".to_string(), "180F".to_string()]);
/// ```
pub fn dedup_uuids<S: AsRef<str>>(uuids: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    uuids
        .iter()
        .map(|uuid| AsRef::<str>::as_ref(uuid))
        .filter(|uuid| seen.insert(*uuid))
        .map(str::to_string)
        .collect()
}

/// Encode a binary payload as standard base64.
pub fn encode_base64(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Decode a standard base64 payload.
///
/// # Errors
///
/// Returns [`Error::InvalidData`] if the input is not valid base64.
pub fn decode_base64(encoded: &str) -> Result<Bytes> {
    BASE64
        .decode(encoded.as_bytes())
        .map(Bytes::from)
        .map_err(|e| Error::InvalidData {
            context: format!("invalid base64 payload: {}", e),
        })
}

/// Serde adapter for optional binary values carried as base64 strings.
#[cfg(feature = "serde")]
pub(crate) mod base64_option {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Bytes>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&super::encode_base64(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Bytes>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| super::decode_base64(&encoded).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Serde adapter for maps of base64-encoded binary values.
#[cfg(feature = "serde")]
pub(crate) mod base64_map {
    use std::collections::HashMap;

    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &HashMap<String, Bytes>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            value
                .iter()
                .map(|(key, bytes)| (key, super::encode_base64(bytes))),
        )
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<String, Bytes>, D::Error> {
        Option::<HashMap<String, String>>::deserialize(deserializer)?
            .unwrap_or_default()
            .into_iter()
            .map(|(key, encoded)| {
                super::decode_base64(&encoded)
                    .map(|bytes| (key, bytes))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}
