//! Loosely shaped native event records.
//!
//! Native stacks that talk through a message channel deliver events as
//! `{ "event": NAME, "data": { ... } }` records with camelCase keys and
//! base64-encoded values. [`RawEvent`] is that record; converting it with
//! [`TryFrom`] produces the tagged [`NativeEvent`] the dispatcher routes.

use serde::{Deserialize, Serialize};

use super::event::{EventData, NativeEvent, NativeEventKind};
use crate::error::{Error, NativeError, Result};
use crate::identifier::TransactionKey;

/// A peripheral was seen while scanning.
pub const CENTRAL_DID_DISCOVER_PERIPHERAL: &str = "CENTRAL_DID_DISCOVER_PERIPHERAL";
/// The central changed state.
pub const CENTRAL_DID_UPDATE_STATE: &str = "CENTRAL_DID_UPDATE_STATE";
/// A characteristic value arrived. Without a transaction id this is a
/// notification from a subscribed characteristic.
pub const PERIPHERAL_DID_UPDATE_VALUE_FOR_CHARACTERISTIC: &str =
    "PERIPHERAL_DID_UPDATE_VALUE_FOR_CHARACTERISTIC";
/// Known peripherals were retrieved.
pub const CENTRAL_DID_RETRIEVE_PERIPHERALS: &str = "CENTRAL_DID_RETRIEVE_PERIPHERALS";
/// Connected peripherals were retrieved.
pub const CENTRAL_DID_RETRIEVE_CONNECTED_PERIPHERALS: &str =
    "CENTRAL_DID_RETRIEVE_CONNECTED_PERIPHERALS";

/// One event record as sent by the native layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawEvent {
    /// Native event name.
    pub event: String,
    /// Event payload.
    #[serde(default)]
    pub data: RawEventData,
}

/// Payload of a [`RawEvent`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEventData {
    /// Key of the transaction this event completes, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Failure reported for the transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<NativeError>,
    /// Entities carried alongside.
    #[serde(flatten)]
    pub entities: EventData,
}

impl TryFrom<RawEvent> for NativeEvent {
    type Error = Error;

    /// Records with a transaction id become completions regardless of
    /// their name; the rest are routed by name.
    fn try_from(raw: RawEvent) -> Result<Self> {
        let RawEvent { event, data } = raw;
        let RawEventData {
            transaction_id,
            error,
            entities,
        } = data;

        if let Some(id) = transaction_id {
            let transaction = TransactionKey::parse(&id)?;
            return Ok(NativeEvent {
                kind: NativeEventKind::Completion { transaction, error },
                data: entities,
            });
        }

        let kind = match event.as_str() {
            CENTRAL_DID_DISCOVER_PERIPHERAL => NativeEventKind::PeripheralDiscovered,
            CENTRAL_DID_UPDATE_STATE => {
                let central = entities.central.clone().ok_or_else(|| Error::InvalidData {
                    context: format!("central not defined while processing {}", event),
                })?;
                NativeEventKind::CentralStateChanged(central)
            }
            PERIPHERAL_DID_UPDATE_VALUE_FOR_CHARACTERISTIC => NativeEventKind::ValueChanged,
            CENTRAL_DID_RETRIEVE_PERIPHERALS => NativeEventKind::PeripheralsRetrieved,
            CENTRAL_DID_RETRIEVE_CONNECTED_PERIPHERALS => {
                NativeEventKind::ConnectedPeripheralsRetrieved
            }
            _ => NativeEventKind::Unrecognized(event.clone()),
        };

        Ok(NativeEvent {
            kind,
            data: entities,
        })
    }
}
