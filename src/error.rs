//! Error types for the ble-central-bridge crate.

use std::time::Duration;

use thiserror::Error;

use crate::bridge::Operation;

/// Failure reported by the native Bluetooth stack for a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct NativeError {
    /// Human readable message.
    pub message: String,
    /// Platform error code.
    pub code: String,
    /// Error domain, when the platform reports one.
    pub domain: Option<String>,
    /// Failure reason.
    pub reason: Option<String>,
    /// Recovery suggestion.
    pub suggestion: Option<String>,
    /// Description of the underlying platform error.
    #[cfg_attr(feature = "serde", serde(alias = "underlayingError"))]
    pub underlying_error: Option<String>,
}

impl NativeError {
    /// Create a native error with a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            ..Self::default()
        }
    }
}

impl std::fmt::Display for NativeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)?;
        if let Some(reason) = &self.reason {
            write!(f, ": {}", reason)?;
        }
        Ok(())
    }
}

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// The native bridge does not implement the requested operation.
    #[error("The method {operation} is not available on this platform")]
    Unavailable {
        /// The missing native operation.
        operation: Operation,
    },

    /// A required UUID argument was missing or empty.
    #[error("Invalid UUID provided for {name}")]
    InvalidUuid {
        /// Name of the argument that failed validation.
        name: &'static str,
    },

    /// The native stack reported a failure for a transaction.
    #[error("Native operation failed: {0}")]
    Native(NativeError),

    /// The operation did not settle before its deadline.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// The dispatcher received an event it does not know how to route.
    #[error("Unhandled native event: {event}")]
    UnhandledEvent {
        /// Name of the unrecognized event.
        event: String,
    },

    /// A composite identifier could not be parsed.
    #[error("Unknown identifier: {id}")]
    UnknownIdentifier {
        /// The identifier that was rejected.
        id: String,
    },

    /// Children were requested for a descriptor.
    #[error("Descriptors have no children: {id}")]
    NoChildren {
        /// The descriptor identifier.
        id: String,
    },

    /// The peripheral is not in the cache.
    #[error("Peripheral not found: {id}")]
    PeripheralNotFound {
        /// The identifier that was searched for.
        id: String,
    },

    /// A completion arrived without the entity the operation asked for.
    #[error("Not able to read {entity}: {id}")]
    MissingPayload {
        /// Which entity was expected.
        entity: &'static str,
        /// Identifier of the target.
        id: String,
    },

    /// The pending transaction was dropped before it settled.
    #[error("Transaction dropped before completion: {key}")]
    TransactionDropped {
        /// The transaction key.
        key: String,
    },

    /// Invalid data was received from the native layer.
    #[error("Invalid data received: {context}")]
    InvalidData {
        /// Description of what was invalid about the data.
        context: String,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<NativeError> for Error {
    fn from(error: NativeError) -> Self {
        Error::Native(error)
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
