//! Composite identifiers and transaction keys.
//!
//! Every cached entity is addressed by a `|`-delimited chain of UUIDs.
//! The depth of the chain determines the kind of entity:
//!
//! | Segments | Entity         | Example                |
//! |----------|----------------|------------------------|
//! | 1        | Peripheral     | `P1`                   |
//! | 2        | Service        | `P1\|S1`               |
//! | 3        | Characteristic | `P1\|S1\|C1`           |
//! | 4        | Descriptor     | `P1\|S1\|C1\|D1`       |
//!
//! Transaction keys prefix a node path with an operation tag, e.g.
//! `read|P1|S1|C1`.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Separator between identifier segments.
pub const SEPARATOR: char = '|';

/// Maximum number of segments in a node path.
pub const MAX_DEPTH: usize = 4;

/// Kind of entity a node path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A remote device.
    Peripheral,
    /// A GATT service.
    Service,
    /// A GATT characteristic.
    Characteristic,
    /// A GATT descriptor.
    Descriptor,
}

impl NodeKind {
    /// Map a segment count to an entity kind.
    pub fn from_depth(depth: usize) -> Option<Self> {
        match depth {
            1 => Some(Self::Peripheral),
            2 => Some(Self::Service),
            3 => Some(Self::Characteristic),
            4 => Some(Self::Descriptor),
            _ => None,
        }
    }

    /// Number of segments for this kind.
    pub fn depth(&self) -> usize {
        match self {
            Self::Peripheral => 1,
            Self::Service => 2,
            Self::Characteristic => 3,
            Self::Descriptor => 4,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Peripheral => write!(f, "peripheral"),
            Self::Service => write!(f, "service"),
            Self::Characteristic => write!(f, "characteristic"),
            Self::Descriptor => write!(f, "descriptor"),
        }
    }
}

/// Hierarchical path of UUIDs identifying a peripheral or one of its children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    /// Path to a peripheral.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUuid`] if the UUID is empty.
    pub fn peripheral(peripheral_uuid: &str) -> Result<Self> {
        let uuid = validate_uuid("peripheralUUID", peripheral_uuid)?;
        Ok(Self {
            segments: vec![uuid.to_string()],
        })
    }

    /// Path to a characteristic.
    pub fn characteristic(
        peripheral_uuid: &str,
        service_uuid: &str,
        characteristic_uuid: &str,
    ) -> Result<Self> {
        Self::peripheral(peripheral_uuid)?
            .child_named("serviceUUID", service_uuid)?
            .child_named("characteristicUUID", characteristic_uuid)
    }

    /// Path to a descriptor.
    pub fn descriptor(
        peripheral_uuid: &str,
        service_uuid: &str,
        characteristic_uuid: &str,
        descriptor_uuid: &str,
    ) -> Result<Self> {
        Self::characteristic(peripheral_uuid, service_uuid, characteristic_uuid)?
            .child_named("descriptorUUID", descriptor_uuid)
    }

    /// Parse a `|`-delimited identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownIdentifier`] if the identifier has no
    /// segments, more than four segments, or an empty segment.
    pub fn parse(id: &str) -> Result<Self> {
        let segments: Vec<String> = id.split(SEPARATOR).map(str::to_string).collect();

        if segments.len() > MAX_DEPTH || segments.iter().any(|s| s.is_empty()) {
            return Err(Error::UnknownIdentifier { id: id.to_string() });
        }

        Ok(Self { segments })
    }

    /// Extend the path by one level.
    ///
    /// # Errors
    ///
    /// Fails if `uuid` is empty or the path already points at a descriptor.
    pub fn child(&self, uuid: &str) -> Result<Self> {
        self.child_named("uuid", uuid)
    }

    fn child_named(&self, name: &'static str, uuid: &str) -> Result<Self> {
        let uuid = validate_uuid(name, uuid)?;
        if self.segments.len() >= MAX_DEPTH {
            return Err(Error::NoChildren {
                id: self.to_string(),
            });
        }

        let mut segments = self.segments.clone();
        segments.push(uuid.to_string());
        Ok(Self { segments })
    }

    /// The kind of entity this path identifies.
    pub fn kind(&self) -> NodeKind {
        // Constructors keep the depth within 1..=4.
        NodeKind::from_depth(self.segments.len()).unwrap_or(NodeKind::Descriptor)
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Peripheral UUID (always present).
    pub fn peripheral_uuid(&self) -> &str {
        &self.segments[0]
    }

    /// Service UUID, if the path reaches a service.
    pub fn service_uuid(&self) -> Option<&str> {
        self.segments.get(1).map(String::as_str)
    }

    /// Characteristic UUID, if the path reaches a characteristic.
    pub fn characteristic_uuid(&self) -> Option<&str> {
        self.segments.get(2).map(String::as_str)
    }

    /// Descriptor UUID, if the path reaches a descriptor.
    pub fn descriptor_uuid(&self) -> Option<&str> {
        self.segments.get(3).map(String::as_str)
    }

    /// Path truncated to the owning peripheral.
    pub fn to_peripheral(&self) -> Self {
        Self {
            segments: self.segments[..1].to_vec(),
        }
    }

    /// Segments of the path, peripheral first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("|"))
    }
}

impl FromStr for NodePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Operation tag prefixed to every transaction key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum TransactionTag {
    /// Connect to a peripheral.
    Connect,
    /// Disconnect from a peripheral.
    Disconnect,
    /// Read the signal strength of a connected peripheral.
    Rssi,
    /// Attribute discovery. Travels as `scan` on the wire.
    #[cfg_attr(feature = "serde", serde(rename = "scan"))]
    Discover,
    /// Read a characteristic or descriptor value.
    Read,
    /// Write with response.
    Write,
    /// Write without response.
    WriteWithoutResponse,
    /// Enable or disable notifications.
    Notify,
    /// Enable or disable indications.
    Indicate,
}

impl TransactionTag {
    /// All tags, in declaration order.
    pub const ALL: [TransactionTag; 9] = [
        Self::Connect,
        Self::Disconnect,
        Self::Rssi,
        Self::Discover,
        Self::Read,
        Self::Write,
        Self::WriteWithoutResponse,
        Self::Notify,
        Self::Indicate,
    ];

    /// The tag as it appears in a transaction key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Rssi => "rssi",
            Self::Discover => "scan",
            Self::Read => "read",
            Self::Write => "write",
            Self::WriteWithoutResponse => "writeWithoutResponse",
            Self::Notify => "notify",
            Self::Indicate => "indicate",
        }
    }

    /// Parse a wire tag.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.as_str() == name)
    }

    /// Whether the native layer acknowledges this operation with an event.
    pub fn expects_response(&self) -> bool {
        !matches!(self, Self::WriteWithoutResponse)
    }
}

impl fmt::Display for TransactionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Correlation key linking an issued command to its completion event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionKey {
    tag: TransactionTag,
    path: NodePath,
}

impl TransactionKey {
    /// Build a key from a tag and a target path.
    pub fn new(tag: TransactionTag, path: NodePath) -> Self {
        Self { tag, path }
    }

    /// The operation tag.
    pub fn tag(&self) -> TransactionTag {
        self.tag
    }

    /// The target path.
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Parse a key of the form `tag|uuid[|uuid...]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownIdentifier`] for unknown tags or malformed paths.
    pub fn parse(key: &str) -> Result<Self> {
        let (tag, path) = key
            .split_once(SEPARATOR)
            .ok_or_else(|| Error::UnknownIdentifier {
                id: key.to_string(),
            })?;

        let tag = TransactionTag::from_name(tag).ok_or_else(|| Error::UnknownIdentifier {
            id: key.to_string(),
        })?;

        let path = NodePath::parse(path).map_err(|_| Error::UnknownIdentifier {
            id: key.to_string(),
        })?;

        Ok(Self { tag, path })
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.tag, SEPARATOR, self.path)
    }
}

impl FromStr for TransactionKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Reject empty UUID arguments.
pub(crate) fn validate_uuid<'a>(name: &'static str, uuid: &'a str) -> Result<&'a str> {
    if uuid.is_empty() || uuid.contains(SEPARATOR) {
        return Err(Error::InvalidUuid { name });
    }
    Ok(uuid)
}

/// Peripheral UUID of any composite identifier.
pub fn peripheral_id_from_id(id: &str) -> &str {
    id.split(SEPARATOR).next().unwrap_or(id)
}
