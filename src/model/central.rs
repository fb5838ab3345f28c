//! Central (local adapter) state.

/// Power and authorization state of the local Bluetooth adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum CentralState {
    /// Powered on and ready.
    PoweredOn,
    /// Powered off.
    PoweredOff,
    /// The connection with the system service was momentarily lost.
    Resetting,
    /// The application is not authorized to use Bluetooth.
    Unauthorized,
    /// The platform does not support Bluetooth Low Energy.
    Unsupported,
    /// State not yet known.
    #[default]
    Unknown,
}

impl CentralState {
    /// Whether peripherals cached under the previous state can still be trusted.
    ///
    /// Power transitions keep the cache; every other state means the
    /// platform has discarded its peripheral handles.
    pub fn keeps_peripherals_valid(&self) -> bool {
        matches!(self, Self::PoweredOn | Self::PoweredOff)
    }

    /// Check if the adapter can be used.
    pub fn is_powered_on(&self) -> bool {
        matches!(self, Self::PoweredOn)
    }
}

impl std::fmt::Display for CentralState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PoweredOn => write!(f, "poweredOn"),
            Self::PoweredOff => write!(f, "poweredOff"),
            Self::Resetting => write!(f, "resetting"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Snapshot of the local central.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct Central {
    /// Adapter state.
    pub state: CentralState,
    /// Whether a scan is running.
    pub is_scanning: bool,
}

impl Central {
    /// Create a central snapshot.
    pub fn new(state: CentralState, is_scanning: bool) -> Self {
        Self { state, is_scanning }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peripheral_validity() {
        assert!(CentralState::PoweredOn.keeps_peripherals_valid());
        assert!(CentralState::PoweredOff.keeps_peripherals_valid());
        assert!(!CentralState::Unauthorized.keeps_peripherals_valid());
        assert!(!CentralState::Unsupported.keeps_peripherals_valid());
        assert!(!CentralState::Resetting.keeps_peripherals_valid());
        assert!(!CentralState::Unknown.keeps_peripherals_valid());
    }

    #[test]
    fn test_central_state_display() {
        assert_eq!(CentralState::PoweredOn.to_string(), "poweredOn");
        assert_eq!(CentralState::default(), CentralState::Unknown);
    }
}
