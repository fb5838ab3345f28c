//! Session configuration.

use std::time::Duration;

/// Behaviour switches for a [`Bluetooth`](crate::Bluetooth) session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BluetoothConfig {
    /// Clear the peripheral cache when the central enters a state other
    /// than powered on or powered off.
    ///
    /// Apple platforms drop every peripheral handle in those states, so
    /// this defaults to `true` there and `false` elsewhere.
    pub invalidate_on_untrusted_state: bool,
    /// Deadline applied to `connect` calls that do not pass their own.
    pub default_connect_timeout: Option<Duration>,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            invalidate_on_untrusted_state: cfg!(any(target_os = "ios", target_os = "macos")),
            default_connect_timeout: None,
        }
    }
}

impl BluetoothConfig {
    /// Set whether untrusted central states clear the cache.
    pub fn with_invalidate_on_untrusted_state(mut self, enabled: bool) -> Self {
        self.invalidate_on_untrusted_state = enabled;
        self
    }

    /// Set the default connect deadline.
    pub fn with_default_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_connect_timeout = timeout;
        self
    }
}
