//! Aggregation of independent "probe connected" sources.
//!
//! Four sources can say a probe is attached:
//!
//! | Source | Set by | Enabled by |
//! |--------|--------|------------|
//! | external pin | debounced connect input | `use_ext_pin` |
//! | manual command | M401 / M402 | always |
//! | reserved tool slot | selecting the probe tool | `t99_protect_enabled` |
//! | toggle request | operator toggle | always |
//!
//! The logical state is the OR of the enabled sources. It is derived on every
//! read and never cached; the only stored aggregate is the last value that
//! was *broadcast*, which is what edges are measured against. Each mutating
//! call returns the resulting [`ConnectionEdge`], if any, so the caller can
//! arm or disarm the interlock and report exactly one message per edge.
//!
//! ```rust
//! use probe_protect::connection::{ConnectionConfig, ConnectionSource, ConnectionState};
//!
//! let mut state = ConnectionState::new(ConnectionConfig::default());
//!
//! let edge = state.set_manual(true).unwrap().unwrap();
//! assert!(edge.connected);
//! assert_eq!(edge.cause, ConnectionSource::Manual);
//!
//! // Asserting twice is a user error, not a second edge
//! assert!(state.set_manual(true).is_err());
//! assert!(state.is_connected());
//! ```

use crate::config::ProtectionFlags;

/// What caused a connection edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConnectionSource {
    /// Debounced external connect pin.
    ExternalPin,
    /// M401 / M402.
    Manual,
    /// Reserved probe tool selected or deselected.
    ToolSlot,
    /// Operator toggle.
    Toggle,
    /// Re-evaluation without a source change (settings, broadcast).
    Broadcast,
    /// Latched sources cleared by a controller reset.
    Reset,
}

/// A change of the logical connected state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectionEdge {
    /// New logical state.
    pub connected: bool,
    /// Source whose change produced the edge.
    pub cause: ConnectionSource,
}

/// Which sources participate, and the connect pin polarity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// The external pin contributes.
    pub use_external_pin: bool,
    /// The external pin is active low.
    pub invert_external_pin: bool,
    /// The reserved tool slot contributes.
    pub use_reserved_tool_slot: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::from_flags(&ProtectionFlags::default().with_t99_protect(true))
    }
}

impl ConnectionConfig {
    /// Derive from the persisted feature flags.
    pub fn from_flags(flags: &ProtectionFlags) -> Self {
        Self {
            use_external_pin: flags.use_ext_pin,
            invert_external_pin: flags.invert_ext_pin,
            use_reserved_tool_slot: flags.t99_protect_enabled,
        }
    }
}

/// Raw per-source flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubFlags {
    /// Connect pin asserted (polarity applied).
    pub external_pin: bool,
    /// M401 active.
    pub manual_command: bool,
    /// Reserved probe tool selected.
    pub reserved_tool_slot: bool,
    /// Operator toggle active.
    pub toggle_request: bool,
}

/// A manual request that would not change anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("manual probe connect already {}", if *requested { "asserted" } else { "cleared" })]
pub struct RedundantRequest {
    /// The state that was requested.
    pub requested: bool,
}

/// The aggregated probe-connected state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionState {
    config: ConnectionConfig,
    flags: SubFlags,
    broadcast: bool,
}

impl ConnectionState {
    /// Everything disconnected.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            flags: SubFlags::default(),
            broadcast: false,
        }
    }

    /// Current source configuration.
    pub fn config(&self) -> ConnectionConfig {
        self.config
    }

    /// Replace the source configuration.
    ///
    /// Does not broadcast; follow with [`notify_toggle`](Self::notify_toggle).
    pub fn set_config(&mut self, config: ConnectionConfig) {
        self.config = config;
    }

    /// Raw per-source flags.
    pub fn sub_flags(&self) -> SubFlags {
        self.flags
    }

    /// OR of the enabled sources, derived now.
    pub fn is_connected(&self) -> bool {
        (self.config.use_external_pin && self.flags.external_pin)
            || self.flags.manual_command
            || (self.config.use_reserved_tool_slot && self.flags.reserved_tool_slot)
            || self.flags.toggle_request
    }

    /// Last broadcast state.
    pub fn broadcast_state(&self) -> bool {
        self.broadcast
    }

    fn commit(&mut self, cause: ConnectionSource) -> Option<ConnectionEdge> {
        let connected = self.is_connected();
        if connected == self.broadcast {
            return None;
        }
        self.broadcast = connected;
        Some(ConnectionEdge { connected, cause })
    }

    /// Debounced connect pin level (raw, before polarity).
    pub fn set_external_pin(&mut self, raw: bool) -> Option<ConnectionEdge> {
        self.flags.external_pin = raw != self.config.invert_external_pin;
        self.commit(ConnectionSource::ExternalPin)
    }

    /// M401 (`true`) / M402 (`false`).
    pub fn set_manual(
        &mut self,
        connected: bool,
    ) -> Result<Option<ConnectionEdge>, RedundantRequest> {
        if self.flags.manual_command == connected {
            return Err(RedundantRequest {
                requested: connected,
            });
        }
        self.flags.manual_command = connected;
        Ok(self.commit(ConnectionSource::Manual))
    }

    /// Reserved probe tool selected (`true`) or not.
    pub fn set_reserved_tool_slot(&mut self, active: bool) -> Option<ConnectionEdge> {
        self.flags.reserved_tool_slot = active;
        self.commit(ConnectionSource::ToolSlot)
    }

    /// Set the operator toggle source.
    pub fn set_toggle_request(&mut self, active: bool) -> Option<ConnectionEdge> {
        self.flags.toggle_request = active;
        self.commit(ConnectionSource::Toggle)
    }

    /// Flip the operator toggle source.
    pub fn toggle(&mut self) -> Option<ConnectionEdge> {
        self.set_toggle_request(!self.flags.toggle_request)
    }

    /// Re-derive and broadcast without touching any source.
    pub fn notify_toggle(&mut self) -> Option<ConnectionEdge> {
        self.commit(ConnectionSource::Broadcast)
    }

    /// Clear the manual and reserved-tool sources.
    pub fn clear_latched(&mut self) -> Option<ConnectionEdge> {
        self.flags.manual_command = false;
        self.flags.reserved_tool_slot = false;
        self.commit(ConnectionSource::Reset)
    }
}
