//! Error types.
//!
//! Configuration faults are detected once at init and leave the host running
//! with the protection features disabled. Protective faults (unexpected probe
//! contact, spindle start with a probe attached) are not errors in this
//! sense: they are escalated to the host as a stop command and never
//! surface as `Err`.

use crate::messages::{MSG_INIT_FAILED, MSG_PORT_UNAVAILABLE};
use crate::traits::PortId;

/// Failure talking to the settings store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NvsError {
    /// The slot could not be read (never written, or device error).
    #[error("settings read failed")]
    Read,
    /// The slot could not be written.
    #[error("settings write failed")]
    Write,
}

/// A persisted settings record that could not be decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Buffer shorter than a settings record.
    #[error("settings record truncated: {len} bytes")]
    Truncated {
        /// Bytes available.
        len: usize,
    },
    /// Stored checksum does not match the payload.
    #[error("settings record checksum mismatch")]
    Checksum,
}

/// Which input a port was requested for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortRole {
    /// External "probe connected" sense input.
    Connect,
    /// Alternate tool-setter probe input.
    ToolProbe,
}

impl core::fmt::Display for PortRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PortRole::Connect => f.write_str("probe connected"),
            PortRole::ToolProbe => f.write_str("tool probe"),
        }
    }
}

/// Configuration fault raised while bringing the protection up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProtectError {
    /// The host has no digital inputs left.
    #[error("no digital input ports available")]
    NoPortsAvailable,
    /// A configured port could not be claimed.
    #[error("{role} port {port} is not available")]
    PortUnavailable {
        /// Requested port.
        port: PortId,
        /// What the port was for.
        role: PortRole,
    },
    /// The settings store refused to allocate a record.
    #[error("settings storage allocation failed")]
    NvsAllocFailed,
    /// Saving the settings record failed.
    #[error(transparent)]
    Nvs(#[from] NvsError),
}

impl ProtectError {
    /// Boot-time warning text reported to the user for this fault.
    pub fn boot_warning(&self) -> &'static str {
        match self {
            ProtectError::PortUnavailable { .. } => MSG_PORT_UNAVAILABLE,
            _ => MSG_INIT_FAILED,
        }
    }
}
