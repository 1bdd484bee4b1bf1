//! Protection settings and their persisted record.
//!
//! In memory the settings are plain named booleans. They are bit-packed only
//! when written to the host's NVS via [`ProtectionConfig::to_record`].
//!
//! # Example
//!
//! ```rust
//! use probe_protect::config::{ProtectionConfig, ProtectionFlags};
//!
//! // Defaults for a controller with 4 auxiliary inputs
//! let config = ProtectionConfig::defaults_for(4);
//! assert_eq!(config.connect_port, 3);
//! assert!(config.flags.motion_protect_enabled);
//! assert!(config.flags.t99_protect_enabled);
//! assert!(!config.flags.use_ext_pin);
//!
//! // Or customize
//! let config = ProtectionConfig::defaults_for(4)
//!     .with_connect_port(1)
//!     .with_flags(ProtectionFlags::default().with_ext_pin(true, false))
//!     .with_debounce_ms(20);
//!
//! let record = config.to_record();
//! assert_eq!(ProtectionConfig::from_record(&record), Ok(config));
//! ```

use crate::error::RecordError;
use crate::traits::{PortId, ToolId};

/// Tool number that, by convention, means "the probe is in the spindle".
pub const RESERVED_PROBE_TOOL: ToolId = 99;

/// Default contact settle time in milliseconds.
///
/// Increase if the connect relay is slow or bouncy.
pub const DEFAULT_DEBOUNCE_MS: u16 = 50;

/// Size of the persisted settings record in bytes.
pub const RECORD_LEN: usize = 7;

// ============================================================================
// Flags
// ============================================================================

/// Feature switches for the protection logic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProtectionFlags {
    /// Flip the probe-pin inversion while probing the tool-setter fixture.
    pub invert_tool_probe: bool,
    /// Sense "probe connected" from the external connect port.
    pub use_ext_pin: bool,
    /// Connect port is active low.
    pub invert_ext_pin: bool,
    /// Read the tool-setter from its own port during fixture probing.
    pub use_tool_pin: bool,
    /// Tool-setter port is active low.
    pub invert_tool_pin: bool,
    /// Halt motion on unexpected probe contact while connected.
    pub motion_protect_enabled: bool,
    /// Treat selecting the reserved probe tool as "probe connected".
    pub t99_protect_enabled: bool,
    /// Suspend hard limits while probing the tool-setter fixture.
    pub fixture_hard_limits: bool,
}

impl ProtectionFlags {
    const INVERT_TOOL_PROBE: u16 = 1 << 0;
    const USE_EXT_PIN: u16 = 1 << 1;
    const INVERT_EXT_PIN: u16 = 1 << 2;
    const USE_TOOL_PIN: u16 = 1 << 3;
    const INVERT_TOOL_PIN: u16 = 1 << 4;
    const MOTION_PROTECT: u16 = 1 << 5;
    const T99_PROTECT: u16 = 1 << 6;
    const FIXTURE_HARD_LIMITS: u16 = 1 << 7;

    /// Packs the flags for persistence.
    pub const fn to_bits(&self) -> u16 {
        let mut bits = 0;
        if self.invert_tool_probe {
            bits |= Self::INVERT_TOOL_PROBE;
        }
        if self.use_ext_pin {
            bits |= Self::USE_EXT_PIN;
        }
        if self.invert_ext_pin {
            bits |= Self::INVERT_EXT_PIN;
        }
        if self.use_tool_pin {
            bits |= Self::USE_TOOL_PIN;
        }
        if self.invert_tool_pin {
            bits |= Self::INVERT_TOOL_PIN;
        }
        if self.motion_protect_enabled {
            bits |= Self::MOTION_PROTECT;
        }
        if self.t99_protect_enabled {
            bits |= Self::T99_PROTECT;
        }
        if self.fixture_hard_limits {
            bits |= Self::FIXTURE_HARD_LIMITS;
        }
        bits
    }

    /// Unpacks persisted flags. Unknown bits are ignored.
    pub const fn from_bits(bits: u16) -> Self {
        Self {
            invert_tool_probe: bits & Self::INVERT_TOOL_PROBE != 0,
            use_ext_pin: bits & Self::USE_EXT_PIN != 0,
            invert_ext_pin: bits & Self::INVERT_EXT_PIN != 0,
            use_tool_pin: bits & Self::USE_TOOL_PIN != 0,
            invert_tool_pin: bits & Self::INVERT_TOOL_PIN != 0,
            motion_protect_enabled: bits & Self::MOTION_PROTECT != 0,
            t99_protect_enabled: bits & Self::T99_PROTECT != 0,
            fixture_hard_limits: bits & Self::FIXTURE_HARD_LIMITS != 0,
        }
    }

    /// Enable the external connect pin with the given polarity.
    pub fn with_ext_pin(mut self, enabled: bool, inverted: bool) -> Self {
        self.use_ext_pin = enabled;
        self.invert_ext_pin = inverted;
        self
    }

    /// Enable the tool-setter pin with the given polarity.
    pub fn with_tool_pin(mut self, enabled: bool, inverted: bool) -> Self {
        self.use_tool_pin = enabled;
        self.invert_tool_pin = inverted;
        self
    }

    /// Flip probe-pin inversion during fixture probing.
    pub fn with_invert_tool_probe(mut self, enabled: bool) -> Self {
        self.invert_tool_probe = enabled;
        self
    }

    /// Enable or disable the motion interlock.
    pub fn with_motion_protect(mut self, enabled: bool) -> Self {
        self.motion_protect_enabled = enabled;
        self
    }

    /// Enable or disable the reserved tool convention.
    pub fn with_t99_protect(mut self, enabled: bool) -> Self {
        self.t99_protect_enabled = enabled;
        self
    }

    /// Suspend hard limits during fixture probing.
    pub fn with_fixture_hard_limits(mut self, enabled: bool) -> Self {
        self.fixture_hard_limits = enabled;
        self
    }
}

// ============================================================================
// Main Config
// ============================================================================

/// Persisted protection settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProtectionConfig {
    /// Input used for external "probe connected" sensing.
    pub connect_port: PortId,
    /// Input wired to the tool-setter fixture.
    pub toolprobe_port: PortId,
    /// Feature switches.
    pub flags: ProtectionFlags,
    /// Contact settle time in milliseconds.
    pub debounce_ms: u16,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self::defaults_for(0)
    }
}

impl ProtectionConfig {
    /// Restored defaults for a host with `num_ports` inputs.
    ///
    /// Both ports point at the highest numbered input, no pin is in use,
    /// motion and reserved-tool protection are on.
    pub fn defaults_for(num_ports: u8) -> Self {
        let port = num_ports.saturating_sub(1);
        Self {
            connect_port: port,
            toolprobe_port: port,
            flags: ProtectionFlags::default()
                .with_motion_protect(true)
                .with_t99_protect(true),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }

    /// Set the connect port
    pub fn with_connect_port(mut self, port: PortId) -> Self {
        self.connect_port = port;
        self
    }

    /// Set the tool-setter port
    pub fn with_toolprobe_port(mut self, port: PortId) -> Self {
        self.toolprobe_port = port;
        self
    }

    /// Set the feature flags
    pub fn with_flags(mut self, flags: ProtectionFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the debounce time
    pub fn with_debounce_ms(mut self, ms: u16) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Clamp port numbers to the highest available input.
    ///
    /// Returns `true` if any port was changed.
    pub fn clamp_ports(&mut self, num_ports: u8) -> bool {
        let max = num_ports.saturating_sub(1);
        let before = (self.connect_port, self.toolprobe_port);
        self.connect_port = self.connect_port.min(max);
        self.toolprobe_port = self.toolprobe_port.min(max);
        before != (self.connect_port, self.toolprobe_port)
    }

    /// Encode as the persisted record.
    ///
    /// Layout: connect port, tool-setter port, flags (LE u16),
    /// debounce (LE u16), checksum.
    pub fn to_record(&self) -> [u8; RECORD_LEN] {
        let flags = self.flags.to_bits().to_le_bytes();
        let debounce = self.debounce_ms.to_le_bytes();
        let mut record = [
            self.connect_port,
            self.toolprobe_port,
            flags[0],
            flags[1],
            debounce[0],
            debounce[1],
            0,
        ];
        record[RECORD_LEN - 1] = checksum(&record[..RECORD_LEN - 1]);
        record
    }

    /// Decode a persisted record.
    pub fn from_record(record: &[u8]) -> Result<Self, RecordError> {
        if record.len() < RECORD_LEN {
            return Err(RecordError::Truncated { len: record.len() });
        }
        if checksum(&record[..RECORD_LEN - 1]) != record[RECORD_LEN - 1] {
            return Err(RecordError::Checksum);
        }
        Ok(Self {
            connect_port: record[0],
            toolprobe_port: record[1],
            flags: ProtectionFlags::from_bits(u16::from_le_bytes([record[2], record[3]])),
            debounce_ms: u16::from_le_bytes([record[4], record[5]]),
        })
    }
}

/// Rotate-and-add checksum used by the host's NVS records.
fn checksum(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |sum, byte| sum.rotate_left(1).wrapping_add(*byte))
}

// ============================================================================
// Runtime Options
// ============================================================================

/// What a controller reset does to latched connection sources.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ResetPolicy {
    /// A reset does not mean the probe was unplugged; keep every source.
    #[default]
    KeepConnection,
    /// Clear the manual (M401) and reserved-tool sources on reset.
    ClearLatched,
}

/// Options that are not persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuntimeOptions {
    /// Reset behaviour for latched sources.
    pub reset_policy: ResetPolicy,
    /// Tool number treated as the probe.
    pub reserved_tool: ToolId,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            reset_policy: ResetPolicy::KeepConnection,
            reserved_tool: RESERVED_PROBE_TOOL,
        }
    }
}

impl RuntimeOptions {
    /// Set the reset policy
    pub fn with_reset_policy(mut self, policy: ResetPolicy) -> Self {
        self.reset_policy = policy;
        self
    }

    /// Set the reserved probe tool number
    pub fn with_reserved_tool(mut self, tool: ToolId) -> Self {
        self.reserved_tool = tool;
        self
    }
}

// ============================================================================
// Setting Descriptors
// ============================================================================

/// Value format of a host setting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingFormat {
    /// Unsigned 8-bit integer (port numbers).
    Int8,
    /// Unsigned 16-bit integer.
    Int16,
    /// Named bits, comma separated labels.
    Bitfield(&'static str),
}

/// Metadata the host shows for `$` settings help.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettingDescriptor {
    /// Host setting number.
    pub id: u16,
    /// Short name.
    pub name: &'static str,
    /// Value format.
    pub format: SettingFormat,
    /// Help text.
    pub description: &'static str,
}

/// First host setting number used by this crate.
pub const SETTING_BASE: u16 = 450;

/// Settings exposed to the host.
pub const SETTINGS: [SettingDescriptor; 4] = [
    SettingDescriptor {
        id: SETTING_BASE,
        name: "Probe connected aux port",
        format: SettingFormat::Int8,
        description: "Aux input port number to use for probe connected sensing.\n\n\
                      NOTE: A hard reset of the controller is required after changing this setting.",
    },
    SettingDescriptor {
        id: SETTING_BASE + 1,
        name: "Tool probe aux port",
        format: SettingFormat::Int8,
        description: "Aux input port number wired to the tool-setter.\n\n\
                      NOTE: A hard reset of the controller is required after changing this setting.",
    },
    SettingDescriptor {
        id: SETTING_BASE + 2,
        name: "Probe protection",
        format: SettingFormat::Bitfield(
            "Invert tool probe,Use connect pin,Invert connect pin,Use tool pin,\
             Invert tool pin,Motion protection,T99 protection,Tool probe hard limits",
        ),
        description: "Probe protection features and input polarities.",
    },
    SettingDescriptor {
        id: SETTING_BASE + 3,
        name: "Probe debounce",
        format: SettingFormat::Int16,
        description: "Contact settle time in milliseconds for the connect pin and motion protection.",
    },
];

// ============================================================================
// Tests
// ============================================================================
