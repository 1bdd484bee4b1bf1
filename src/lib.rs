//! # probe-protect
//!
//! Probe protection for CNC machine controllers: keeps the spindle from
//! starting while a touch probe is plugged in, halts motion when the probe
//! touches something it was not asked to, and reads the tool-setter from its
//! own input while tool lengths are measured.
//!
//! ## Features
//!
//! - **Connection aggregation**: external connect pin, M401/M402, the
//!   reserved probe tool (T99) and an operator toggle feed one derived
//!   "probe connected" state
//! - **Motion interlock**: debounced detection of unexpected probe contact
//!   during ordinary motion, escalated to a machine stop
//! - **Spindle lockout**: spindle-on requests are replaced by "off" while the
//!   probe is connected
//! - **Tool-setter redirection**: fixture probing reads an alternate input
//!   with its own polarity, optionally flipping probe inversion and
//!   suspending hard limits, all restored on episode end or reset
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without a machine:
//!
//! - `traits` - Host controller, port and storage abstractions
//! - `config` - Persisted settings and runtime options
//! - `connection`, `interlock`, `redirect`, `spindle`, `toolchange` - the
//!   protection components
//! - `protection` - The owned context tying the components together
//! - `hooks` - Host events as ordered observer chains
//! - `hal` - Concrete implementations (mock for testing, esp32 for hardware)
//!
//! ## Example
//!
//! ```rust
//! use probe_protect::{
//!     hal::{MockHost, MockSettings},
//!     hooks::{HookBus, HookEvent},
//!     install, ProbeProtection, RuntimeOptions,
//! };
//!
//! let mut host = MockHost::new(4);
//! let mut store = MockSettings::new();
//! let mut bus = HookBus::new();
//!
//! // Load settings, claim ports, subscribe to host events
//! let id = install(&mut bus, &mut host, &mut store, RuntimeOptions::default()).unwrap();
//!
//! // Host events go through the bus
//! bus.dispatch(&HookEvent::ToolSelected { tool: 99 }, &mut host, 0);
//!
//! // Periodic work goes straight to the context
//! let protection = bus.observer_mut::<ProbeProtection>(id).unwrap();
//! assert!(protection.is_connected());
//! protection.on_motion_pulse(&host, 10);
//! assert!(protection.poll(&mut host, 10).is_none());
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Persisted settings, flags and runtime options.
pub mod config;
/// Aggregation of the "probe connected" sources.
pub mod connection;
/// Single-slot deferred signal checks.
pub mod debounce;
/// Error types for configuration faults.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Host event hooks as ordered observer chains.
pub mod hooks;
/// Motion protection interlock.
pub mod interlock;
/// M401 / M402 user M-codes.
pub mod mcode;
/// User-visible messages and sender-facing types.
pub mod messages;
/// The protection context.
pub mod protection;
/// Tool-setter probe redirection during fixture probing.
pub mod redirect;
/// Spindle start lockout.
pub mod spindle;
/// Tool selection and tool-change coordination.
pub mod toolchange;
/// Core traits for host, port and storage abstraction.
pub mod traits;

// Re-exports for convenience
pub use config::{
    ProtectionConfig, ProtectionFlags, ResetPolicy, RuntimeOptions, DEFAULT_DEBOUNCE_MS,
    RESERVED_PROBE_TOOL,
};
pub use connection::{
    ConnectionEdge, ConnectionSource, ConnectionState, RedundantRequest, SubFlags,
};
pub use debounce::Debouncer;
pub use error::{NvsError, PortRole, ProtectError, RecordError};
pub use hooks::{HookBus, HookContext, HookEvent, HookKind, HostHooks, ObserverId};
pub use interlock::{InterlockState, InterlockTrip, MotionInterlock};
pub use mcode::{McodeHandler, McodeStatus, ProbeMcode};
pub use messages::{Message, MessageKind};
pub use protection::{install, ProbeProtection, ProtectionStatus};
pub use redirect::{ProbeSource, ToolProbeRedirector};
pub use spindle::{SpindleDecision, SpindleInterlock};
pub use toolchange::ToolChangeCoordinator;
pub use traits::{
    // Hardware
    Clock,
    DigitalPorts,
    // Host
    MachineHost,
    NvsAddress,
    PortId,
    ProbeState,
    RealtimeCommand,
    SettingsStore,
    SpindleId,
    SpindleState,
    ToolId,
};

// Message re-exports (for sender APIs)
#[cfg(feature = "serde")]
pub use messages::ConnectRequest;

// Parsing function re-exports (serde-json-core based)
#[cfg(feature = "serde-json-core")]
pub use messages::{encode_status, parse_connect_request};

#[cfg(feature = "json")]
pub use messages::status_json;
