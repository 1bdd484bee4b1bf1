//! ESP32-C3 stand-alone probe guard hardware abstraction layer.
//!
//! This module provides hardware implementations for an ESP32-C3 SuperMini
//! board wired between a CNC controller, its touch probe and its spindle
//! driver.
//!
//! # Hardware Configuration
//!
//! - **MCU**: ESP32-C3 SuperMini (RISC-V 160MHz, 4MB Flash)
//! - **Inputs**: probe connected switch, tool-setter, probe contact, step
//!   pulse, spindle-enable request, fixture-probing signal, toggle button
//! - **Outputs**: spindle-enable relay, halt line
//!
//! # Pin Assignments
//!
//! See the [`pins`] module for GPIO assignments matching the SuperMini layout.

mod clock;
mod edge;
mod host;
mod nvs;
mod ports;

pub use clock::Esp32Clock;
pub use edge::{Edge, EdgeInput};
pub use host::Esp32Host;
pub use nvs::{Esp32Nvs, NAMESPACE as NVS_NAMESPACE};
pub use ports::Esp32Ports;

/// Pin assignments for SuperMini ESP32-C3.
///
/// Every input is pulled up and switched to GND.
pub mod pins {
    // =========================================================================
    // Auxiliary Ports (claimed by the protection)
    // =========================================================================

    /// Port 0: probe connected switch on the probe cable plug
    pub const CONNECT_IN: i32 = 0;

    /// Port 1: tool-setter contact
    pub const TOOL_SETTER_IN: i32 = 1;

    // =========================================================================
    // Controller Signals
    // =========================================================================

    /// Probe contact, shared with the controller's probe input
    pub const PROBE_IN: i32 = 3;

    /// Step pulse tap used as the motion pulse
    pub const STEP_IN: i32 = 4;

    /// Spindle-enable request from the controller
    pub const SPINDLE_REQ_IN: i32 = 5;

    /// Controller output asserted while probing the tool-setter
    pub const FIXTURE_IN: i32 = 8;

    /// Operator toggle button (also BOOT strap, only affects programming)
    pub const TOGGLE_BTN: i32 = 9;

    /// Reset button, releases the halt line
    pub const RESET_BTN: i32 = 10;

    // =========================================================================
    // Outputs
    // =========================================================================

    /// Spindle-enable relay to the spindle driver
    pub const SPINDLE_RELAY: i32 = 6;

    /// Halt line to the controller's feed-hold input
    pub const HALT_OUT: i32 = 7;
}
