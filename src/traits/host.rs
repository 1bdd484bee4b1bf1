//! Host controller collaborator traits.
//!
//! The protection logic never drives motion or the spindle directly. It
//! talks to the machine controller it is plugged into through
//! [`MachineHost`]: a real-time command queue, a message channel, the
//! primary probe input, a couple of settings it may temporarily override,
//! and the underlying spindle driver.
//!
//! # Real-time Commands
//!
//! Commands are fire-and-forget. The host processes them before the next
//! motion segment:
//!
//! ```text
//! Stop                 - halt motion and raise an alarm
//! ProbeConnectedToggle - announce that the probe-connected state changed
//! ```

use super::hardware::DigitalPorts;
use crate::messages::Message;

/// Tool number as reported by the host's tool table.
pub type ToolId = u32;

/// Spindle number as reported by the host's spindle registry.
pub type SpindleId = u8;

/// Real-time commands enqueued into the host's command queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RealtimeCommand {
    /// Stop all motion immediately and raise an alarm.
    Stop,
    /// The logical probe-connected state changed.
    ProbeConnectedToggle,
}

/// Snapshot of a probe input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProbeState {
    /// Whether a probe is physically present.
    pub connected: bool,
    /// Whether the probe contact is asserted (polarity already applied).
    pub triggered: bool,
}

/// Requested spindle state.
///
/// Defaults to off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpindleState {
    /// Spindle energized.
    pub on: bool,
    /// Counter-clockwise rotation.
    pub ccw: bool,
}

impl SpindleState {
    /// Spindle off.
    pub const OFF: Self = Self {
        on: false,
        ccw: false,
    };

    /// Spindle on, clockwise.
    pub const fn cw() -> Self {
        Self {
            on: true,
            ccw: false,
        }
    }

    /// Spindle on, counter-clockwise.
    pub const fn ccw() -> Self {
        Self { on: true, ccw: true }
    }
}

/// The machine controller this crate is plugged into.
///
/// Implementors wrap the host firmware's function tables. Every method is
/// called from the host's serialized event context, never concurrently.
///
/// # Implementation Notes
///
/// - `enqueue_realtime()` must not block
/// - `probe_state()` is the host's own probe reader; it must honour the
///   current [`probe_invert()`](Self::probe_invert) setting
/// - `set_spindle_state()` is the underlying spindle driver, invoked only
///   after the spindle interlock has filtered the request
pub trait MachineHost: DigitalPorts {
    /// Enqueue a real-time command.
    fn enqueue_realtime(&mut self, cmd: RealtimeCommand);

    /// Report a user-visible message.
    fn report(&mut self, message: &Message);

    /// Write a raw line to the output stream (option reports).
    fn write_line(&mut self, line: &str);

    /// Read the primary probe input.
    fn probe_state(&self) -> ProbeState;

    /// Current probe-pin inversion setting.
    fn probe_invert(&self) -> bool;

    /// Change the probe-pin inversion setting.
    fn set_probe_invert(&mut self, invert: bool);

    /// Whether hard limits are currently enabled.
    fn hard_limits_enabled(&self) -> bool;

    /// Enable or disable hard limits.
    fn set_hard_limits(&mut self, enabled: bool);

    /// Drive the spindle.
    fn set_spindle_state(&mut self, state: SpindleState, rpm: f32);

    /// Whether the parser is in check (simulation) mode.
    fn in_check_mode(&self) -> bool;
}
