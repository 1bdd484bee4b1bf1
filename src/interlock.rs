//! Motion protection interlock.
//!
//! While armed, every motion pulse samples the probe-triggered signal. A
//! not-triggered to triggered transition schedules a debounce check; if the
//! probe is still triggered when the check comes due, the interlock trips
//! and the caller halts the machine.
//!
//! ```text
//!             arm(sample)              on_motion_pulse(rising edge)
//! Disarmed ───────────────> Armed ───────────────────────> Armed + pending
//!    ^                        │                                 │
//!    └──────── disarm() ──────┘<──── poll(): bounced ───────────┤
//!                                                               │
//!                                      poll(): still triggered ─┴─> trip
//! ```
//!
//! The edge reference is reset to the latest sample at arm time, so a probe
//! that was already triggered when an intentional probing move ended does not
//! count as an unexpected contact.
//!
//! ```rust
//! use probe_protect::interlock::MotionInterlock;
//!
//! let mut interlock = MotionInterlock::new(50);
//! interlock.arm(false);
//!
//! interlock.on_motion_pulse(100, true);
//! assert!(interlock.poll(120, true).is_none());
//! let trip = interlock.poll(150, true).unwrap();
//! assert_eq!(trip.at_ms, 150);
//! ```

use crate::debounce::Debouncer;

/// Whether the interlock watches motion pulses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum InterlockState {
    /// Ignoring motion pulses.
    #[default]
    Disarmed,
    /// Watching for unexpected probe contact.
    Armed,
}

/// A confirmed unexpected probe contact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterlockTrip {
    /// Time the contact was confirmed.
    pub at_ms: u64,
}

/// Motion interlock with its own debounce slot.
#[derive(Clone, Debug)]
pub struct MotionInterlock {
    state: InterlockState,
    last_probe_triggered: bool,
    check: Debouncer,
}

impl MotionInterlock {
    /// Disarmed interlock with the given debounce window.
    pub const fn new(debounce_ms: u16) -> Self {
        Self {
            state: InterlockState::Disarmed,
            last_probe_triggered: false,
            check: Debouncer::new(debounce_ms),
        }
    }

    /// Current state.
    pub fn state(&self) -> InterlockState {
        self.state
    }

    /// Shorthand for `state() == Armed`.
    pub fn is_armed(&self) -> bool {
        self.state == InterlockState::Armed
    }

    /// Edge reference sample.
    pub fn last_probe_triggered(&self) -> bool {
        self.last_probe_triggered
    }

    /// Whether a debounce check is outstanding.
    pub fn check_pending(&self) -> bool {
        self.check.is_pending()
    }

    /// Change the debounce window.
    pub fn set_debounce_ms(&mut self, debounce_ms: u16) {
        self.check.set_settle_ms(debounce_ms);
    }

    /// Arm, taking `triggered` as the edge reference.
    ///
    /// Arming an armed interlock does nothing, so a pending check survives
    /// a redundant re-sync. Returns `true` if the state changed.
    pub fn arm(&mut self, triggered: bool) -> bool {
        if self.is_armed() {
            return false;
        }
        self.state = InterlockState::Armed;
        self.last_probe_triggered = triggered;
        self.check.cancel();
        true
    }

    /// Disarm and drop any pending check. Returns `true` if the state changed.
    pub fn disarm(&mut self) -> bool {
        self.check.cancel();
        if !self.is_armed() {
            return false;
        }
        self.state = InterlockState::Disarmed;
        true
    }

    /// Sample taken on a motion pulse.
    ///
    /// Ignored while disarmed. Returns `true` if a check was scheduled.
    pub fn on_motion_pulse(&mut self, now_ms: u64, triggered: bool) -> bool {
        if !self.is_armed() {
            return false;
        }
        let rising = triggered && !self.last_probe_triggered;
        self.last_probe_triggered = triggered;
        if rising {
            self.check.schedule(now_ms, true);
        }
        rising
    }

    /// Service the pending check with a fresh sample.
    ///
    /// The interlock stays armed after a trip; the host alarm that follows
    /// blocks motion until it is cleared.
    pub fn poll(&mut self, now_ms: u64, triggered: bool) -> Option<InterlockTrip> {
        if !self.is_armed() {
            return None;
        }
        self.check
            .poll(now_ms, triggered)
            .map(|_| InterlockTrip { at_ms: now_ms })
    }
}

impl Default for MotionInterlock {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_DEBOUNCE_MS)
    }
}
