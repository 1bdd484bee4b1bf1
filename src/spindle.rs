//! Spindle interlock.
//!
//! Sits between the host's spindle entry point and the spindle driver. A
//! request to energize the spindle while a probe is connected is replaced by
//! "off" before the driver ever sees it.

use crate::traits::{SpindleId, SpindleState};

/// Outcome of filtering a spindle request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpindleDecision {
    /// Forward the request unchanged.
    PassThrough(SpindleState),
    /// Request refused; drive the spindle off and halt.
    Blocked,
}

impl SpindleDecision {
    /// State that must reach the driver.
    pub fn effective_state(&self) -> SpindleState {
        match self {
            SpindleDecision::PassThrough(state) => *state,
            SpindleDecision::Blocked => SpindleState::OFF,
        }
    }

    /// Whether the request was refused.
    pub fn is_blocked(&self) -> bool {
        matches!(self, SpindleDecision::Blocked)
    }
}

/// Spindle start lockout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpindleInterlock {
    selected: Option<SpindleId>,
    blocked_count: u32,
}

impl SpindleInterlock {
    /// No spindle selected yet.
    pub const fn new() -> Self {
        Self {
            selected: None,
            blocked_count: 0,
        }
    }

    /// Record the spindle the host selected.
    pub fn select(&mut self, spindle: SpindleId) {
        self.selected = Some(spindle);
    }

    /// Spindle currently wrapped.
    pub fn selected(&self) -> Option<SpindleId> {
        self.selected
    }

    /// Number of refused start requests since boot.
    pub fn blocked_count(&self) -> u32 {
        self.blocked_count
    }

    /// Decide what reaches the driver.
    pub fn filter(&mut self, requested: SpindleState, probe_connected: bool) -> SpindleDecision {
        if requested.on && probe_connected {
            self.blocked_count = self.blocked_count.saturating_add(1);
            SpindleDecision::Blocked
        } else {
            SpindleDecision::PassThrough(requested)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_when_disconnected() {
        let mut interlock = SpindleInterlock::new();
        let decision = interlock.filter(SpindleState::ccw(), false);
        assert_eq!(decision, SpindleDecision::PassThrough(SpindleState::ccw()));
        assert_eq!(decision.effective_state(), SpindleState::ccw());
        assert_eq!(interlock.blocked_count(), 0);
    }

    #[test]
    fn blocks_start_when_connected() {
        let mut interlock = SpindleInterlock::new();
        let decision = interlock.filter(SpindleState::cw(), true);
        assert!(decision.is_blocked());
        assert_eq!(decision.effective_state(), SpindleState::OFF);
        assert_eq!(interlock.blocked_count(), 1);
    }

    #[test]
    fn stop_always_passes() {
        let mut interlock = SpindleInterlock::new();
        let decision = interlock.filter(SpindleState::OFF, true);
        assert!(!decision.is_blocked());
    }

    #[test]
    fn remembers_selection() {
        let mut interlock = SpindleInterlock::new();
        assert_eq!(interlock.selected(), None);
        interlock.select(2);
        assert_eq!(interlock.selected(), Some(2));
    }
}
