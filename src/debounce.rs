//! Deferred re-check of a digital signal.
//!
//! A [`Debouncer`] never blocks. An edge schedules a check `settle_ms` in the
//! future; the host's main loop calls [`Debouncer::poll`] with the current
//! time and a fresh sample, and the check confirms only if the signal still
//! has the level it had at the edge.
//!
//! There is a single pending slot per debouncer. A new edge while a check is
//! pending replaces it (the latest edge's due time wins), so two checks for
//! the same signal can never both fire.
//!
//! ```rust
//! use probe_protect::debounce::Debouncer;
//!
//! let mut debounce = Debouncer::new(50);
//! debounce.schedule(0, true);
//!
//! assert_eq!(debounce.poll(20, true), None);       // not due yet
//! assert_eq!(debounce.poll(50, true), Some(true)); // still asserted
//! assert_eq!(debounce.poll(60, true), None);       // consumed
//!
//! debounce.schedule(100, true);
//! assert_eq!(debounce.poll(150, false), None);     // bounced, no trigger
//! ```

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PendingCheck {
    due_ms: u64,
    expected: bool,
}

/// Single-slot deferred signal check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Debouncer {
    settle_ms: u64,
    pending: Option<PendingCheck>,
}

impl Debouncer {
    /// Create a debouncer with the given settle time.
    pub const fn new(settle_ms: u16) -> Self {
        Self {
            settle_ms: settle_ms as u64,
            pending: None,
        }
    }

    /// Settle time in milliseconds.
    pub fn settle_ms(&self) -> u64 {
        self.settle_ms
    }

    /// Change the settle time. A pending check keeps its due time.
    pub fn set_settle_ms(&mut self, settle_ms: u16) {
        self.settle_ms = settle_ms as u64;
    }

    /// Schedule a check for `expected` after the settle time.
    ///
    /// Replaces any pending check.
    pub fn schedule(&mut self, now_ms: u64, expected: bool) {
        self.pending = Some(PendingCheck {
            due_ms: now_ms.saturating_add(self.settle_ms),
            expected,
        });
    }

    /// Drop the pending check, if any.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Whether a check is pending.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Due time of the pending check.
    pub fn due_ms(&self) -> Option<u64> {
        self.pending.map(|p| p.due_ms)
    }

    /// Service the pending check.
    ///
    /// Returns `Some(level)` when the check is due and `level` still matches
    /// the level seen at the edge. A due check is consumed either way.
    pub fn poll(&mut self, now_ms: u64, level: bool) -> Option<bool> {
        let check = self.pending?;
        if now_ms < check.due_ms {
            return None;
        }
        self.pending = None;
        (level == check.expected).then_some(level)
    }
}
