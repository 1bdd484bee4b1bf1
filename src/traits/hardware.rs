//! Hardware abstraction traits for digital inputs and time.
//!
//! This module defines the port-level interfaces that allow probe-protect to
//! work across different platforms (ESP32, host controller glue, desktop mocks).
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`DigitalPorts`] | Numbered digital inputs with claiming |
//! | [`Clock`] | Time source for `no_std` environments |
//!
//! # Implementation
//!
//! For testing and desktop development, use the mock implementations
//! from [`crate::hal::mock`]. For ESP32 hardware, use the
//! implementations from `hal::esp32` (requires `esp32` feature).
//!
//! # Example
//!
//! ```rust
//! use probe_protect::traits::DigitalPorts;
//! use probe_protect::hal::MockPorts;
//!
//! let mut ports = MockPorts::new(4);
//! assert!(ports.claim_input(3, "Probe Connected"));
//! assert!(!ports.claim_input(3, "Tool Probe")); // already taken
//!
//! ports.set_level(3, true);
//! assert!(ports.read_input(3));
//! ```

/// Index of an auxiliary digital input port.
pub type PortId = u8;

/// Numbered auxiliary digital inputs.
///
/// Ports are addressed by index `0..num_inputs()`. A port used by the
/// protection logic is claimed first so that other consumers (M62-M66 style
/// port commands on the host) cannot reuse it.
///
/// # Implementation Notes
///
/// - `read_input()` returns the raw electrical level; polarity is handled
///   by the caller using the configured inversion flags
/// - Reading an out-of-range port should return `false`
pub trait DigitalPorts {
    /// Number of digital inputs available for claiming.
    fn num_inputs(&self) -> u8;

    /// Whether the port layer supports claiming a specific port number.
    ///
    /// Drivers without explicit claiming only hand out the highest
    /// numbered port via [`take_highest_input`](Self::take_highest_input).
    fn can_claim_explicit(&self) -> bool {
        true
    }

    /// Claims `port` for exclusive use. Returns `false` if unavailable.
    fn claim_input(&mut self, port: PortId, description: &str) -> bool;

    /// Reads the raw level of an input port.
    fn read_input(&self, port: PortId) -> bool;

    /// Claims the highest numbered input port.
    ///
    /// Returns the port that was claimed, or `None` when no port is left.
    fn take_highest_input(&mut self, description: &str) -> Option<PortId> {
        let port = self.num_inputs().checked_sub(1)?;
        self.claim_input(port, description).then_some(port)
    }
}

/// Time source trait for `no_std` compatibility.
///
/// Provides monotonic time in milliseconds for debounce scheduling.
/// On desktop, this can wrap `std::time::Instant`. On embedded,
/// use a hardware timer.
///
/// # Example
///
/// ```rust
/// use probe_protect::traits::Clock;
/// use probe_protect::hal::MockClock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(50);
/// assert_eq!(clock.now_ms(), 50);
/// ```
pub trait Clock {
    /// Returns current time in milliseconds since an arbitrary epoch.
    ///
    /// Must be monotonically increasing.
    fn now_ms(&self) -> u64;
}
