//! Millisecond clock for the debounce scheduler.

use crate::traits::Clock;

/// ESP32 clock on the high-resolution `esp_timer`.
///
/// `esp_timer_get_time()` counts microseconds since boot in 64 bits, so the
/// millisecond value never wraps in the lifetime of the board.
///
/// # Example
///
/// ```ignore
/// use probe_protect::hal::esp32::Esp32Clock;
/// use probe_protect::traits::Clock;
///
/// let clock = Esp32Clock::new();
/// protection.poll(&mut host, clock.now_ms());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Esp32Clock;

impl Esp32Clock {
    /// Creates a clock handle.
    #[inline]
    pub fn new() -> Self {
        Self
    }

    /// Microseconds since boot.
    #[inline]
    pub fn now_us(&self) -> u64 {
        // Plain read of the timer counter, no side effects
        let micros = unsafe { esp_idf_hal::sys::esp_timer_get_time() };
        u64::try_from(micros).unwrap_or(0)
    }
}

impl Clock for Esp32Clock {
    #[inline]
    fn now_ms(&self) -> u64 {
        self.now_us() / 1000
    }
}
