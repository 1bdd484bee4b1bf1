//! Latched halt output.

use embedded_hal::digital::OutputPin;

/// Output line held high while a stop is latched.
///
/// The latch follows the pin: a failed write leaves it where it was, so
/// [`is_latched`](Self::is_latched) never claims a halt the machine did
/// not receive.
#[derive(Debug)]
pub struct HaltLine<P> {
    pin: P,
    latched: bool,
}

impl<P: OutputPin> HaltLine<P> {
    /// Wraps a pin that is already driven low.
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            latched: false,
        }
    }

    /// Whether the halt is asserted.
    pub fn is_latched(&self) -> bool {
        self.latched
    }

    /// Drive the line high.
    pub fn assert(&mut self) -> Result<(), P::Error> {
        self.pin.set_high()?;
        self.latched = true;
        Ok(())
    }

    /// Drive the line low.
    pub fn release(&mut self) -> Result<(), P::Error> {
        self.pin.set_low()?;
        self.latched = false;
        Ok(())
    }
}
