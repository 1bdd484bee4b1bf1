//! GPIO auxiliary inputs for the ESP32 guard board.
//!
//! Each auxiliary port is a GPIO configured as an input with the internal
//! pull-up enabled, so an open switch reads high. Port numbers are indices
//! into the pin list given at construction.

use crate::traits::{DigitalPorts, PortId};
use esp_idf_hal::gpio::{AnyIOPin, Input, PinDriver, Pull};
use esp_idf_hal::sys::EspError;

/// Numbered GPIO inputs with claim tracking.
///
/// # Example
///
/// ```ignore
/// use probe_protect::hal::esp32::Esp32Ports;
/// use probe_protect::traits::DigitalPorts;
/// use esp_idf_hal::gpio::IOPin;
///
/// let peripherals = Peripherals::take()?;
/// let mut ports = Esp32Ports::new([
///     peripherals.pins.gpio0.downgrade(), // port 0: probe connected
///     peripherals.pins.gpio1.downgrade(), // port 1: tool-setter
/// ])?;
///
/// assert!(ports.claim_input(0, "Probe Connected"));
/// let level = ports.read_input(0);
/// ```
pub struct Esp32Ports<'d> {
    inputs: Vec<PinDriver<'d, AnyIOPin, Input>>,
    claimed: Vec<bool>,
}

impl<'d> Esp32Ports<'d> {
    /// Configures every pin as a pulled-up input.
    ///
    /// # Errors
    ///
    /// Returns an error if GPIO initialization fails.
    pub fn new(pins: impl IntoIterator<Item = AnyIOPin>) -> Result<Self, EspError> {
        let mut inputs = Vec::new();
        for pin in pins {
            let mut input = PinDriver::input(pin)?;
            input.set_pull(Pull::Up)?;
            inputs.push(input);
        }
        let claimed = vec![false; inputs.len()];
        Ok(Self { inputs, claimed })
    }
}

impl DigitalPorts for Esp32Ports<'_> {
    fn num_inputs(&self) -> u8 {
        u8::try_from(self.inputs.len()).unwrap_or(u8::MAX)
    }

    fn claim_input(&mut self, port: PortId, description: &str) -> bool {
        match self.claimed.get_mut(port as usize) {
            Some(claimed) if !*claimed => {
                *claimed = true;
                tracing::debug!(port, description, "claimed input");
                true
            }
            _ => false,
        }
    }

    fn read_input(&self, port: PortId) -> bool {
        self.inputs
            .get(port as usize)
            .is_some_and(|input| input.is_high())
    }
}
