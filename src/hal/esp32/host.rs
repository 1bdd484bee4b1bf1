//! Stand-alone guard board acting as the machine host.
//!
//! On the guard board there is no firmware to plug into: the board sits
//! between the machine controller and the spindle driver. It senses the
//! probe directly, gates the spindle-enable line through a relay and drives
//! a halt line (wired to the controller's feed-hold or e-stop input) when
//! the protection asks for a stop.
//!
//! # Wiring
//!
//! - Probe contact → GPIO, closes to GND (pulled up, low = triggered)
//! - Spindle relay → GPIO, high = spindle enabled
//! - Halt output → GPIO, high = halt asserted (latched until reset)

use crate::messages::{Message, MessageKind};
use crate::traits::{
    DigitalPorts, MachineHost, PortId, ProbeState, RealtimeCommand, SpindleState,
};
use esp_idf_hal::gpio::{AnyIOPin, AnyOutputPin, Input, Output, PinDriver, Pull};
use esp_idf_hal::sys::EspError;

use super::Esp32Ports;
use crate::hal::HaltLine;

/// Guard board host.
///
/// # Example
///
/// ```ignore
/// use probe_protect::hal::esp32::{Esp32Host, Esp32Ports};
/// use esp_idf_hal::gpio::{IOPin, OutputPin};
///
/// let peripherals = Peripherals::take()?;
/// let ports = Esp32Ports::new([peripherals.pins.gpio0.downgrade()])?;
/// let host = Esp32Host::new(
///     ports,
///     peripherals.pins.gpio3.downgrade(),        // probe
///     peripherals.pins.gpio6.downgrade_output(), // spindle relay
///     peripherals.pins.gpio7.downgrade_output(), // halt
/// )?;
/// ```
pub struct Esp32Host<'d> {
    ports: Esp32Ports<'d>,
    probe: PinDriver<'d, AnyIOPin, Input>,
    spindle_relay: PinDriver<'d, AnyOutputPin, Output>,
    halt: HaltLine<PinDriver<'d, AnyOutputPin, Output>>,
    probe_invert: bool,
    hard_limits: bool,
}

impl<'d> Esp32Host<'d> {
    /// Configures the probe input and drives both outputs low.
    ///
    /// # Errors
    ///
    /// Returns an error if GPIO initialization fails.
    pub fn new(
        ports: Esp32Ports<'d>,
        probe_pin: AnyIOPin,
        spindle_relay_pin: AnyOutputPin,
        halt_pin: AnyOutputPin,
    ) -> Result<Self, EspError> {
        let mut probe = PinDriver::input(probe_pin)?;
        probe.set_pull(Pull::Up)?;
        let mut spindle_relay = PinDriver::output(spindle_relay_pin)?;
        spindle_relay.set_low()?;
        let mut halt = PinDriver::output(halt_pin)?;
        halt.set_low()?;

        Ok(Self {
            ports,
            probe,
            spindle_relay,
            halt: HaltLine::new(halt),
            probe_invert: false,
            hard_limits: true,
        })
    }

    /// Whether the halt line is asserted.
    pub fn is_halted(&self) -> bool {
        self.halt.is_latched()
    }

    /// Release the halt line (operator reset).
    ///
    /// The halt stays latched if the output write fails.
    pub fn release_halt(&mut self) {
        if let Err(err) = self.halt.release() {
            println!("[HAL] Error: failed to release halt output: {:?}", err);
        }
    }

    fn assert_halt(&mut self) {
        if let Err(err) = self.halt.assert() {
            println!("[HAL] Error: failed to assert halt output: {:?}", err);
        }
    }
}

impl DigitalPorts for Esp32Host<'_> {
    fn num_inputs(&self) -> u8 {
        self.ports.num_inputs()
    }

    fn claim_input(&mut self, port: PortId, description: &str) -> bool {
        self.ports.claim_input(port, description)
    }

    fn read_input(&self, port: PortId) -> bool {
        self.ports.read_input(port)
    }
}

impl MachineHost for Esp32Host<'_> {
    fn enqueue_realtime(&mut self, cmd: RealtimeCommand) {
        match cmd {
            RealtimeCommand::Stop => self.assert_halt(),
            RealtimeCommand::ProbeConnectedToggle => {
                tracing::debug!("probe connected toggle");
            }
        }
    }

    fn report(&mut self, message: &Message) {
        match message.kind {
            MessageKind::Info => println!("[MSG:{}]", message.text),
            MessageKind::Warning => println!("[MSG:Warning: {}]", message.text),
        }
    }

    fn write_line(&mut self, line: &str) {
        println!("{line}");
    }

    fn probe_state(&self) -> ProbeState {
        ProbeState {
            connected: true,
            triggered: self.probe.is_low() != self.probe_invert,
        }
    }

    fn probe_invert(&self) -> bool {
        self.probe_invert
    }

    fn set_probe_invert(&mut self, invert: bool) {
        self.probe_invert = invert;
    }

    fn hard_limits_enabled(&self) -> bool {
        self.hard_limits
    }

    fn set_hard_limits(&mut self, enabled: bool) {
        // No limit switches on the guard board; tracked for status only
        self.hard_limits = enabled;
    }

    fn set_spindle_state(&mut self, state: SpindleState, _rpm: f32) {
        let result = if state.on {
            self.spindle_relay.set_high()
        } else {
            self.spindle_relay.set_low()
        };
        if let Err(err) = result {
            println!(
                "[HAL] Error: failed to drive spindle relay (on={}): {:?}",
                state.on, err
            );
        }
    }

    fn in_check_mode(&self) -> bool {
        false
    }
}
