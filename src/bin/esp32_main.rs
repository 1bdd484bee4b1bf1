//! ESP32-C3 SuperMini stand-alone probe guard.
//!
//! This is the main entry point for the guard board. It runs a 1kHz polling
//! loop that:
//! - Watches the probe connected switch and the operator toggle button
//! - Samples the probe on every step pulse edge and halts on stray contact
//! - Gates the controller's spindle-enable request through a relay
//! - Redirects probing to the tool-setter while the fixture signal is active
//!
//! # Hardware Setup
//!
//! See [`probe_protect::hal::esp32::pins`] for the wiring.
//!
//! # Build
//!
//! ```bash
//! cargo build --release --features esp32 --bin esp32_main
//!
//! # Flash and monitor
//! espflash flash --monitor target/riscv32imc-esp-espidf/release/esp32_main
//! ```

use esp_idf_hal::gpio::{AnyIOPin, IOPin, Input, OutputPin, PinDriver, Pull};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::sys::EspError;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use probe_protect::hal::esp32::{
    Edge, EdgeInput, Esp32Clock, Esp32Host, Esp32Nvs, Esp32Ports, NVS_NAMESPACE,
};
use probe_protect::hooks::{HookBus, HookEvent};
use probe_protect::traits::{Clock, DigitalPorts, SpindleState};
use probe_protect::{install, ProbeProtection, RuntimeOptions};
use std::thread;
use std::time::Duration;

/// Main loop interval in milliseconds (1kHz)
const LOOP_INTERVAL_MS: u64 = 1;

/// The relay only switches the enable line; speed comes from the controller.
const RELAY_RPM: f32 = 0.0;

fn pulled_up(pin: AnyIOPin) -> Result<PinDriver<'static, AnyIOPin, Input>, EspError> {
    let mut input = PinDriver::input(pin)?;
    input.set_pull(Pull::Up)?;
    Ok(input)
}

fn main() -> anyhow::Result<()> {
    // Initialize ESP-IDF
    esp_idf_hal::sys::link_patches();

    println!();
    println!("================================");
    println!("  probe-protect Guard Board");
    println!("================================");
    println!();

    let peripherals = Peripherals::take()?;

    // =========================================================================
    // Initialize Auxiliary Ports (GPIO0/1)
    // =========================================================================
    let ports = Esp32Ports::new([
        peripherals.pins.gpio0.downgrade(),
        peripherals.pins.gpio1.downgrade(),
    ])?;
    println!("[OK] Auxiliary ports initialized (GPIO0/1)");

    // =========================================================================
    // Initialize Host Outputs (probe GPIO3, relay GPIO6, halt GPIO7)
    // =========================================================================
    let mut host = Esp32Host::new(
        ports,
        peripherals.pins.gpio3.downgrade(),
        peripherals.pins.gpio6.downgrade_output(),
        peripherals.pins.gpio7.downgrade_output(),
    )?;
    println!("[OK] Probe, spindle relay and halt initialized (GPIO3/6/7)");

    // =========================================================================
    // Initialize Controller Signals and Buttons
    // =========================================================================
    let mut step = EdgeInput::new(pulled_up(peripherals.pins.gpio4.downgrade())?);
    let mut spindle_request = EdgeInput::new(pulled_up(peripherals.pins.gpio5.downgrade())?);
    let mut fixture = EdgeInput::new(pulled_up(peripherals.pins.gpio8.downgrade())?);
    let mut toggle_button = EdgeInput::new(pulled_up(peripherals.pins.gpio9.downgrade())?);
    let mut reset_button = EdgeInput::new(pulled_up(peripherals.pins.gpio10.downgrade())?);
    println!("[OK] Controller signals initialized (GPIO4/5/8, buttons GPIO9/10)");

    // =========================================================================
    // Initialize Settings Storage
    // =========================================================================
    let partition = EspDefaultNvsPartition::take()?;
    let mut store = Esp32Nvs::new(partition)?;
    println!("[OK] Settings storage opened (NVS namespace {NVS_NAMESPACE})");

    // =========================================================================
    // Install Probe Protection
    // =========================================================================
    let mut bus = HookBus::new();
    let Some(id) = install(&mut bus, &mut host, &mut store, RuntimeOptions::default()) else {
        anyhow::bail!("probe protection failed to initialize");
    };
    let connect_port = bus
        .observer::<ProbeProtection>(id)
        .map(|protection| protection.config().connect_port)
        .ok_or_else(|| anyhow::anyhow!("probe protection not registered"))?;
    println!("[OK] Probe protection installed");

    let clock = Esp32Clock::new();
    let mut connect_level = host.read_input(connect_port);

    println!();
    println!("Controls:");
    println!("  Toggle button (GPIO9): Flip probe connected");
    println!("  Reset button (GPIO10): Release halt");
    println!();
    println!("Starting guard loop (1kHz)...");
    println!();

    // =========================================================================
    // Main Guard Loop (1kHz)
    // =========================================================================
    loop {
        let now = clock.now_ms();

        // ---------------------------------------------------------------------
        // Host events (observer chains)
        // ---------------------------------------------------------------------
        if reset_button.pressed() {
            host.release_halt();
            bus.dispatch(&HookEvent::DriverReset, &mut host, now);
            if host.is_halted() {
                println!("Reset: halt output still asserted");
            } else {
                println!("Reset");
            }
        }

        if let Some(edge) = fixture.poll() {
            // Active low: the controller pulls the line while probing the setter
            let on = edge == Edge::Falling;
            let event = HookEvent::ProbeFixture {
                tool: None,
                at_fixture: true,
                on,
            };
            bus.dispatch(&event, &mut host, now);
        }

        let protection = bus
            .observer_mut::<ProbeProtection>(id)
            .ok_or_else(|| anyhow::anyhow!("probe protection not registered"))?;

        // ---------------------------------------------------------------------
        // Connection sources
        // ---------------------------------------------------------------------
        let level = host.read_input(connect_port);
        if level != connect_level {
            connect_level = level;
            protection.on_connect_pin_change(&host, now);
        }

        if toggle_button.pressed() {
            protection.toggle_request(&mut host);
        }

        // ---------------------------------------------------------------------
        // Motion and spindle
        // ---------------------------------------------------------------------
        if step.poll() == Some(Edge::Rising) {
            protection.on_motion_pulse(&host, now);
        }

        if spindle_request.poll().is_some() {
            let state = if spindle_request.level() {
                SpindleState::OFF
            } else {
                SpindleState::cw()
            };
            let applied = protection.set_spindle_state(&mut host, state, RELAY_RPM);
            println!("Spindle: {}", if applied.on { "on" } else { "off" });
        }

        // ---------------------------------------------------------------------
        // Debounced checks
        // ---------------------------------------------------------------------
        if let Some(trip) = protection.poll(&mut host, now) {
            println!("!! HALT: probe contact at {} ms !!", trip.at_ms);
            if !host.is_halted() {
                println!("!! Halt output not asserted, stop the machine manually !!");
            }
        }

        // Sleep until next tick
        thread::sleep(Duration::from_millis(LOOP_INTERVAL_MS));
    }
}
