//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for every collaborator trait, enabling
//! development and testing on desktop without a machine controller.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockPorts`] | [`DigitalPorts`] | Settable input levels, claim tracking |
//! | [`MockHost`] | [`MachineHost`] | Records commands, messages and spindle calls |
//! | [`MockSettings`] | [`SettingsStore`] | In-memory NVS with failure injection |
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//!
//! # Example
//!
//! ```rust
//! use probe_protect::hal::MockHost;
//! use probe_protect::traits::{MachineHost, RealtimeCommand};
//! use probe_protect::ProbeProtection;
//!
//! let mut host = MockHost::new(4);
//! let mut protection = ProbeProtection::new(Default::default(), Default::default());
//!
//! protection.set_manual(&mut host, true).unwrap();
//!
//! // Verify via recorded output
//! assert_eq!(host.messages.len(), 1);
//! assert!(host.realtime.is_empty());
//! ```
//!
//! [`DigitalPorts`]: crate::traits::DigitalPorts
//! [`MachineHost`]: crate::traits::MachineHost
//! [`SettingsStore`]: crate::traits::SettingsStore
//! [`Clock`]: crate::traits::Clock

use core::cell::Cell;

use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use crate::error::NvsError;
use crate::messages::Message;
use crate::traits::{
    Clock, DigitalPorts, MachineHost, NvsAddress, PortId, ProbeState, RealtimeCommand,
    SettingsStore, SpindleState,
};

// ============================================================================
// Port Mocks
// ============================================================================

/// Mock digital input ports.
///
/// Levels are set directly by the test. Claims are recorded with their
/// description. With explicit claiming switched off the mock behaves like a
/// driver that hands out the highest port and hides it afterwards.
///
/// # Example
///
/// ```rust
/// use probe_protect::hal::MockPorts;
/// use probe_protect::traits::DigitalPorts;
///
/// let mut ports = MockPorts::new(4);
/// ports.set_explicit_claiming(false);
///
/// assert_eq!(ports.take_highest_input("Probe Connected"), Some(3));
/// assert_eq!(ports.num_inputs(), 3);
/// assert_eq!(ports.description(3), Some("Probe Connected"));
/// ```
#[derive(Debug, Clone)]
pub struct MockPorts {
    levels: Vec<bool>,
    available: u8,
    explicit: bool,
    claimed: Vec<(PortId, String)>,
}

impl MockPorts {
    /// Creates `count` inputs, all low, none claimed.
    pub fn new(count: u8) -> Self {
        Self {
            levels: vec![false; count as usize],
            available: count,
            explicit: true,
            claimed: Vec::new(),
        }
    }

    /// Sets the raw level of `port`. Out-of-range ports are ignored.
    pub fn set_level(&mut self, port: PortId, level: bool) {
        if let Some(slot) = self.levels.get_mut(port as usize) {
            *slot = level;
        }
    }

    /// Switches explicit claiming support on or off.
    pub fn set_explicit_claiming(&mut self, explicit: bool) {
        self.explicit = explicit;
    }

    /// Ports claimed so far, in claim order.
    pub fn claimed(&self) -> Vec<PortId> {
        self.claimed.iter().map(|(port, _)| *port).collect()
    }

    /// Whether `port` has been claimed.
    pub fn is_claimed(&self, port: PortId) -> bool {
        self.claimed.iter().any(|(p, _)| *p == port)
    }

    /// Description `port` was claimed with.
    pub fn description(&self, port: PortId) -> Option<&str> {
        self.claimed
            .iter()
            .find(|(p, _)| *p == port)
            .map(|(_, description)| description.as_str())
    }
}

impl DigitalPorts for MockPorts {
    fn num_inputs(&self) -> u8 {
        self.available
    }

    fn can_claim_explicit(&self) -> bool {
        self.explicit
    }

    fn claim_input(&mut self, port: PortId, description: &str) -> bool {
        if port >= self.available || self.is_claimed(port) {
            return false;
        }
        self.claimed.push((port, description.to_string()));
        if !self.explicit && port + 1 == self.available {
            self.available -= 1;
        }
        true
    }

    fn read_input(&self, port: PortId) -> bool {
        self.levels.get(port as usize).copied().unwrap_or(false)
    }
}

// ============================================================================
// Host Mock
// ============================================================================

/// Mock machine controller.
///
/// Records everything the protection asks of the host. Use the public
/// fields to set inputs and inspect output after test operations.
///
/// `probe` holds the raw probe pin; [`probe_state`](MachineHost::probe_state)
/// applies `probe_invert` to it like a real host does.
///
/// # Example
///
/// ```rust
/// use probe_protect::hal::MockHost;
/// use probe_protect::traits::{MachineHost, SpindleState};
///
/// let mut host = MockHost::new(2);
/// host.probe.triggered = true;
/// host.set_probe_invert(true);
/// assert!(!host.probe_state().triggered);
///
/// host.set_spindle_state(SpindleState::cw(), 1000.0);
/// assert_eq!(host.spindle, vec![(SpindleState::cw(), 1000.0)]);
/// ```
#[derive(Debug, Clone)]
pub struct MockHost {
    /// Auxiliary inputs.
    pub ports: MockPorts,
    /// Raw primary probe input.
    pub probe: ProbeState,
    /// Probe-pin inversion setting.
    pub probe_invert: bool,
    /// Number of writes to the inversion setting.
    pub invert_writes: usize,
    /// Hard limits enabled.
    pub hard_limits: bool,
    /// Parser in check mode.
    pub check_mode: bool,
    /// Real-time commands enqueued, oldest first.
    pub realtime: Vec<RealtimeCommand>,
    /// Messages reported, oldest first.
    pub messages: Vec<Message>,
    /// Raw lines written.
    pub lines: Vec<String>,
    /// Spindle driver calls.
    pub spindle: Vec<(SpindleState, f32)>,
    /// Number of contact-input reads.
    pub contact_reads: Cell<usize>,
}

impl MockHost {
    /// Creates a host with `num_ports` inputs and hard limits enabled.
    pub fn new(num_ports: u8) -> Self {
        Self {
            ports: MockPorts::new(num_ports),
            probe: ProbeState {
                connected: true,
                triggered: false,
            },
            probe_invert: false,
            invert_writes: 0,
            hard_limits: true,
            check_mode: false,
            realtime: Vec::new(),
            messages: Vec::new(),
            lines: Vec::new(),
            spindle: Vec::new(),
            contact_reads: Cell::new(0),
        }
    }

    /// Number of warnings reported.
    pub fn warnings(&self) -> usize {
        self.messages.iter().filter(|m| m.is_warning()).count()
    }

    /// Number of stop commands enqueued.
    pub fn stops(&self) -> usize {
        self.realtime
            .iter()
            .filter(|cmd| **cmd == RealtimeCommand::Stop)
            .count()
    }

    /// Forget recorded output.
    pub fn clear_output(&mut self) {
        self.realtime.clear();
        self.messages.clear();
        self.lines.clear();
        self.spindle.clear();
    }
}

impl DigitalPorts for MockHost {
    fn num_inputs(&self) -> u8 {
        self.ports.num_inputs()
    }

    fn can_claim_explicit(&self) -> bool {
        self.ports.can_claim_explicit()
    }

    fn claim_input(&mut self, port: PortId, description: &str) -> bool {
        self.ports.claim_input(port, description)
    }

    fn read_input(&self, port: PortId) -> bool {
        self.ports.read_input(port)
    }
}

impl MachineHost for MockHost {
    fn enqueue_realtime(&mut self, cmd: RealtimeCommand) {
        self.realtime.push(cmd);
    }

    fn report(&mut self, message: &Message) {
        self.messages.push(message.clone());
    }

    fn write_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    fn probe_state(&self) -> ProbeState {
        self.contact_reads.set(self.contact_reads.get() + 1);
        ProbeState {
            connected: self.probe.connected,
            triggered: self.probe.triggered != self.probe_invert,
        }
    }

    fn probe_invert(&self) -> bool {
        self.probe_invert
    }

    fn set_probe_invert(&mut self, invert: bool) {
        self.probe_invert = invert;
        self.invert_writes += 1;
    }

    fn hard_limits_enabled(&self) -> bool {
        self.hard_limits
    }

    fn set_hard_limits(&mut self, enabled: bool) {
        self.hard_limits = enabled;
    }

    fn set_spindle_state(&mut self, state: SpindleState, rpm: f32) {
        self.spindle.push((state, rpm));
    }

    fn in_check_mode(&self) -> bool {
        self.check_mode
    }
}

// ============================================================================
// Storage Mock
// ============================================================================

/// In-memory settings store.
///
/// Addresses are handed out sequentially from 0. Records can be preloaded
/// at an address before it is allocated to simulate flash contents left by
/// a previous boot.
///
/// # Example
///
/// ```rust
/// use probe_protect::hal::MockSettings;
/// use probe_protect::traits::SettingsStore;
///
/// let mut store = MockSettings::new();
/// let address = store.alloc(4).unwrap();
///
/// let mut buf = [0u8; 4];
/// assert!(store.load(address, &mut buf).is_err()); // never written
///
/// store.save(address, &[1, 2, 3, 4]).unwrap();
/// store.load(address, &mut buf).unwrap();
/// assert_eq!(buf, [1, 2, 3, 4]);
/// ```
#[derive(Debug, Clone)]
pub struct MockSettings {
    capacity: usize,
    allocated: usize,
    records: Vec<Option<Vec<u8>>>,
    /// Make every load fail.
    pub fail_loads: bool,
    /// Make every save fail.
    pub fail_saves: bool,
    /// Successful saves.
    pub save_count: usize,
}

impl MockSettings {
    /// Store with room for 8 records.
    pub fn new() -> Self {
        Self {
            capacity: 8,
            allocated: 0,
            records: Vec::new(),
            fail_loads: false,
            fail_saves: false,
            save_count: 0,
        }
    }

    /// Limit the number of allocatable records.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Put `data` at `address` as if written on a previous boot.
    pub fn preload(&mut self, address: NvsAddress, data: &[u8]) {
        self.put(address, data);
    }

    /// Current contents at `address`.
    pub fn record(&self, address: NvsAddress) -> Option<&[u8]> {
        self.records.get(address as usize)?.as_deref()
    }

    fn put(&mut self, address: NvsAddress, data: &[u8]) {
        let index = address as usize;
        if self.records.len() <= index {
            self.records.resize(index + 1, None);
        }
        self.records[index] = Some(data.to_vec());
    }
}

impl Default for MockSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for MockSettings {
    fn alloc(&mut self, _size: usize) -> Option<NvsAddress> {
        if self.allocated >= self.capacity {
            return None;
        }
        let address = NvsAddress::try_from(self.allocated).ok()?;
        self.allocated += 1;
        Some(address)
    }

    fn load(&mut self, address: NvsAddress, buf: &mut [u8]) -> Result<(), NvsError> {
        if self.fail_loads {
            return Err(NvsError::Read);
        }
        let data = self.record(address).ok_or(NvsError::Read)?;
        if data.len() < buf.len() {
            return Err(NvsError::Read);
        }
        buf.copy_from_slice(&data[..buf.len()]);
        Ok(())
    }

    fn save(&mut self, address: NvsAddress, data: &[u8]) -> Result<(), NvsError> {
        if self.fail_saves {
            return Err(NvsError::Write);
        }
        self.put(address, data);
        self.save_count += 1;
        Ok(())
    }
}

// ============================================================================
// Time Mock
// ============================================================================

/// Mock clock for testing.
///
/// Time only moves when the test says so.
///
/// # Example
///
/// ```rust
/// use probe_protect::hal::MockClock;
/// use probe_protect::traits::Clock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.set(1000);
/// assert_eq!(clock.now_ms(), 1000);
///
/// clock.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Debug)]
pub struct MockClock {
    current_ms: u64,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self { current_ms: 0 }
    }

    /// Sets the current time in milliseconds.
    pub fn set(&mut self, ms: u64) {
        self.current_ms = ms;
    }

    /// Advances the clock by the given duration.
    pub fn advance(&mut self, ms: u64) {
        self.current_ms += ms;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms
    }
}
