//! The probe protection context.
//!
//! [`ProbeProtection`] owns every piece of protection state: the persisted
//! config, the connection aggregator, the motion interlock, the connect-pin
//! debouncer, the fixture redirector, the spindle lockout and the tool-change
//! coordinator. The host is passed into each call instead of being stored,
//! so the context is a plain value with the controller's lifetime.
//!
//! # Event Flow
//!
//! ```text
//! connect pin edge ──> pin debounce ──poll()──> ConnectionState ──edge──┐
//! M401 / M402 ─────────────────────────────────>        │               │
//! tool selected ───────────────────────────────>        │               v
//!                                                       │        sync_interlock()
//! motion pulse ──> MotionInterlock ──poll()──> Stop + warning           │
//!                        ^                                              │
//!                        └──────────────── arm / disarm ────────────────┘
//! ```
//!
//! Everything that can change the arming condition (connection edge,
//! probing move, fixture episode, settings, reset) ends in
//! `sync_interlock()`, which arms only when the probe is connected, motion
//! protection is enabled, no fixture episode is running and no intentional
//! probing move is in progress.
//!
//! # Example
//!
//! ```rust
//! use probe_protect::config::RuntimeOptions;
//! use probe_protect::hal::{MockHost, MockSettings};
//! use probe_protect::interlock::InterlockState;
//! use probe_protect::traits::{RealtimeCommand, SpindleState};
//! use probe_protect::ProbeProtection;
//!
//! let mut host = MockHost::new(4);
//! let mut store = MockSettings::new();
//! let mut protection =
//!     ProbeProtection::init(&mut host, &mut store, RuntimeOptions::default()).unwrap();
//!
//! // Selecting the probe tool connects the probe and arms the interlock
//! protection.on_tool_selected(&mut host, 99);
//! assert!(protection.is_connected());
//! assert_eq!(protection.interlock_state(), InterlockState::Armed);
//!
//! // Spindle start is refused
//! let effective = protection.set_spindle_state(&mut host, SpindleState::cw(), 12000.0);
//! assert_eq!(effective, SpindleState::OFF);
//! assert_eq!(host.realtime.last(), Some(&RealtimeCommand::Stop));
//! ```

use tracing::{debug, warn};

use crate::config::{ProtectionConfig, ResetPolicy, RuntimeOptions, RECORD_LEN};
use crate::connection::{
    ConnectionConfig, ConnectionEdge, ConnectionState, RedundantRequest, SubFlags,
};
use crate::debounce::Debouncer;
use crate::error::{PortRole, ProtectError};
use crate::hooks::{
    HookBus, HookContext, HookEvent, HookKind, HostHooks, ObserverId, Subscriptions,
};
use crate::interlock::{InterlockState, InterlockTrip, MotionInterlock};
use crate::messages::{
    Message, MSG_ALREADY_ASSERTED, MSG_INIT_FAILED, MSG_NOT_ASSERTED, MSG_PROBE_TRIGGERED,
    MSG_SPINDLE_BLOCKED, PLUGIN_BANNER,
};
use crate::redirect::{ProbeSource, ToolProbeRedirector};
use crate::spindle::SpindleInterlock;
use crate::toolchange::ToolChangeCoordinator;
use crate::traits::{
    MachineHost, NvsAddress, ProbeState, RealtimeCommand, SettingsStore, SpindleId, SpindleState,
    ToolId,
};

/// Description given to the connect input when claiming it.
pub const CONNECT_PORT_DESCRIPTION: &str = "Probe Connected";
/// Description given to the tool-setter input when claiming it.
pub const TOOL_PROBE_PORT_DESCRIPTION: &str = "Tool Probe";

/// Host events [`ProbeProtection`] subscribes to.
pub const HOOKED_EVENTS: [HookKind; 9] = HookKind::ALL;

/// Serializable snapshot of the protection state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProtectionStatus {
    /// Logical probe-connected state.
    pub connected: bool,
    /// Raw connection sources.
    pub sources: SubFlags,
    /// Motion interlock state.
    pub interlock: InterlockState,
    /// A fixture-probing episode is running.
    pub episode_active: bool,
    /// Probe reads go to the tool-setter input.
    pub redirected: bool,
    /// An intentional probing move is running.
    pub probing_move: bool,
    /// Spindle starts refused since boot.
    pub blocked_spindle_starts: u32,
}

/// Probe protection state, owned by whoever dispatches host events.
#[derive(Clone, Debug)]
pub struct ProbeProtection {
    config: ProtectionConfig,
    options: RuntimeOptions,
    connection: ConnectionState,
    interlock: MotionInterlock,
    pin_debounce: Debouncer,
    redirector: ToolProbeRedirector,
    spindle: SpindleInterlock,
    toolchange: ToolChangeCoordinator,
    probing_move: bool,
    nvs_address: Option<NvsAddress>,
}

impl ProbeProtection {
    /// Context for an already validated config, without storage.
    ///
    /// Everything starts disconnected and disarmed; no ports are claimed.
    pub fn new(config: ProtectionConfig, options: RuntimeOptions) -> Self {
        Self {
            config,
            options,
            connection: ConnectionState::new(ConnectionConfig::from_flags(&config.flags)),
            interlock: MotionInterlock::new(config.debounce_ms),
            pin_debounce: Debouncer::new(config.debounce_ms),
            redirector: ToolProbeRedirector::new(),
            spindle: SpindleInterlock::new(),
            toolchange: ToolChangeCoordinator::new(options.reserved_tool),
            probing_move: false,
            nvs_address: None,
        }
    }

    /// Load settings, claim ports and sample the connect pin.
    ///
    /// A missing or corrupt record is replaced by
    /// [`ProtectionConfig::defaults_for`] and written back.
    pub fn init<H, S>(
        host: &mut H,
        store: &mut S,
        options: RuntimeOptions,
    ) -> Result<Self, ProtectError>
    where
        H: MachineHost,
        S: SettingsStore,
    {
        let num_ports = host.num_inputs();
        if num_ports == 0 {
            return Err(ProtectError::NoPortsAvailable);
        }
        let address = store
            .alloc(RECORD_LEN)
            .ok_or(ProtectError::NvsAllocFailed)?;

        let mut config = load_config(store, address, num_ports)?;
        if config.clamp_ports(num_ports) {
            debug!(
                connect_port = config.connect_port,
                toolprobe_port = config.toolprobe_port,
                "clamped probe ports"
            );
        }
        claim_ports(host, &mut config)?;

        let mut protection = Self::new(config, options);
        protection.nvs_address = Some(address);
        protection.sample_connect_pin(host);
        debug!(?config, "probe protection initialized");
        Ok(protection)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Active settings.
    pub fn config(&self) -> &ProtectionConfig {
        &self.config
    }

    /// Runtime options.
    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Logical probe-connected state, derived now.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Raw connection sources.
    pub fn sub_flags(&self) -> SubFlags {
        self.connection.sub_flags()
    }

    /// Motion interlock state.
    pub fn interlock_state(&self) -> InterlockState {
        self.interlock.state()
    }

    /// Whether a fixture episode is running.
    pub fn episode_active(&self) -> bool {
        self.redirector.episode_active()
    }

    /// Active probe source.
    pub fn probe_source(&self) -> ProbeSource {
        self.redirector.source()
    }

    /// Whether an intentional probing move is running.
    pub fn probing_move(&self) -> bool {
        self.probing_move
    }

    /// Settings address, if allocated by [`init`](Self::init).
    pub fn nvs_address(&self) -> Option<NvsAddress> {
        self.nvs_address
    }

    /// Spindle selected by the host.
    pub fn selected_spindle(&self) -> Option<SpindleId> {
        self.spindle.selected()
    }

    /// Snapshot for senders and UIs.
    pub fn status(&self) -> ProtectionStatus {
        ProtectionStatus {
            connected: self.connection.is_connected(),
            sources: self.connection.sub_flags(),
            interlock: self.interlock.state(),
            episode_active: self.redirector.episode_active(),
            redirected: self.redirector.is_redirected(),
            probing_move: self.probing_move,
            blocked_spindle_starts: self.spindle.blocked_count(),
        }
    }

    // ========================================================================
    // Probe Reading
    // ========================================================================

    /// Read the probe through the active source.
    pub fn read_probe<H: MachineHost>(&self, host: &H) -> ProbeState {
        self.redirector.read(host)
    }

    // ========================================================================
    // Connection Sources
    // ========================================================================

    /// Connect pin interrupt: schedule a debounced re-check.
    ///
    /// Ignored unless the external pin is enabled.
    pub fn on_connect_pin_change<H: MachineHost>(&mut self, host: &H, now_ms: u64) {
        if !self.config.flags.use_ext_pin {
            return;
        }
        let level = host.read_input(self.config.connect_port);
        self.pin_debounce.schedule(now_ms, level);
    }

    /// Apply an already debounced connect pin level (raw, before polarity).
    pub fn set_external_pin<H: MachineHost>(
        &mut self,
        host: &mut H,
        raw: bool,
    ) -> Option<ConnectionEdge> {
        let edge = self.connection.set_external_pin(raw)?;
        self.apply_edge(host, edge);
        Some(edge)
    }

    /// Manual connect (M401) or disconnect (M402).
    ///
    /// A request matching the current manual state reports a warning and
    /// changes nothing.
    pub fn set_manual<H: MachineHost>(
        &mut self,
        host: &mut H,
        connected: bool,
    ) -> Result<Option<ConnectionEdge>, RedundantRequest> {
        match self.connection.set_manual(connected) {
            Ok(edge) => {
                if let Some(edge) = edge {
                    self.apply_edge(host, edge);
                }
                Ok(edge)
            }
            Err(err) => {
                let text = if connected {
                    MSG_ALREADY_ASSERTED
                } else {
                    MSG_NOT_ASSERTED
                };
                host.report(&Message::warning(text));
                debug!(%err, "redundant manual probe request");
                Err(err)
            }
        }
    }

    /// Set the reserved-tool-slot source directly.
    pub fn set_reserved_tool_slot<H: MachineHost>(
        &mut self,
        host: &mut H,
        active: bool,
    ) -> Option<ConnectionEdge> {
        let edge = self.connection.set_reserved_tool_slot(active)?;
        self.apply_edge(host, edge);
        Some(edge)
    }

    /// Flip the operator toggle source.
    pub fn toggle_request<H: MachineHost>(&mut self, host: &mut H) -> Option<ConnectionEdge> {
        let edge = self.connection.toggle()?;
        self.apply_edge(host, edge);
        Some(edge)
    }

    /// Re-derive and broadcast the connected state without touching sources.
    ///
    /// The interlock is re-synced even without an edge, since a settings
    /// change may have flipped motion protection.
    pub fn notify_toggle<H: MachineHost>(&mut self, host: &mut H) -> Option<ConnectionEdge> {
        match self.connection.notify_toggle() {
            Some(edge) => {
                self.apply_edge(host, edge);
                Some(edge)
            }
            None => {
                self.sync_interlock(host);
                None
            }
        }
    }

    /// Take the connect pin level as settled, bypassing the debounce slot.
    fn sample_connect_pin<H: MachineHost>(&mut self, host: &mut H) {
        if !self.config.flags.use_ext_pin {
            return;
        }
        let level = host.read_input(self.config.connect_port);
        if let Some(edge) = self.connection.set_external_pin(level) {
            self.apply_edge(host, edge);
        }
    }

    fn apply_edge<H: MachineHost>(&mut self, host: &mut H, edge: ConnectionEdge) {
        debug!(connected = edge.connected, cause = ?edge.cause, "probe connection edge");
        self.sync_interlock(host);
        host.report(&Message::connection(&edge));
    }

    fn should_arm(&self) -> bool {
        self.connection.is_connected()
            && self.config.flags.motion_protect_enabled
            && !self.redirector.episode_active()
            && !self.probing_move
    }

    fn sync_interlock<H: MachineHost>(&mut self, host: &H) {
        if self.should_arm() {
            let triggered = self.read_probe(host).triggered;
            if self.interlock.arm(triggered) {
                debug!(triggered, "motion interlock armed");
            }
        } else if self.interlock.disarm() {
            debug!("motion interlock disarmed");
        }
    }

    // ========================================================================
    // Motion
    // ========================================================================

    /// Motion pulse callback: sample the probe for an unexpected edge.
    pub fn on_motion_pulse<H: MachineHost>(&mut self, host: &H, now_ms: u64) {
        if !self.interlock.is_armed() {
            return;
        }
        let triggered = self.read_probe(host).triggered;
        if self.interlock.on_motion_pulse(now_ms, triggered) {
            debug!(now_ms, "probe edge during motion, debouncing");
        }
    }

    /// Service pending debounce checks. Call from the host's main loop.
    ///
    /// Returns the interlock trip, if one fired; the stop command and
    /// warning have already been issued.
    pub fn poll<H: MachineHost>(&mut self, host: &mut H, now_ms: u64) -> Option<InterlockTrip> {
        if self.config.flags.use_ext_pin {
            let level = host.read_input(self.config.connect_port);
            if let Some(level) = self.pin_debounce.poll(now_ms, level) {
                if let Some(edge) = self.connection.set_external_pin(level) {
                    self.apply_edge(host, edge);
                }
            }
        }

        if !self.interlock.check_pending() {
            return None;
        }
        let triggered = self.read_probe(host).triggered;
        let trip = self.interlock.poll(now_ms, triggered)?;
        host.enqueue_realtime(RealtimeCommand::Stop);
        host.report(&Message::warning(MSG_PROBE_TRIGGERED));
        warn!(at_ms = trip.at_ms, "unexpected probe contact during motion, halting");
        Some(trip)
    }

    /// An intentional probing move is starting: disarm.
    pub fn on_probe_move_start<H: MachineHost>(&mut self, host: &H) {
        self.probing_move = true;
        self.sync_interlock(host);
    }

    /// The probing move finished: clean up stale overrides and re-arm.
    pub fn on_probe_move_completed<H: MachineHost>(&mut self, host: &mut H) {
        self.probing_move = false;
        if !self.redirector.episode_active() && self.redirector.restore_overrides(host) {
            debug!("restored fixture overrides after probing move");
        }
        self.sync_interlock(host);
    }

    // ========================================================================
    // Fixture Episodes
    // ========================================================================

    /// Fixture probing hook. `at_fixture && on` starts an episode, anything
    /// else ends it.
    pub fn on_probe_fixture<H: MachineHost>(
        &mut self,
        host: &mut H,
        tool: Option<ToolId>,
        at_fixture: bool,
        on: bool,
    ) -> bool {
        if at_fixture && on {
            if self.redirector.begin(host, &self.config) {
                debug!(?tool, redirected = self.redirector.is_redirected(), "fixture episode started");
            }
        } else if self.redirector.end(host) {
            debug!(?tool, "fixture episode ended");
        }
        self.sync_interlock(host);
        true
    }

    // ========================================================================
    // Spindle
    // ========================================================================

    /// Wrapped spindle driver entry point.
    ///
    /// Returns the state that reached the driver.
    pub fn set_spindle_state<H: MachineHost>(
        &mut self,
        host: &mut H,
        state: SpindleState,
        rpm: f32,
    ) -> SpindleState {
        let decision = self.spindle.filter(state, self.connection.is_connected());
        let effective = decision.effective_state();
        if decision.is_blocked() {
            host.set_spindle_state(effective, 0.0);
            host.enqueue_realtime(RealtimeCommand::Stop);
            host.report(&Message::warning(MSG_SPINDLE_BLOCKED));
            warn!(rpm, "spindle start blocked, probe connected");
        } else {
            host.set_spindle_state(effective, rpm);
        }
        effective
    }

    /// The host selected a spindle; its driver is wrapped from now on.
    pub fn on_spindle_select(&mut self, spindle: SpindleId) -> bool {
        self.spindle.select(spindle);
        true
    }

    // ========================================================================
    // Tools
    // ========================================================================

    /// Tool selection: update the reserved-tool-slot source and broadcast.
    pub fn on_tool_selected<H: MachineHost>(
        &mut self,
        host: &mut H,
        tool: ToolId,
    ) -> Option<ConnectionEdge> {
        let active = self
            .toolchange
            .on_tool_selected(tool, self.config.flags.t99_protect_enabled);
        match self.connection.set_reserved_tool_slot(active) {
            Some(edge) => {
                self.apply_edge(host, edge);
                Some(edge)
            }
            None => self.notify_toggle(host),
        }
    }

    /// Tool change finished: put back a detached probe-completed hook.
    pub fn on_tool_changed(
        &mut self,
        subscriptions: &mut Subscriptions,
        observer: ObserverId,
        tool: ToolId,
    ) {
        let restored = self.toolchange.ensure_subscribed(subscriptions, observer);
        if restored > 0 {
            debug!(tool, restored, "re-subscribed probe completed hook");
        }
        self.toolchange.on_tool_changed(tool);
    }

    // ========================================================================
    // Reset and Reporting
    // ========================================================================

    /// Controller reset.
    ///
    /// Restores every fixture override regardless of state, forgets any
    /// probing move and pending checks, re-samples the connect pin, then
    /// applies the reset policy.
    pub fn on_reset<H: MachineHost>(&mut self, host: &mut H) {
        self.redirector.reset(host);
        self.probing_move = false;
        self.pin_debounce.cancel();
        self.interlock.disarm();
        self.sample_connect_pin(host);

        if self.options.reset_policy == ResetPolicy::ClearLatched {
            if let Some(edge) = self.connection.clear_latched() {
                self.apply_edge(host, edge);
            }
        }
        self.sync_interlock(host);
        debug!(connected = self.is_connected(), "probe protection reset");
    }

    /// Option report: write the banner unless only new options are wanted.
    pub fn report_options<H: MachineHost>(&self, host: &mut H, newopt: bool) {
        if !newopt {
            host.write_line(PLUGIN_BANNER);
        }
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Replace the settings and re-evaluate everything derived from them.
    ///
    /// Port numbers are clamped; claiming new ports needs a restart. An
    /// enabled connect pin is re-sampled.
    pub fn set_config<H: MachineHost>(&mut self, host: &mut H, mut config: ProtectionConfig) {
        config.clamp_ports(host.num_inputs());
        self.config = config;
        self.connection
            .set_config(ConnectionConfig::from_flags(&config.flags));
        self.interlock.set_debounce_ms(config.debounce_ms);
        self.pin_debounce.set_settle_ms(config.debounce_ms);
        self.pin_debounce.cancel();
        self.sample_connect_pin(host);
        self.notify_toggle(host);
    }

    /// Write the current settings to the store.
    pub fn save_config<S: SettingsStore>(&self, store: &mut S) -> Result<(), ProtectError> {
        let address = self.nvs_address.ok_or(ProtectError::NvsAllocFailed)?;
        store.save(address, &self.config.to_record())?;
        Ok(())
    }
}

/// Load the record at `address`, falling back to written-back defaults.
fn load_config<S: SettingsStore>(
    store: &mut S,
    address: NvsAddress,
    num_ports: u8,
) -> Result<ProtectionConfig, ProtectError> {
    let mut record = [0u8; RECORD_LEN];
    let loaded = match store.load(address, &mut record) {
        Ok(()) => ProtectionConfig::from_record(&record).map_err(|err| {
            warn!(%err, "probe settings record invalid, restoring defaults");
        }),
        Err(err) => {
            warn!(%err, "probe settings not loaded, restoring defaults");
            Err(())
        }
    };
    match loaded {
        Ok(config) => Ok(config),
        Err(()) => {
            let config = ProtectionConfig::defaults_for(num_ports);
            store.save(address, &config.to_record())?;
            Ok(config)
        }
    }
}

/// Claim the inputs the enabled features need.
///
/// Without explicit claiming the connect pin and then the tool pin take the
/// highest free input, and the config is updated to match.
fn claim_ports<H: MachineHost>(
    host: &mut H,
    config: &mut ProtectionConfig,
) -> Result<(), ProtectError> {
    let flags = config.flags;
    if host.can_claim_explicit() {
        if flags.use_ext_pin && !host.claim_input(config.connect_port, CONNECT_PORT_DESCRIPTION) {
            return Err(ProtectError::PortUnavailable {
                port: config.connect_port,
                role: PortRole::Connect,
            });
        }
        if flags.use_tool_pin
            && !host.claim_input(config.toolprobe_port, TOOL_PROBE_PORT_DESCRIPTION)
        {
            return Err(ProtectError::PortUnavailable {
                port: config.toolprobe_port,
                role: PortRole::ToolProbe,
            });
        }
        return Ok(());
    }

    if flags.use_ext_pin {
        config.connect_port = host
            .take_highest_input(CONNECT_PORT_DESCRIPTION)
            .ok_or(ProtectError::PortUnavailable {
                port: config.connect_port,
                role: PortRole::Connect,
            })?;
    }
    if flags.use_tool_pin {
        config.toolprobe_port = host
            .take_highest_input(TOOL_PROBE_PORT_DESCRIPTION)
            .ok_or(ProtectError::PortUnavailable {
                port: config.toolprobe_port,
                role: PortRole::ToolProbe,
            })?;
    }
    Ok(())
}

/// Bring the protection up and register it on `bus`.
///
/// A configuration fault reports one boot warning and registers nothing;
/// the host keeps running without probe protection.
pub fn install<H, S>(
    bus: &mut HookBus<H>,
    host: &mut H,
    store: &mut S,
    options: RuntimeOptions,
) -> Option<ObserverId>
where
    H: MachineHost + 'static,
    S: SettingsStore,
{
    match ProbeProtection::init(host, store, options) {
        Ok(protection) => {
            let id = bus.register(protection, &HOOKED_EVENTS);
            if id.is_none() {
                warn!("hook chains full, probe protection not registered");
                host.report(&Message::warning(MSG_INIT_FAILED));
            }
            id
        }
        Err(err) => {
            warn!(%err, "probe protection disabled");
            host.report(&Message::warning(err.boot_warning()));
            None
        }
    }
}

impl<H: MachineHost> HostHooks<H> for ProbeProtection {
    fn on_event(&mut self, event: &HookEvent, ctx: &mut HookContext<'_, H>) -> bool {
        match *event {
            HookEvent::ProbeStart => self.on_probe_move_start(ctx.host),
            HookEvent::ProbeCompleted => self.on_probe_move_completed(ctx.host),
            HookEvent::ProbeFixture {
                tool,
                at_fixture,
                on,
            } => return self.on_probe_fixture(ctx.host, tool, at_fixture, on),
            HookEvent::SpindleSelect { spindle } => return self.on_spindle_select(spindle),
            HookEvent::ToolSelected { tool } => {
                self.on_tool_selected(ctx.host, tool);
            }
            HookEvent::ToolChanged { tool } => {
                self.on_tool_changed(ctx.subscriptions, ctx.observer, tool)
            }
            HookEvent::DriverReset => self.on_reset(ctx.host),
            HookEvent::ReportOptions { newopt } => self.report_options(ctx.host, newopt),
            HookEvent::ConnectedToggle => {
                self.notify_toggle(ctx.host);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtectionFlags;
    use crate::hal::{MockHost, MockSettings};

    fn ext_pin_config() -> ProtectionConfig {
        ProtectionConfig::defaults_for(4)
            .with_connect_port(1)
            .with_flags(
                ProtectionFlags::default()
                    .with_ext_pin(true, false)
                    .with_motion_protect(true)
                    .with_t99_protect(true),
            )
    }

    fn setup(config: ProtectionConfig) -> (MockHost, ProbeProtection) {
        (MockHost::new(4), ProbeProtection::new(config, RuntimeOptions::default()))
    }

    // =========================================================================
    // Init
    // =========================================================================

    #[test]
    fn init_restores_defaults_on_load_failure() {
        let mut host = MockHost::new(4);
        let mut store = MockSettings::new();
        let protection =
            ProbeProtection::init(&mut host, &mut store, RuntimeOptions::default()).unwrap();

        assert_eq!(*protection.config(), ProtectionConfig::defaults_for(4));
        assert!(host.ports.claimed().is_empty());
        let address = protection.nvs_address().unwrap();
        assert_eq!(
            store.record(address),
            Some(&ProtectionConfig::defaults_for(4).to_record()[..])
        );
    }

    #[test]
    fn init_without_ports_fails() {
        let mut host = MockHost::new(0);
        let mut store = MockSettings::new();
        assert_eq!(
            ProbeProtection::init(&mut host, &mut store, RuntimeOptions::default()).unwrap_err(),
            ProtectError::NoPortsAvailable
        );
    }

    #[test]
    fn init_alloc_failure() {
        let mut host = MockHost::new(4);
        let mut store = MockSettings::new().with_capacity(0);
        assert_eq!(
            ProbeProtection::init(&mut host, &mut store, RuntimeOptions::default()).unwrap_err(),
            ProtectError::NvsAllocFailed
        );
    }

    #[test]
    fn init_claims_enabled_pins() {
        let mut host = MockHost::new(4);
        let mut store = MockSettings::new();
        let config = ext_pin_config().with_flags(
            ext_pin_config().flags.with_tool_pin(true, false),
        );
        store.preload(0, &config.with_toolprobe_port(2).to_record());

        ProbeProtection::init(&mut host, &mut store, RuntimeOptions::default()).unwrap();
        assert_eq!(host.ports.description(1), Some(CONNECT_PORT_DESCRIPTION));
        assert_eq!(host.ports.description(2), Some(TOOL_PROBE_PORT_DESCRIPTION));
    }

    #[test]
    fn init_port_conflict() {
        let mut host = MockHost::new(4);
        let mut store = MockSettings::new();
        let config = ext_pin_config()
            .with_flags(ext_pin_config().flags.with_tool_pin(true, false))
            .with_toolprobe_port(1);
        store.preload(0, &config.to_record());

        assert_eq!(
            ProbeProtection::init(&mut host, &mut store, RuntimeOptions::default()).unwrap_err(),
            ProtectError::PortUnavailable {
                port: 1,
                role: PortRole::ToolProbe
            }
        );
    }

    #[test]
    fn init_takes_highest_without_explicit_claiming() {
        let mut host = MockHost::new(4);
        host.ports.set_explicit_claiming(false);
        let mut store = MockSettings::new();
        store.preload(0, &ext_pin_config().to_record());

        let protection =
            ProbeProtection::init(&mut host, &mut store, RuntimeOptions::default()).unwrap();
        assert_eq!(protection.config().connect_port, 3);
        assert_eq!(host.ports.description(3), Some(CONNECT_PORT_DESCRIPTION));
    }

    #[test]
    fn init_samples_connect_pin() {
        let mut host = MockHost::new(4);
        host.ports.set_level(1, true);
        let mut store = MockSettings::new();
        store.preload(0, &ext_pin_config().to_record());

        let protection =
            ProbeProtection::init(&mut host, &mut store, RuntimeOptions::default()).unwrap();
        assert!(protection.is_connected());
        assert!(protection.interlock_state() == InterlockState::Armed);
    }

    // =========================================================================
    // Connection and Interlock
    // =========================================================================

    #[test]
    fn connect_pin_is_debounced() {
        let (mut host, mut protection) = setup(ext_pin_config());
        host.ports.set_level(1, true);
        protection.on_connect_pin_change(&host, 0);
        protection.poll(&mut host, 20);
        assert!(!protection.is_connected());

        protection.poll(&mut host, 50);
        assert!(protection.is_connected());
        assert_eq!(host.messages.len(), 1);
    }

    #[test]
    fn connect_pin_bounce_ignored() {
        let (mut host, mut protection) = setup(ext_pin_config());
        host.ports.set_level(1, true);
        protection.on_connect_pin_change(&host, 0);
        host.ports.set_level(1, false);
        protection.poll(&mut host, 50);
        assert!(!protection.is_connected());
        assert!(host.messages.is_empty());
    }

    #[test]
    fn connect_pin_ignored_when_disabled() {
        let (mut host, mut protection) = setup(ProtectionConfig::defaults_for(4));
        host.ports.set_level(3, true);
        protection.on_connect_pin_change(&host, 0);
        protection.poll(&mut host, 100);
        assert!(!protection.is_connected());
    }

    #[test]
    fn redundant_manual_warns() {
        let (mut host, mut protection) = setup(ext_pin_config());
        protection.set_manual(&mut host, true).unwrap();
        assert!(protection.set_manual(&mut host, true).is_err());
        assert_eq!(host.messages.len(), 2);
        assert!(host.messages[1].is_warning());
        assert_eq!(host.messages[1].text.as_str(), MSG_ALREADY_ASSERTED);
    }

    #[test]
    fn motion_protect_disabled_never_arms() {
        let config = ext_pin_config()
            .with_flags(ext_pin_config().flags.with_motion_protect(false));
        let (mut host, mut protection) = setup(config);
        protection.set_manual(&mut host, true).unwrap();
        assert_eq!(protection.interlock_state(), InterlockState::Disarmed);
    }

    #[test]
    fn trip_halts_machine() {
        let (mut host, mut protection) = setup(ext_pin_config());
        protection.set_manual(&mut host, true).unwrap();

        host.probe.triggered = true;
        protection.on_motion_pulse(&host, 100);
        assert!(protection.poll(&mut host, 150).is_some());
        assert_eq!(host.realtime, [RealtimeCommand::Stop]);
        assert_eq!(host.messages.last().map(|m| m.text.as_str()), Some(MSG_PROBE_TRIGGERED));
    }

    #[test]
    fn settings_change_rearms() {
        let config = ext_pin_config()
            .with_flags(ext_pin_config().flags.with_motion_protect(false));
        let (mut host, mut protection) = setup(config);
        protection.set_manual(&mut host, true).unwrap();

        protection.set_config(&mut host, ext_pin_config());
        assert_eq!(protection.interlock_state(), InterlockState::Armed);
    }

    #[test]
    fn idle_ticks_leave_contact_input_alone() {
        let (mut host, mut protection) = setup(ext_pin_config());
        protection.set_manual(&mut host, true).unwrap();
        assert_eq!(protection.interlock_state(), InterlockState::Armed);

        let reads = host.contact_reads.get();
        for now in 0..100 {
            assert!(protection.poll(&mut host, now).is_none());
        }
        assert_eq!(host.contact_reads.get(), reads);

        host.probe.triggered = true;
        protection.on_motion_pulse(&host, 100);
        let due = 100 + u64::from(protection.config().debounce_ms);
        assert!(protection.poll(&mut host, due).is_some());
        assert!(host.contact_reads.get() > reads);
    }

    #[test]
    fn enabling_connect_pin_samples_level() {
        let (mut host, mut protection) = setup(ProtectionConfig::defaults_for(4));
        host.ports.set_level(1, true);
        // Ignored while the pin is disabled
        protection.on_connect_pin_change(&host, 0);
        assert!(!protection.is_connected());

        protection.set_config(&mut host, ext_pin_config());
        assert!(protection.is_connected());
        assert_eq!(protection.interlock_state(), InterlockState::Armed);
        assert_eq!(host.messages.len(), 1);

        let applied = protection.set_spindle_state(&mut host, SpindleState::cw(), 1000.0);
        assert_eq!(applied, SpindleState::OFF);
    }

    #[test]
    fn disabling_t99_drops_tool_source() {
        let (mut host, mut protection) = setup(ext_pin_config());
        protection.on_tool_selected(&mut host, 99);
        assert!(protection.is_connected());

        let config = ext_pin_config()
            .with_flags(ext_pin_config().flags.with_t99_protect(false));
        protection.set_config(&mut host, config);
        assert!(!protection.is_connected());
        assert_eq!(protection.interlock_state(), InterlockState::Disarmed);
    }

    // =========================================================================
    // Reset
    // =========================================================================

    #[test]
    fn reset_keeps_connection_by_default() {
        let (mut host, mut protection) = setup(ext_pin_config());
        protection.set_manual(&mut host, true).unwrap();
        protection.on_reset(&mut host);
        assert!(protection.is_connected());
        assert_eq!(protection.interlock_state(), InterlockState::Armed);
    }

    #[test]
    fn reset_inside_debounce_window_resamples_pin() {
        let (mut host, mut protection) = setup(ext_pin_config());
        host.ports.set_level(1, true);
        protection.on_connect_pin_change(&host, 0);
        protection.on_reset(&mut host);
        assert!(protection.is_connected());
        assert_eq!(protection.interlock_state(), InterlockState::Armed);

        for now in (0..=1000).step_by(10) {
            protection.poll(&mut host, now);
            assert!(protection.is_connected());
        }
        let applied = protection.set_spindle_state(&mut host, SpindleState::cw(), 1000.0);
        assert_eq!(applied, SpindleState::OFF);
    }

    #[test]
    fn reset_clear_latched_policy() {
        let mut host = MockHost::new(4);
        let mut protection = ProbeProtection::new(
            ext_pin_config(),
            RuntimeOptions::default().with_reset_policy(ResetPolicy::ClearLatched),
        );
        protection.set_manual(&mut host, true).unwrap();
        protection.on_tool_selected(&mut host, 99);

        protection.on_reset(&mut host);
        assert!(!protection.is_connected());
        assert_eq!(protection.interlock_state(), InterlockState::Disarmed);
    }

    #[test]
    fn reset_clears_probing_move() {
        let (mut host, mut protection) = setup(ext_pin_config());
        protection.set_manual(&mut host, true).unwrap();
        protection.on_probe_move_start(&host);
        assert_eq!(protection.interlock_state(), InterlockState::Disarmed);

        protection.on_reset(&mut host);
        assert!(!protection.probing_move());
        assert_eq!(protection.interlock_state(), InterlockState::Armed);
    }

    // =========================================================================
    // Reporting and Settings
    // =========================================================================

    #[test]
    fn banner_only_for_full_report() {
        let (mut host, protection) = setup(ext_pin_config());
        protection.report_options(&mut host, true);
        assert!(host.lines.is_empty());
        protection.report_options(&mut host, false);
        assert_eq!(host.lines, [PLUGIN_BANNER]);
    }

    #[test]
    fn save_requires_allocation() {
        let (_, protection) = setup(ext_pin_config());
        let mut store = MockSettings::new();
        assert_eq!(
            protection.save_config(&mut store),
            Err(ProtectError::NvsAllocFailed)
        );
    }

    #[test]
    fn status_snapshot() {
        let (mut host, mut protection) = setup(ext_pin_config());
        protection.on_tool_selected(&mut host, 99);
        protection.set_spindle_state(&mut host, SpindleState::cw(), 1000.0);

        let status = protection.status();
        assert!(status.connected);
        assert!(status.sources.reserved_tool_slot);
        assert_eq!(status.interlock, InterlockState::Armed);
        assert_eq!(status.blocked_spindle_starts, 1);
        assert!(!status.episode_active);
    }
}
