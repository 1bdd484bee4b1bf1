//! Edge case and boundary condition tests for probe protection

use probe_protect::{
    config::RECORD_LEN,
    hal::{MockHost, MockSettings},
    hooks::{HookBus, HookContext, HookEvent, HookKind, HostHooks, MAX_OBSERVERS},
    install,
    messages::{MSG_INIT_FAILED, MSG_NOT_ASSERTED, MSG_PORT_UNAVAILABLE},
    InterlockState, NvsError, ProbeProtection, ProbeSource, ProtectError, ProtectionConfig,
    ProtectionFlags, RecordError, RuntimeOptions, SpindleState,
};

struct Noop;

impl HostHooks<MockHost> for Noop {
    fn on_event(&mut self, _event: &HookEvent, _ctx: &mut HookContext<'_, MockHost>) -> bool {
        true
    }
}

fn motion_protected(debounce_ms: u16) -> ProtectionConfig {
    ProtectionConfig::defaults_for(4).with_debounce_ms(debounce_ms)
}

fn connected(config: ProtectionConfig) -> (MockHost, ProbeProtection) {
    let mut host = MockHost::new(4);
    let mut protection = ProbeProtection::new(config, RuntimeOptions::default());
    protection.set_manual(&mut host, true).unwrap();
    host.clear_output();
    (host, protection)
}

// ============================================================================
// Timing Boundaries
// ============================================================================

#[test]
fn zero_debounce_trips_on_same_tick() {
    let (mut host, mut protection) = connected(motion_protected(0));

    host.probe.triggered = true;
    protection.on_motion_pulse(&host, 500);
    assert!(protection.poll(&mut host, 500).is_some());
    assert_eq!(host.stops(), 1);
}

#[test]
fn timestamp_overflow_handling() {
    let (mut host, mut protection) = connected(motion_protected(50));

    host.probe.triggered = true;
    protection.on_motion_pulse(&host, u64::MAX - 10);
    assert!(protection.poll(&mut host, u64::MAX - 1).is_none());
    assert!(protection.poll(&mut host, u64::MAX).is_some());
}

#[test]
fn new_edge_replaces_pending_check() {
    let (mut host, mut protection) = connected(motion_protected(50));

    host.probe.triggered = true;
    protection.on_motion_pulse(&host, 100);
    host.probe.triggered = false;
    protection.on_motion_pulse(&host, 120);
    host.probe.triggered = true;
    protection.on_motion_pulse(&host, 140);

    // The first edge's window has passed, the second has not
    assert!(protection.poll(&mut host, 150).is_none());
    assert!(protection.poll(&mut host, 190).is_some());
    assert_eq!(host.stops(), 1);
}

// ============================================================================
// Settings Boundaries
// ============================================================================

#[test]
fn record_too_short() {
    assert_eq!(
        ProtectionConfig::from_record(&[0; 3]),
        Err(RecordError::Truncated { len: 3 })
    );
}

#[test]
fn corrupt_record_restores_defaults() {
    let mut host = MockHost::new(4);
    let mut store = MockSettings::new();
    let mut record = ProtectionConfig::defaults_for(4).with_debounce_ms(5).to_record();
    record[RECORD_LEN - 1] ^= 0xFF;
    store.preload(0, &record);

    let protection =
        ProbeProtection::init(&mut host, &mut store, RuntimeOptions::default()).unwrap();
    assert_eq!(*protection.config(), ProtectionConfig::defaults_for(4));
    assert_eq!(store.save_count, 1);
}

#[test]
fn valid_record_is_not_rewritten() {
    let mut host = MockHost::new(4);
    let mut store = MockSettings::new();
    let config = ProtectionConfig::defaults_for(4).with_debounce_ms(5);
    store.preload(0, &config.to_record());

    let protection =
        ProbeProtection::init(&mut host, &mut store, RuntimeOptions::default()).unwrap();
    assert_eq!(*protection.config(), config);
    assert_eq!(store.save_count, 0);
}

#[test]
fn defaults_write_back_failure_is_a_config_fault() {
    let mut host = MockHost::new(4);
    let mut store = MockSettings::new();
    store.fail_saves = true;

    assert_eq!(
        ProbeProtection::init(&mut host, &mut store, RuntimeOptions::default()).unwrap_err(),
        ProtectError::Nvs(NvsError::Write)
    );

    let mut bus = HookBus::new();
    assert!(install(&mut bus, &mut host, &mut store, RuntimeOptions::default()).is_none());
    assert_eq!(
        host.messages.last().map(|m| m.text.as_str()),
        Some(MSG_INIT_FAILED)
    );
}

#[test]
fn stored_port_beyond_range_is_clamped() {
    let mut host = MockHost::new(4);
    let mut store = MockSettings::new();
    let config = ProtectionConfig::defaults_for(4)
        .with_connect_port(9)
        .with_flags(ProtectionFlags::default().with_ext_pin(true, false));
    store.preload(0, &config.to_record());

    let protection =
        ProbeProtection::init(&mut host, &mut store, RuntimeOptions::default()).unwrap();
    assert_eq!(protection.config().connect_port, 3);
    assert!(host.ports.is_claimed(3));
}

#[test]
fn single_port_shared_by_both_pins_fails() {
    let mut host = MockHost::new(1);
    let mut store = MockSettings::new();
    let config = ProtectionConfig::defaults_for(1).with_flags(
        ProtectionFlags::default()
            .with_ext_pin(true, false)
            .with_tool_pin(true, false),
    );
    store.preload(0, &config.to_record());

    let mut bus = HookBus::new();
    assert!(install(&mut bus, &mut host, &mut store, RuntimeOptions::default()).is_none());
    assert_eq!(
        host.messages.last().map(|m| m.text.as_str()),
        Some(MSG_PORT_UNAVAILABLE)
    );
}

#[test]
fn inverted_connect_pin_open_at_boot() {
    let mut host = MockHost::new(4);
    let mut store = MockSettings::new();
    let config = ProtectionConfig::defaults_for(4)
        .with_connect_port(0)
        .with_flags(
            ProtectionFlags::default()
                .with_ext_pin(true, true)
                .with_motion_protect(true),
        );
    store.preload(0, &config.to_record());

    // Low level on an active-low input
    let protection =
        ProbeProtection::init(&mut host, &mut store, RuntimeOptions::default()).unwrap();
    assert!(protection.is_connected());
    assert_eq!(protection.interlock_state(), InterlockState::Armed);
    assert_eq!(host.messages.len(), 1);
}

// ============================================================================
// Hook Capacity
// ============================================================================

#[test]
fn full_hook_chains_reject_install() {
    let mut host = MockHost::new(4);
    let mut store = MockSettings::new();
    let mut bus = HookBus::new();
    for _ in 0..MAX_OBSERVERS {
        bus.register(Noop, &[HookKind::DriverReset]).unwrap();
    }

    assert!(install(&mut bus, &mut host, &mut store, RuntimeOptions::default()).is_none());
    assert_eq!(bus.len(), MAX_OBSERVERS);
    assert_eq!(
        host.messages.last().map(|m| m.text.as_str()),
        Some(MSG_INIT_FAILED)
    );
}

// ============================================================================
// Tool Numbers
// ============================================================================

#[test]
fn custom_reserved_tool() {
    let mut host = MockHost::new(4);
    let mut protection = ProbeProtection::new(
        ProtectionConfig::defaults_for(4),
        RuntimeOptions::default().with_reserved_tool(1),
    );

    protection.on_tool_selected(&mut host, 99);
    assert!(!protection.is_connected());
    protection.on_tool_selected(&mut host, 1);
    assert!(protection.is_connected());
}

#[test]
fn extreme_tool_numbers() {
    let mut host = MockHost::new(4);
    let mut protection =
        ProbeProtection::new(ProtectionConfig::defaults_for(4), RuntimeOptions::default());

    protection.on_tool_selected(&mut host, 0);
    protection.on_tool_selected(&mut host, u32::MAX);
    assert!(!protection.is_connected());
    assert!(host.messages.is_empty());
}

#[test]
fn reserved_tool_ignored_when_disabled() {
    let mut host = MockHost::new(4);
    let config = ProtectionConfig::defaults_for(4)
        .with_flags(ProtectionFlags::default().with_motion_protect(true));
    let mut protection = ProbeProtection::new(config, RuntimeOptions::default());

    protection.on_tool_selected(&mut host, 99);
    assert!(!protection.is_connected());
    let applied = protection.set_spindle_state(&mut host, SpindleState::cw(), 1000.0);
    assert_eq!(applied, SpindleState::cw());
}

// ============================================================================
// Redundant and Out-of-Order Requests
// ============================================================================

#[test]
fn disconnect_when_not_connected_warns() {
    let mut host = MockHost::new(4);
    let mut protection =
        ProbeProtection::new(ProtectionConfig::defaults_for(4), RuntimeOptions::default());

    assert!(protection.set_manual(&mut host, false).is_err());
    assert_eq!(host.warnings(), 1);
    assert_eq!(host.messages[0].text.as_str(), MSG_NOT_ASSERTED);
}

#[test]
fn repeated_fixture_start_keeps_first_saved_state() {
    let mut host = MockHost::new(4);
    let config = ProtectionConfig::defaults_for(4).with_flags(
        ProtectionFlags::default()
            .with_invert_tool_probe(true)
            .with_tool_pin(true, true),
    );
    let mut protection = ProbeProtection::new(config, RuntimeOptions::default());

    protection.on_probe_fixture(&mut host, None, true, true);
    protection.on_probe_fixture(&mut host, None, true, true);
    assert!(host.probe_invert);
    assert_eq!(host.invert_writes, 1);

    protection.on_probe_fixture(&mut host, None, true, false);
    assert!(!host.probe_invert);
    assert_eq!(protection.probe_source(), ProbeSource::Host);
}

#[test]
fn fixture_on_away_from_fixture_ends_episode() {
    let mut host = MockHost::new(4);
    let config = ProtectionConfig::defaults_for(4)
        .with_flags(ProtectionFlags::default().with_tool_pin(true, false));
    let mut protection = ProbeProtection::new(config, RuntimeOptions::default());

    protection.on_probe_fixture(&mut host, None, true, true);
    protection.on_probe_fixture(&mut host, None, false, true);
    assert!(!protection.episode_active());
    assert_eq!(protection.probe_source(), ProbeSource::Host);
}

#[test]
fn active_low_tool_setter() {
    let mut host = MockHost::new(4);
    let config = ProtectionConfig::defaults_for(4)
        .with_toolprobe_port(1)
        .with_flags(ProtectionFlags::default().with_tool_pin(true, true));
    let mut protection = ProbeProtection::new(config, RuntimeOptions::default());

    protection.on_probe_fixture(&mut host, None, true, true);
    assert!(protection.read_probe(&host).triggered);
    host.ports.set_level(1, true);
    assert!(!protection.read_probe(&host).triggered);
}

#[test]
fn every_blocked_start_is_counted() {
    let (mut host, mut protection) = connected(motion_protected(50));

    for _ in 0..3 {
        protection.set_spindle_state(&mut host, SpindleState::ccw(), 500.0);
    }
    assert_eq!(protection.status().blocked_spindle_starts, 3);
    assert_eq!(host.stops(), 3);
    assert!(host.spindle.iter().all(|(state, rpm)| !state.on && *rpm == 0.0));
}
