//! Tool-setter fixture probing: probe-read redirection and setting overrides.
//!
//! During a fixture-probing episode the active probe reader may be swapped
//! for one that samples the tool-setter input, and the host's probe-pin
//! inversion and hard-limit settings may be overridden. Every override is
//! stored as an `Option` holding the value it replaced, so restoring is a
//! `take()`: it happens at most once and is a no-op when nothing was saved.
//!
//! ```rust
//! use probe_protect::config::{ProtectionConfig, ProtectionFlags};
//! use probe_protect::hal::MockHost;
//! use probe_protect::redirect::{ProbeSource, ToolProbeRedirector};
//! use probe_protect::traits::MachineHost;
//!
//! let mut host = MockHost::new(4);
//! let config = ProtectionConfig::defaults_for(4)
//!     .with_toolprobe_port(2)
//!     .with_flags(ProtectionFlags::default().with_tool_pin(true, false));
//!
//! let mut redirector = ToolProbeRedirector::new();
//! redirector.begin(&mut host, &config);
//! assert_eq!(redirector.source(), ProbeSource::ToolSetter { port: 2, invert: false });
//!
//! host.ports.set_level(2, true);
//! let state = redirector.read(&host);
//! assert!(state.connected && state.triggered);
//!
//! redirector.end(&mut host);
//! assert_eq!(redirector.source(), ProbeSource::Host);
//! ```

use crate::config::ProtectionConfig;
use crate::traits::{MachineHost, PortId, ProbeState};

/// Where probe readings come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ProbeSource {
    /// The host's own probe input.
    #[default]
    Host,
    /// The tool-setter input, with its own polarity.
    ToolSetter {
        /// Tool-setter input port.
        port: PortId,
        /// Input is active low.
        invert: bool,
    },
}

impl ProbeSource {
    /// Sample this source.
    ///
    /// The tool-setter is permanently mounted and always reads as connected.
    pub fn read<H: MachineHost>(&self, host: &H) -> ProbeState {
        match *self {
            ProbeSource::Host => host.probe_state(),
            ProbeSource::ToolSetter { port, invert } => ProbeState {
                connected: true,
                triggered: host.read_input(port) != invert,
            },
        }
    }
}

/// Active probe source plus the one it displaced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProbeRouter {
    active: ProbeSource,
    saved: Option<ProbeSource>,
}

impl ProbeRouter {
    /// Route to the host's own reader.
    pub const fn new() -> Self {
        Self {
            active: ProbeSource::Host,
            saved: None,
        }
    }

    /// Active source.
    pub fn active(&self) -> ProbeSource {
        self.active
    }

    /// Whether a source has been displaced.
    pub fn is_redirected(&self) -> bool {
        self.saved.is_some()
    }

    /// Substitute `source`, saving the current one.
    ///
    /// Refused while already redirected so the original is never lost.
    pub fn redirect(&mut self, source: ProbeSource) -> bool {
        if self.saved.is_some() {
            return false;
        }
        self.saved = Some(self.active);
        self.active = source;
        true
    }

    /// Put the saved source back. Returns `false` if nothing was saved.
    pub fn restore(&mut self) -> bool {
        match self.saved.take() {
            Some(source) => {
                self.active = source;
                true
            }
            None => false,
        }
    }
}

/// Fixture-probing episode state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ToolProbeRedirector {
    router: ProbeRouter,
    episode_active: bool,
    saved_invert: Option<bool>,
    saved_hard_limits: Option<bool>,
}

impl ToolProbeRedirector {
    /// No episode, no overrides.
    pub const fn new() -> Self {
        Self {
            router: ProbeRouter::new(),
            episode_active: false,
            saved_invert: None,
            saved_hard_limits: None,
        }
    }

    /// Whether a fixture episode is in progress.
    pub fn episode_active(&self) -> bool {
        self.episode_active
    }

    /// Whether probe reads go to the tool-setter.
    pub fn is_redirected(&self) -> bool {
        self.router.is_redirected()
    }

    /// Whether any override is waiting to be restored.
    pub fn has_overrides(&self) -> bool {
        self.router.is_redirected() || self.saved_invert.is_some() || self.saved_hard_limits.is_some()
    }

    /// Active probe source.
    pub fn source(&self) -> ProbeSource {
        self.router.active()
    }

    /// Read the probe through the active source.
    pub fn read<H: MachineHost>(&self, host: &H) -> ProbeState {
        self.router.active().read(host)
    }

    /// Start an episode and apply the configured overrides.
    ///
    /// A start while an episode is already running is ignored; returns
    /// `true` only when an episode began.
    pub fn begin<H: MachineHost>(&mut self, host: &mut H, config: &ProtectionConfig) -> bool {
        if self.episode_active {
            return false;
        }
        self.episode_active = true;

        let flags = &config.flags;
        if flags.invert_tool_probe && self.saved_invert.is_none() {
            let invert = host.probe_invert();
            self.saved_invert = Some(invert);
            host.set_probe_invert(!invert);
        }
        if flags.fixture_hard_limits && self.saved_hard_limits.is_none() {
            self.saved_hard_limits = Some(host.hard_limits_enabled());
            host.set_hard_limits(false);
        }
        if flags.use_tool_pin {
            self.router.redirect(ProbeSource::ToolSetter {
                port: config.toolprobe_port,
                invert: flags.invert_tool_pin,
            });
        }
        true
    }

    /// End the episode and restore every override.
    ///
    /// Returns `true` if an episode was running.
    pub fn end<H: MachineHost>(&mut self, host: &mut H) -> bool {
        let was_active = self.episode_active;
        self.episode_active = false;
        self.restore_overrides(host);
        was_active
    }

    /// Restore the probe reader, pin inversion and hard limits.
    ///
    /// Total and idempotent: each saved value is put back once, anything
    /// never overridden is left alone. Does not end the episode.
    pub fn restore_overrides<H: MachineHost>(&mut self, host: &mut H) -> bool {
        let mut restored = self.router.restore();
        if let Some(invert) = self.saved_invert.take() {
            host.set_probe_invert(invert);
            restored = true;
        }
        if let Some(enabled) = self.saved_hard_limits.take() {
            host.set_hard_limits(enabled);
            restored = true;
        }
        restored
    }

    /// End any episode and restore everything (controller reset).
    pub fn reset<H: MachineHost>(&mut self, host: &mut H) {
        self.end(host);
    }
}
