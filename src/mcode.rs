//! M401 / M402 user M-codes.
//!
//! `M401` asserts the manual "probe connected" source and `M402` clears it.
//! The host's user M-code table is a chain like its event hooks: a code this
//! handler does not claim is reported as [`McodeStatus::Unhandled`] so the
//! host can offer it to the next handler.
//!
//! Tip: put `M401` in a startup block to boot with the probe considered
//! connected.
//!
//! ```rust
//! use probe_protect::hal::MockHost;
//! use probe_protect::mcode::{McodeHandler, McodeStatus};
//! use probe_protect::traits::RealtimeCommand;
//! use probe_protect::ProbeProtection;
//!
//! let mut host = MockHost::new(4);
//! let mut protection = ProbeProtection::new(Default::default(), Default::default());
//! let handler = McodeHandler::new();
//!
//! assert!(handler.check(401).is_some());
//! assert_eq!(handler.execute(&mut protection, &mut host, 401), McodeStatus::Ok);
//! assert!(protection.is_connected());
//! assert_eq!(host.realtime, [RealtimeCommand::ProbeConnectedToggle]);
//!
//! assert_eq!(handler.execute(&mut protection, &mut host, 3), McodeStatus::Unhandled);
//! ```

use crate::protection::ProbeProtection;
use crate::traits::{MachineHost, RealtimeCommand};

/// Set probe connected.
pub const M_PROBE_CONNECT: u16 = 401;
/// Clear probe connected.
pub const M_PROBE_DISCONNECT: u16 = 402;

/// An M-code claimed by this handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeMcode {
    /// M401.
    Connect,
    /// M402.
    Disconnect,
}

impl ProbeMcode {
    /// Parse a user M-code number.
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            M_PROBE_CONNECT => Some(ProbeMcode::Connect),
            M_PROBE_DISCONNECT => Some(ProbeMcode::Disconnect),
            _ => None,
        }
    }

    /// M-code number.
    pub const fn code(self) -> u16 {
        match self {
            ProbeMcode::Connect => M_PROBE_CONNECT,
            ProbeMcode::Disconnect => M_PROBE_DISCONNECT,
        }
    }

    /// Requested manual connect state.
    pub const fn connected(self) -> bool {
        matches!(self, ProbeMcode::Connect)
    }
}

/// Result of validating or executing a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum McodeStatus {
    /// Handled.
    Ok,
    /// Not ours; pass to the next handler.
    Unhandled,
    /// Ours, but the block carries value words these codes do not take.
    ValueWordsNotAllowed,
}

/// User M-code handler for M401 / M402.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct McodeHandler;

impl McodeHandler {
    /// New handler.
    pub const fn new() -> Self {
        Self
    }

    /// Claim check: `Some` for M401 / M402.
    pub fn check(&self, code: u16) -> Option<ProbeMcode> {
        ProbeMcode::from_code(code)
    }

    /// Parse-time validation. `has_value_words` is whether the block
    /// carries words the parser could not attribute to another command.
    pub fn validate(&self, code: u16, has_value_words: bool) -> McodeStatus {
        match ProbeMcode::from_code(code) {
            None => McodeStatus::Unhandled,
            Some(_) if has_value_words => McodeStatus::ValueWordsNotAllowed,
            Some(_) => McodeStatus::Ok,
        }
    }

    /// Execute a validated block.
    ///
    /// Does nothing in check mode. A state change enqueues a
    /// [`RealtimeCommand::ProbeConnectedToggle`] so the host re-broadcasts;
    /// a redundant request only warns.
    pub fn execute<H: MachineHost>(
        &self,
        protection: &mut ProbeProtection,
        host: &mut H,
        code: u16,
    ) -> McodeStatus {
        let Some(mcode) = ProbeMcode::from_code(code) else {
            return McodeStatus::Unhandled;
        };
        if host.in_check_mode() {
            return McodeStatus::Ok;
        }
        if protection.set_manual(host, mcode.connected()).is_ok() {
            host.enqueue_realtime(RealtimeCommand::ProbeConnectedToggle);
        }
        McodeStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockHost;
    use crate::messages::{MSG_ALREADY_ASSERTED, MSG_NOT_ASSERTED};

    fn setup() -> (MockHost, ProbeProtection, McodeHandler) {
        (
            MockHost::new(4),
            ProbeProtection::new(Default::default(), Default::default()),
            McodeHandler::new(),
        )
    }

    #[test]
    fn claims_only_its_codes() {
        let handler = McodeHandler::new();
        assert_eq!(handler.check(401), Some(ProbeMcode::Connect));
        assert_eq!(handler.check(402), Some(ProbeMcode::Disconnect));
        assert_eq!(handler.check(400), None);
        assert_eq!(ProbeMcode::Disconnect.code(), 402);
    }

    #[test]
    fn validate() {
        let handler = McodeHandler::new();
        assert_eq!(handler.validate(401, false), McodeStatus::Ok);
        assert_eq!(handler.validate(402, true), McodeStatus::ValueWordsNotAllowed);
        assert_eq!(handler.validate(100, false), McodeStatus::Unhandled);
    }

    #[test]
    fn connect_then_disconnect() {
        let (mut host, mut protection, handler) = setup();
        handler.execute(&mut protection, &mut host, 401);
        handler.execute(&mut protection, &mut host, 402);
        assert!(!protection.is_connected());
        assert_eq!(host.realtime.len(), 2);
        assert_eq!(host.warnings(), 0);
    }

    #[test]
    fn redundant_connect_warns_without_toggle() {
        let (mut host, mut protection, handler) = setup();
        handler.execute(&mut protection, &mut host, 401);
        assert_eq!(handler.execute(&mut protection, &mut host, 401), McodeStatus::Ok);
        assert_eq!(host.realtime, [RealtimeCommand::ProbeConnectedToggle]);
        assert_eq!(host.messages.last().map(|m| m.text.as_str()), Some(MSG_ALREADY_ASSERTED));
        assert!(protection.sub_flags().manual_command);
    }

    #[test]
    fn redundant_disconnect_warns() {
        let (mut host, mut protection, handler) = setup();
        handler.execute(&mut protection, &mut host, 402);
        assert_eq!(host.warnings(), 1);
        assert_eq!(host.messages[0].text.as_str(), MSG_NOT_ASSERTED);
        assert!(host.realtime.is_empty());
    }

    #[test]
    fn check_mode_is_ignored() {
        let (mut host, mut protection, handler) = setup();
        host.check_mode = true;
        assert_eq!(handler.execute(&mut protection, &mut host, 401), McodeStatus::Ok);
        assert!(!protection.is_connected());
        assert!(host.realtime.is_empty());
        assert!(host.messages.is_empty());
    }
}
