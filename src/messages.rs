//! User-visible messages and sender-facing message types.
//!
//! [`Message`] is what the protection reports through
//! [`MachineHost::report`](crate::traits::MachineHost::report). The texts
//! are fixed-capacity `heapless` strings so reporting never allocates.
//!
//! With the `serde` feature, [`ConnectRequest`] lets a sender set the manual
//! connect state over a JSON channel (the equivalent of M401/M402), and
//! status snapshots can be encoded with `serde-json-core` or `serde_json`.
//!
//! # Example
//!
//! ```rust
//! use probe_protect::messages::{Message, MessageKind};
//!
//! let msg = Message::warning("Probe connected signal already asserted!");
//! assert_eq!(msg.kind, MessageKind::Warning);
//! assert_eq!(msg.text.as_str(), "Probe connected signal already asserted!");
//! ```

use core::fmt::Write;

use crate::connection::{ConnectionEdge, ConnectionSource};
use heapless::String as HString;

/// Maximum length of a message text.
pub const MAX_MESSAGE_LEN: usize = 64;

/// Message text storage.
pub type MessageText = HString<MAX_MESSAGE_LEN>;

/// Banner written during option reporting.
pub const PLUGIN_BANNER: &str = "[PLUGIN:Probe Protection v0.02]";

/// Severity of a reported message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MessageKind {
    /// Informational state change.
    Info,
    /// Something the operator should look at.
    Warning,
}

/// A message for the host's message channel.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    /// Severity.
    pub kind: MessageKind,
    /// Text, truncated to [`MAX_MESSAGE_LEN`].
    pub text: MessageText,
}

impl Message {
    /// Informational message.
    pub fn info(text: &str) -> Self {
        Self {
            kind: MessageKind::Info,
            text: truncated(text),
        }
    }

    /// Warning message.
    pub fn warning(text: &str) -> Self {
        Self {
            kind: MessageKind::Warning,
            text: truncated(text),
        }
    }

    /// Describes a connection edge and what caused it.
    pub fn connection(edge: &ConnectionEdge) -> Self {
        let mut text = MessageText::new();
        let state = if edge.connected {
            "connected"
        } else {
            "disconnected"
        };
        let _ = write!(text, "Probe {} ({})", state, edge.cause.as_str());
        Self {
            kind: MessageKind::Info,
            text,
        }
    }

    /// Whether this is a warning.
    pub fn is_warning(&self) -> bool {
        self.kind == MessageKind::Warning
    }
}

/// Copy `s` into a [`MessageText`], cutting at a char boundary if too long.
fn truncated(s: &str) -> MessageText {
    let mut text = MessageText::new();
    for c in s.chars() {
        if text.push(c).is_err() {
            break;
        }
    }
    text
}

impl ConnectionSource {
    /// Short label used in messages.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConnectionSource::ExternalPin => "connect pin",
            ConnectionSource::Manual => "M401/M402",
            ConnectionSource::ToolSlot => "probe tool",
            ConnectionSource::Toggle => "toggle",
            ConnectionSource::Broadcast => "settings",
            ConnectionSource::Reset => "reset",
        }
    }
}

// ============================================================================
// Fixed Texts
// ============================================================================

/// Manual connect while already connected.
pub const MSG_ALREADY_ASSERTED: &str = "Probe connected signal already asserted!";
/// Manual disconnect while not connected.
pub const MSG_NOT_ASSERTED: &str = "Probe connected signal not asserted!";
/// Motion interlock tripped.
pub const MSG_PROBE_TRIGGERED: &str = "Probe triggered during motion, machine halted!";
/// Spindle start refused.
pub const MSG_SPINDLE_BLOCKED: &str = "Spindle start blocked, probe is connected!";
/// Boot warning for a configuration fault.
pub const MSG_INIT_FAILED: &str = "Probe protect plugin failed to initialize!";
/// Boot warning for a port that could not be claimed.
pub const MSG_PORT_UNAVAILABLE: &str = "Probe plugin: configured port number is not available";

// ============================================================================
// Sender Requests
// ============================================================================

/// Request to set the manual connect state.
///
/// # JSON Examples
///
/// ```json
/// {"connected": true}
/// {"connected": false}
/// ```
#[cfg(feature = "serde")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConnectRequest {
    /// `true` for M401, `false` for M402.
    pub connected: bool,
}

/// Parse a connect request from JSON bytes.
///
/// # Example
///
/// ```
/// use probe_protect::messages::parse_connect_request;
///
/// let req = parse_connect_request(br#"{"connected": true}"#).unwrap();
/// assert!(req.connected);
/// assert!(parse_connect_request(b"garbage").is_none());
/// ```
#[cfg(feature = "serde-json-core")]
pub fn parse_connect_request(json: &[u8]) -> Option<ConnectRequest> {
    serde_json_core::from_slice(json).ok().map(|(req, _)| req)
}

/// Maximum encoded size of a status snapshot.
#[cfg(feature = "serde-json-core")]
pub const MAX_STATUS_JSON: usize = 256;

/// Encode a status snapshot as JSON without allocating.
///
/// # Example
///
/// ```
/// use probe_protect::messages::encode_status;
/// use probe_protect::ProtectionStatus;
///
/// let json = encode_status(&ProtectionStatus::default()).unwrap();
/// assert!(json.contains("\"connected\":false"));
/// ```
#[cfg(feature = "serde-json-core")]
pub fn encode_status(
    status: &crate::protection::ProtectionStatus,
) -> Option<HString<MAX_STATUS_JSON>> {
    serde_json_core::to_string(status).ok()
}

/// Encode a status snapshot as a JSON string (desktop senders).
#[cfg(feature = "json")]
pub fn status_json(
    status: &crate::protection::ProtectionStatus,
) -> Result<alloc::string::String, serde_json::Error> {
    serde_json::to_string(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_and_warning() {
        let info = Message::info("hello");
        assert_eq!(info.kind, MessageKind::Info);
        assert!(!info.is_warning());

        let warn = Message::warning("careful");
        assert!(warn.is_warning());
        assert_eq!(warn.text.as_str(), "careful");
    }

    #[test]
    fn long_text_is_truncated() {
        let long = "x".repeat(MAX_MESSAGE_LEN + 10);
        let msg = Message::info(&long);
        assert_eq!(msg.text.len(), MAX_MESSAGE_LEN);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "é".repeat(MAX_MESSAGE_LEN);
        let msg = Message::info(&long);
        assert_eq!(msg.text.len(), MAX_MESSAGE_LEN);
        assert_eq!(msg.text.chars().count(), MAX_MESSAGE_LEN / 2);
    }

    #[test]
    fn connection_message_names_cause() {
        let edge = ConnectionEdge {
            connected: true,
            cause: ConnectionSource::ToolSlot,
        };
        let msg = Message::connection(&edge);
        assert_eq!(msg.kind, MessageKind::Info);
        assert_eq!(msg.text.as_str(), "Probe connected (probe tool)");

        let edge = ConnectionEdge {
            connected: false,
            cause: ConnectionSource::Manual,
        };
        assert_eq!(
            Message::connection(&edge).text.as_str(),
            "Probe disconnected (M401/M402)"
        );
    }

    #[test]
    fn fixed_texts_fit() {
        for text in [
            MSG_ALREADY_ASSERTED,
            MSG_NOT_ASSERTED,
            MSG_PROBE_TRIGGERED,
            MSG_SPINDLE_BLOCKED,
            MSG_INIT_FAILED,
            MSG_PORT_UNAVAILABLE,
        ] {
            assert!(text.len() <= MAX_MESSAGE_LEN);
        }
    }

    #[cfg(feature = "json")]
    #[test]
    fn connect_request_serde_json() {
        let req: ConnectRequest = serde_json::from_str(r#"{"connected": false}"#).unwrap();
        assert!(!req.connected);
        let json = serde_json::to_string(&ConnectRequest { connected: true }).unwrap();
        assert_eq!(json, r#"{"connected":true}"#);
    }

    #[cfg(feature = "json")]
    #[test]
    fn status_json_names_sources() {
        let json = status_json(&crate::protection::ProtectionStatus::default()).unwrap();
        assert!(json.contains(r#""manual_command":false"#));
        assert!(json.contains(r#""interlock":"disarmed""#));
    }

    #[cfg(feature = "serde-json-core")]
    #[test]
    fn parse_connect_request_rejects_missing_field() {
        assert!(parse_connect_request(br#"{}"#).is_none());
    }
}
