//! Application message framing.
//!
//! Outbound (node → host), one line per setpoint report:
//! ```text
//! {node_id}:{value};{optional one-shot config}\r\n     e.g.  3:42.5000;\r\n
//! {node_id}:?;\r\n                                     configuration request
//! ```
//!
//! Inbound (host → node), embedded anywhere in a modem line (usually
//! behind a `+IPD,0,n:` data header):
//! ```text
//! cmd:{payload};;      setpoint / command
//! cfg:{payload};;      configuration
//! cmd:nc;;             no change, keep the previous payload
//! ```
//!
//! The payload is taken from the last `:` before the first `;;`, so any
//! modem header in front of the message is skipped.

use core::fmt::{self, Write};

use super::engine::tokens;
use super::{contains, find};
use crate::error::FrameError;

/// Outbound request buffer size.
pub const REQUEST_CAPACITY: usize = 128;

/// Stored inbound payload size; longer payloads are truncated.
pub const MESSAGE_CAPACITY: usize = 64;

/// One-shot configuration suffix buffer size.
pub const SUFFIX_CAPACITY: usize = 96;

/// An encoded outbound request.
pub type Request = heapless::String<REQUEST_CAPACITY>;

const CMD_PREFIX: &[u8] = b"cmd:";
const CFG_PREFIX: &[u8] = b"cfg:";
const NO_CHANGE: &[u8] = b"cmd:nc;;";
const END: &[u8] = b";;";

// ───────────────────────────────────────────────────────────────
// Encoding
// ───────────────────────────────────────────────────────────────

/// Encode a setpoint report.
///
/// The value is rendered with at least six characters and exactly four
/// fractional digits, so `1.23456` goes out as `1.2346`.
pub fn encode_setpoint(
    node: impl fmt::Display,
    value: f32,
    suffix: Option<&str>,
) -> Result<Request, FrameError> {
    let mut req = Request::new();
    write!(req, "{}:{:6.4};", node, value).map_err(|_| FrameError::RequestTooLong)?;
    if let Some(cfg) = suffix {
        req.push_str(cfg).map_err(|_| FrameError::RequestTooLong)?;
    }
    req.push_str("\r\n").map_err(|_| FrameError::RequestTooLong)?;
    Ok(req)
}

/// Encode a request for the node's configuration.
pub fn encode_config_request(node: impl fmt::Display) -> Result<Request, FrameError> {
    let mut req = Request::new();
    write!(req, "{}:?;\r\n", node).map_err(|_| FrameError::RequestTooLong)?;
    Ok(req)
}

// ───────────────────────────────────────────────────────────────
// Decoding
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Setpoint or command (`cmd:`).
    Command,
    /// Configuration (`cfg:`).
    Config,
}

/// What a modem line means to the application layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// `cmd:nc;;`: host is alive, payload unchanged.
    NoChange,
    /// A complete application message.
    Message { kind: MessageKind, payload: &'a str },
    /// `SEND FAIL` or `ERROR`: the last send did not go through.
    SendFailed,
    /// Anything else, including application lines missing their `;;`.
    Other,
}

impl Inbound<'_> {
    /// `true` if the line proves the remote host is talking to us.
    pub fn is_application_data(&self) -> bool {
        matches!(self, Self::NoChange | Self::Message { .. })
    }
}

/// Interpret one modem line.
///
/// The payload runs from the last `:` before the first `;;` up to that
/// `;;`.  A payload cannot itself contain `:`: `cmd:12:30;;` yields `30`.
pub fn decode(line: &[u8]) -> Inbound<'_> {
    if contains(line, NO_CHANGE) {
        return Inbound::NoChange;
    }

    if contains(line, CMD_PREFIX) || contains(line, CFG_PREFIX) {
        return match extract(line) {
            Some((kind, payload)) => Inbound::Message { kind, payload },
            None => Inbound::Other,
        };
    }

    if contains(line, tokens::SEND_FAIL) || contains(line, tokens::ERROR) {
        return Inbound::SendFailed;
    }

    Inbound::Other
}

fn extract(line: &[u8]) -> Option<(MessageKind, &str)> {
    let end = find(line, END)?;
    let head = &line[..end];
    let colon = head.iter().rposition(|&b| b == b':')?;

    let prefix = &head[..=colon];
    let kind = if prefix.ends_with(CFG_PREFIX) {
        MessageKind::Config
    } else if prefix.ends_with(CMD_PREFIX) || !contains(prefix, CFG_PREFIX) {
        MessageKind::Command
    } else {
        MessageKind::Config
    };

    let payload = core::str::from_utf8(&head[colon + 1..]).ok()?;
    Some((kind, payload))
}

// ───────────────────────────────────────────────────────────────
// Inbox: the last application message
// ───────────────────────────────────────────────────────────────

/// Most recent inbound application message and when data last arrived.
#[derive(Debug, Default)]
pub struct Inbox {
    payload: heapless::String<MESSAGE_CAPACITY>,
    kind: Option<MessageKind>,
    received_at: Option<u64>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a decoded line.  Returns `true` if it carried application
    /// data (a message or a no-change keepalive).
    pub fn accept(&mut self, inbound: &Inbound<'_>, now: u64) -> bool {
        if let Inbound::Message { kind, payload } = inbound {
            self.payload.clear();
            for ch in payload.chars() {
                if self.payload.push(ch).is_err() {
                    break;
                }
            }
            self.kind = Some(*kind);
        }
        let data = inbound.is_application_data();
        if data {
            self.received_at = Some(now);
        }
        data
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn kind(&self) -> Option<MessageKind> {
        self.kind
    }

    /// Timestamp (ms) of the last application data, if any.
    pub fn received_at(&self) -> Option<u64> {
        self.received_at
    }
}
