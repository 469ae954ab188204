//! Unified error types for the actuator link.
//!
//! A single `Error` enum that every layer converts into, so the driver
//! facade and the control loop handle failures uniformly.  All variants
//! are `Copy`; nothing here allocates.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level link error
// ---------------------------------------------------------------------------

/// Every fallible operation in the driver funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The modem did not complete a command, or refused it.
    Link(LinkError),
    /// An outbound application message could not be built.
    Frame(FrameError),
    /// Link configuration is invalid.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Frame(e) => write!(f, "frame: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Link (modem command) errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// No terminal token arrived within the command timeout.
    Timeout,
    /// The modem answered `ERROR` (or `FAIL`).
    Rejected,
    /// The network is not joined or the socket is not open.
    NotConnected,
    /// Joining the access point failed on every attempt.
    AssociationFailed,
    /// A handshake step exhausted its retry budget.
    RetriesExhausted,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "command timed out"),
            Self::Rejected => write!(f, "command rejected by modem"),
            Self::NotConnected => write!(f, "socket not connected"),
            Self::AssociationFailed => write!(f, "WiFi association failed"),
            Self::RetriesExhausted => write!(f, "retries exhausted"),
        }
    }
}

impl std::error::Error for Error {}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Framing errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Encoded request exceeds the request buffer.
    RequestTooLong,
    /// One-shot configuration suffix exceeds its buffer.
    SuffixTooLong,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestTooLong => write!(f, "request too long"),
            Self::SuffixTooLong => write!(f, "configuration suffix too long"),
        }
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    InvalidSsid,
    InvalidPassword,
    InvalidHost,
    InvalidFrequency,
    InvalidTimeout,
    InvalidNodeRange,
    /// The configuration document could not be parsed.
    Malformed,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::InvalidHost => write!(f, "remote host must not be empty"),
            Self::InvalidFrequency => write!(f, "send frequency must be non-zero"),
            Self::InvalidTimeout => write!(f, "timeouts and attempt counts must be non-zero"),
            Self::InvalidNodeRange => write!(f, "node id range is empty"),
            Self::Malformed => write!(f, "configuration document malformed"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
