//! AT-modem link stack.
//!
//! Turns a lossy, text-based serial modem into a request/reply channel
//! for actuator setpoints.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Link Stack                            │
//! │                                                              │
//! │  ┌────────────┐   ┌──────────┐   ┌────────────────────────┐ │
//! │  │ ByteChannel│──▶│  Reader  │──▶│ classify (Connectivity)│ │
//! │  │ (trait)    │   │ (lines)  │   │ framer::decode (Inbox) │ │
//! │  └────────────┘   └──────────┘   └────────────────────────┘ │
//! │        ▲               ▲                                     │
//! │        │          ┌────┴─────┐   ┌────────────┐             │
//! │        └──────────│  Engine  │◀──│ Connection │◀── Driver   │
//! │          (write)  │ send/wait│   │ (AT seq.)  │             │
//! │                   └──────────┘   └────────────┘             │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod connection;
pub mod engine;
pub mod framer;
pub mod node;
pub mod reader;
pub mod transport;

/// Byte-wise substring search.
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}

/// Render modem bytes for log output.
pub(crate) fn as_text(raw: &[u8]) -> &str {
    core::str::from_utf8(raw).map_or("<non-utf8>", str::trim_end)
}
