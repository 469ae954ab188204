//! Line reader and connectivity classifier.
//!
//! Accumulates modem output into a fixed 512-byte line buffer.  A line is
//! complete when the terminator byte arrives or the buffer fills; partial
//! lines survive across calls, so the reader can be polled whenever the
//! caller has time.
//!
//! Every completed line longer than one byte is scanned for the modem's
//! unsolicited connectivity reports and the cached [`Connectivity`] is
//! updated.  Classification is a plain substring search: garbled or
//! truncated lines simply fail to match.

use log::{trace, warn};

use super::transport::ByteChannel;
use super::{as_text, contains};
use crate::app::ports::{DiagnosticSink, Direction};

/// Line buffer capacity in bytes.
pub const LINE_CAPACITY: usize = 512;

/// Default line terminator.
pub const EOL: u8 = b'\n';

/// Substrings the modem emits for socket and network events.
pub mod markers {
    pub const SOCKET_CLOSED: &[u8] = b"0,CLOSED";
    pub const SOCKET_CONNECT: &[u8] = b"0,CONNECT";
    pub const ALREADY_CONNECTED: &[u8] = b"ALREADY CONNECTED";
    pub const WIFI_CONNECTED: &[u8] = b"WIFI CONNECTED";
    pub const WIFI_GOT_IP: &[u8] = b"WIFI GOT IP";
    pub const WIFI_DISCONNECT: &[u8] = b"WIFI DISCONNECT";
    pub const NO_IP: &[u8] = b"no ip";
}

/// Best-effort cache of the modem's network and socket state.
///
/// The modem is authoritative; this only reflects what has been
/// observed on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Connectivity {
    pub network_joined: bool,
    pub socket_open: bool,
}

/// Update `status` from one line.  Returns `true` if any marker matched.
pub fn classify(line: &[u8], status: &mut Connectivity) -> bool {
    let mut matched = false;

    if contains(line, markers::SOCKET_CLOSED) {
        status.socket_open = false;
        matched = true;
    } else if contains(line, markers::SOCKET_CONNECT) || contains(line, markers::ALREADY_CONNECTED)
    {
        status.socket_open = true;
        matched = true;
    }

    if contains(line, markers::WIFI_DISCONNECT) || contains(line, markers::NO_IP) {
        status.network_joined = false;
        matched = true;
    } else if contains(line, markers::WIFI_CONNECTED) || contains(line, markers::WIFI_GOT_IP) {
        status.network_joined = true;
        matched = true;
    }

    matched
}

/// Streaming line reader over a [`ByteChannel`].
pub struct ResponseReader {
    /// Bytes of the line currently being received.
    pending: heapless::Vec<u8, LINE_CAPACITY>,
    /// Last completed line; valid until the next completed line.
    line: heapless::Vec<u8, LINE_CAPACITY>,
    status: Connectivity,
}

impl Default for ResponseReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseReader {
    pub fn new() -> Self {
        Self {
            pending: heapless::Vec::new(),
            line: heapless::Vec::new(),
            status: Connectivity::default(),
        }
    }

    /// Current connectivity cache.
    pub fn status(&self) -> Connectivity {
        self.status
    }

    /// Record an association result reported by a command reply.
    pub fn set_network_joined(&mut self, joined: bool) {
        self.status.network_joined = joined;
    }

    /// Record a socket state reported by a command reply or forced by
    /// the staleness watchdog.
    pub fn set_socket_open(&mut self, open: bool) {
        self.status.socket_open = open;
    }

    /// Last completed line (empty before the first one).
    pub fn line(&self) -> &[u8] {
        &self.line
    }

    /// Number of bytes buffered towards the next line.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Pull bytes until a line completes or the channel runs dry.
    ///
    /// Returns `None` immediately when no byte is available; anything
    /// already buffered is kept for the next call.  The returned slice
    /// includes the terminator (if one was seen) and stays valid until the
    /// next call.
    pub fn read_line<C, D>(&mut self, channel: &mut C, terminator: u8, diag: &mut D) -> Option<&[u8]>
    where
        C: ByteChannel,
        D: DiagnosticSink,
    {
        loop {
            let mut byte = [0u8; 1];
            match channel.read(&mut byte) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    warn!("reader: channel read failed: {:?}", e);
                    return None;
                }
            }

            // Never full here: a full buffer completes the line below.
            let _ = self.pending.push(byte[0]);

            if byte[0] == terminator || self.pending.is_full() {
                break;
            }
        }

        if self.pending.is_full() {
            trace!("reader: line overflow, forcing completion at {} bytes", LINE_CAPACITY);
        }

        core::mem::swap(&mut self.pending, &mut self.line);
        self.pending.clear();

        if self.line.len() > 1 {
            classify(&self.line, &mut self.status);
            trace!("RES <- {}", as_text(&self.line));
            diag.record(Direction::Response, &self.line);
        }

        Some(&self.line)
    }

    /// Discard everything the modem has sent so far, including any
    /// partially received line.  Discarded bytes are not classified.
    pub fn flush_input<C: ByteChannel>(&mut self, channel: &mut C) -> usize {
        let mut scratch = [0u8; 64];
        let mut dropped = self.pending.len();
        self.pending.clear();
        loop {
            match channel.read(&mut scratch) {
                Ok(0) => break,
                Ok(n) => dropped += n,
                Err(e) => {
                    warn!("reader: channel read failed during flush: {:?}", e);
                    break;
                }
            }
        }
        if dropped > 0 {
            trace!("reader: flushed {} bytes", dropped);
        }
        dropped
    }
}
