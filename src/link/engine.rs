//! Command/response engine.
//!
//! Writes one AT command, then busy-polls the [`ResponseReader`] until a
//! caller-supplied predicate recognises a terminal line or the command
//! timeout elapses.  The engine never retries on its own; retry policy
//! belongs to [`Connection`](super::connection::Connection).
//!
//! While a command is outstanding nothing else in the process runs.
//! Every wait is bounded by its timeout, so the worst-case stall of a
//! control-loop tick is known up front.

use log::{debug, warn};

use super::reader::{Connectivity, EOL, ResponseReader};
use super::transport::ByteChannel;
use super::{as_text, contains};
use crate::app::ports::{Clock, DiagnosticSink, Direction};
use crate::error::LinkError;

/// Largest command text kept for diagnostics.
pub const COMMAND_CAPACITY: usize = 192;

/// Terminal tokens.
pub mod tokens {
    pub const OK: &[u8] = b"OK";
    pub const ERROR: &[u8] = b"ERROR";
    pub const FAIL: &[u8] = b"FAIL";
    pub const SEND_FAIL: &[u8] = b"SEND FAIL";
}

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The predicate accepted a line.
    Completed,
    /// The timeout elapsed first.
    TimedOut,
}

/// Verdict carried by an `OK`/`ERROR` terminated reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Error,
}

/// Classify a line as an `OK` or `ERROR` terminal, if it is one.
pub fn reply_of(line: &[u8]) -> Option<Reply> {
    if contains(line, tokens::OK) {
        Some(Reply::Ok)
    } else if contains(line, tokens::ERROR) {
        Some(Reply::Error)
    } else {
        None
    }
}

/// What the engine knows at the moment a line completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineContext {
    /// Connectivity after the line was classified.
    pub status: Connectivity,
    /// Clock reading when the line completed.
    pub at_ms: u64,
}

/// The command currently awaiting its reply.
#[derive(Debug, Clone)]
pub struct PendingCommand {
    text: heapless::Vec<u8, COMMAND_CAPACITY>,
    pub sent_at: u64,
    pub timeout_ms: u32,
}

impl PendingCommand {
    /// Command bytes as written (truncated to [`COMMAND_CAPACITY`]).
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.sent_at) > u64::from(self.timeout_ms)
    }
}

/// Owns the channel, clock, diagnostics and line reader.
pub struct CommandEngine<C, K, D> {
    channel: C,
    clock: K,
    diag: D,
    reader: ResponseReader,
    pending: Option<PendingCommand>,
    terminator: u8,
}

impl<C, K, D> CommandEngine<C, K, D>
where
    C: ByteChannel,
    K: Clock,
    D: DiagnosticSink,
{
    pub fn new(channel: C, clock: K, diag: D) -> Self {
        Self {
            channel,
            clock,
            diag,
            reader: ResponseReader::new(),
            pending: None,
            terminator: EOL,
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn status(&self) -> Connectivity {
        self.reader.status()
    }

    pub fn reader_mut(&mut self) -> &mut ResponseReader {
        &mut self.reader
    }

    /// Last line the reader completed.
    pub fn last_line(&self) -> &[u8] {
        self.reader.line()
    }

    pub fn pending(&self) -> Option<&PendingCommand> {
        self.pending.as_ref()
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn delay_ms(&mut self, ms: u32) {
        if ms > 0 {
            self.clock.delay_ms(ms);
        }
    }

    // ── I/O ───────────────────────────────────────────────────

    /// Write `command` and open a new pending command.
    ///
    /// Writes are best-effort: a short or failed write is logged and the
    /// wait proceeds anyway, surfacing as a timeout if the modem never saw
    /// the command.  Returns the number of bytes accepted.
    pub fn send(&mut self, command: &[u8], timeout_ms: u32) -> usize {
        debug!("REQ -> {}", as_text(command));
        self.diag.record(Direction::Request, command);

        let mut written = 0;
        while written < command.len() {
            match self.channel.write(&command[written..]) {
                Ok(0) => {
                    warn!("engine: channel accepted 0 bytes ({}/{} sent)", written, command.len());
                    break;
                }
                Ok(n) => written += n,
                Err(e) => {
                    warn!("engine: channel write failed: {:?}", e);
                    break;
                }
            }
        }
        if let Err(e) = self.channel.flush() {
            warn!("engine: channel flush failed: {:?}", e);
        }

        let mut text = heapless::Vec::new();
        let keep = command.len().min(COMMAND_CAPACITY);
        let _ = text.extend_from_slice(&command[..keep]);
        self.pending = Some(PendingCommand {
            text,
            sent_at: self.clock.now_ms(),
            timeout_ms,
        });

        written
    }

    /// Read at most one complete line.  Returns `true` if one was read;
    /// the line is then available from [`last_line`](Self::last_line).
    pub fn poll_line(&mut self) -> bool {
        self.reader
            .read_line(&mut self.channel, self.terminator, &mut self.diag)
            .is_some()
    }

    /// Drop all buffered modem output.
    pub fn flush_input(&mut self) -> usize {
        self.reader.flush_input(&mut self.channel)
    }

    /// Send `command`, then wait for `terminal` to accept a line.
    ///
    /// `terminal` sees each completed line together with its
    /// [`LineContext`].
    pub fn send_and_await<F>(&mut self, command: &[u8], timeout_ms: u32, terminal: F) -> Outcome
    where
        F: FnMut(&[u8], LineContext) -> bool,
    {
        self.send(command, timeout_ms);
        self.await_terminal(terminal)
    }

    /// Wait on the pending command.  Without one, times out immediately.
    pub fn await_terminal<F>(&mut self, mut terminal: F) -> Outcome
    where
        F: FnMut(&[u8], LineContext) -> bool,
    {
        if self.pending.is_none() {
            return Outcome::TimedOut;
        }

        loop {
            if self.poll_line() {
                let ctx = LineContext {
                    status: self.reader.status(),
                    at_ms: self.clock.now_ms(),
                };
                if terminal(self.reader.line(), ctx) {
                    self.pending = None;
                    return Outcome::Completed;
                }
            }

            let now = self.clock.now_ms();
            if self.pending.as_ref().is_none_or(|p| p.is_expired(now)) {
                if let Some(p) = self.pending.take() {
                    debug!("engine: '{}' timed out after {} ms", as_text(p.text()), p.timeout_ms);
                }
                return Outcome::TimedOut;
            }
        }
    }

    /// Send a command terminated by `OK` or `ERROR`.
    pub fn execute(&mut self, command: &[u8], timeout_ms: u32) -> Result<(), LinkError> {
        let mut reply = None;
        let outcome = self.send_and_await(command, timeout_ms, |line, _| {
            reply = reply_of(line);
            reply.is_some()
        });
        match (outcome, reply) {
            (Outcome::Completed, Some(Reply::Ok)) => Ok(()),
            (Outcome::Completed, Some(Reply::Error)) => Err(LinkError::Rejected),
            _ => Err(LinkError::Timeout),
        }
    }
}
