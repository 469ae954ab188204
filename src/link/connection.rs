//! Connection lifecycle over the AT command set.
//!
//! ```text
//!  Disconnected ──associate──▶ Associating ──OK──▶ Associated
//!       ▲                          │ timeout: reset + retry
//!       │                          ▼
//!       └──── WIFI DISCONNECT ◀── Associated ──open_socket──▶ SocketOpening
//!                                     ▲                          │ OK
//!                                     └────── 0,CLOSED ◀── SocketOpen ◀┘
//! ```
//!
//! Steady states are derived from the [`Connectivity`] cache that the
//! reader maintains; the two transitional states exist only while their
//! command is on the wire.
//!
//! ## Retry policy
//!
//! Every handshake step gets `max_attempts` tries with a fixed
//! `retry_backoff_ms` pause between them.  A failed association resets
//! the modem before the next try.  Nothing retries forever: exhaustion is
//! reported to the caller, and the driver's staleness watchdog decides
//! when to start over.

use core::fmt::Write;

use log::{info, warn};

use super::contains;
use super::engine::{COMMAND_CAPACITY, CommandEngine, Outcome, Reply, reply_of, tokens};
use super::reader::Connectivity;
use super::transport::ByteChannel;
use crate::app::ports::{Clock, DiagnosticSink};
use crate::config::LinkConfig;
use crate::error::{FrameError, LinkError, Result};

/// Fixed AT commands.
pub mod commands {
    pub const RESET: &[u8] = b"AT+RST\r\n";
    pub const STATION_MODE: &[u8] = b"AT+CWMODE=1\r\n";
    pub const MULTI_CONNECTION: &[u8] = b"AT+CIPMUX=1\r\n";
    pub const CLOSE_SOCKET: &[u8] = b"AT+CIPCLOSE=0\r\n";
}

type CommandText = heapless::String<COMMAND_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Associating,
    Associated,
    SocketOpening,
    SocketOpen,
}

/// `OK` joins; `ERROR` or `FAIL` refuses.
fn join_verdict(line: &[u8]) -> Option<Reply> {
    match reply_of(line) {
        Some(reply) => Some(reply),
        None if contains(line, tokens::FAIL) => Some(Reply::Error),
        None => None,
    }
}

pub struct Connection<C, K, D> {
    engine: CommandEngine<C, K, D>,
    config: LinkConfig,
    /// Transitional state while a join or open is outstanding.
    phase: Option<LinkState>,
    command_timeout_ms: u32,
}

impl<C, K, D> Connection<C, K, D>
where
    C: ByteChannel,
    K: Clock,
    D: DiagnosticSink,
{
    pub fn new(engine: CommandEngine<C, K, D>, config: LinkConfig) -> Self {
        let command_timeout_ms = config.command_timeout_ms;
        Self {
            engine,
            config,
            phase: None,
            command_timeout_ms,
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn state(&self) -> LinkState {
        if let Some(phase) = self.phase {
            return phase;
        }
        let status = self.engine.status();
        if status.socket_open {
            LinkState::SocketOpen
        } else if status.network_joined {
            LinkState::Associated
        } else {
            LinkState::Disconnected
        }
    }

    pub fn status(&self) -> Connectivity {
        self.engine.status()
    }

    pub fn is_open(&self) -> bool {
        self.engine.status().socket_open
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn engine(&self) -> &CommandEngine<C, K, D> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut CommandEngine<C, K, D> {
        &mut self.engine
    }

    pub fn command_timeout_ms(&self) -> u32 {
        self.command_timeout_ms
    }

    pub fn set_command_timeout(&mut self, ms: u32) {
        self.command_timeout_ms = ms.max(1);
    }

    /// Drop the cached socket state; the next send reopens it.
    pub fn force_closed(&mut self) {
        self.engine.reader_mut().set_socket_open(false);
    }

    // ── Internal ──────────────────────────────────────────────

    fn enter(&mut self, phase: Option<LinkState>) {
        let before = self.state();
        self.phase = phase;
        let after = self.state();
        if before != after {
            info!("link: {:?} -> {:?}", before, after);
        }
    }

    fn drop_connectivity(&mut self) {
        let before = self.state();
        let reader = self.engine.reader_mut();
        reader.set_network_joined(false);
        reader.set_socket_open(false);
        if before != LinkState::Disconnected {
            info!("link: {:?} -> {:?}", before, LinkState::Disconnected);
        }
    }

    fn backoff(&mut self) {
        self.engine.delay_ms(self.config.retry_backoff_ms);
    }

    fn execute_with_retries(&mut self, what: &str, command: &[u8], timeout_ms: u32) -> Result<()> {
        let attempts = self.config.max_attempts.max(1);
        for attempt in 1..=attempts {
            match self.engine.execute(command, timeout_ms) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("link: {} attempt {}/{} failed: {}", what, attempt, attempts, e);
                    if attempt < attempts {
                        self.backoff();
                    }
                }
            }
        }
        Err(LinkError::RetriesExhausted.into())
    }

    // ── Handshake steps ───────────────────────────────────────

    /// Hardware reset.  Waits for the modem to boot, then drops its
    /// boot banner.  The modem comes back with no association and no
    /// socket.
    pub fn reset(&mut self) -> Result<()> {
        self.execute_with_retries("reset", commands::RESET, self.config.reset_timeout_ms)?;
        self.drop_connectivity();
        self.engine.delay_ms(self.config.reset_settle_ms);
        self.engine.flush_input();
        info!("link: modem reset");
        Ok(())
    }

    /// Put the modem in station (client) mode.
    pub fn set_station_mode(&mut self) -> Result<()> {
        self.execute_with_retries("station mode", commands::STATION_MODE, self.command_timeout_ms)
    }

    /// Allow multiple connections so sockets are addressed by link id.
    pub fn enable_multiplexing(&mut self) -> Result<()> {
        self.execute_with_retries(
            "multi-connection",
            commands::MULTI_CONNECTION,
            self.command_timeout_ms,
        )
    }

    /// Join the configured access point.
    pub fn associate(&mut self) -> Result<()> {
        let mut cmd = CommandText::new();
        write!(
            cmd,
            "AT+CWJAP=\"{}\",\"{}\"\r\n",
            self.config.ssid, self.config.password
        )
        .map_err(|_| FrameError::RequestTooLong)?;

        let attempts = self.config.max_attempts.max(1);
        for attempt in 1..=attempts {
            info!("link: joining '{}' (attempt {}/{})", self.config.ssid, attempt, attempts);
            self.enter(Some(LinkState::Associating));

            let mut verdict = None;
            let outcome = self.engine.send_and_await(
                cmd.as_bytes(),
                self.config.associate_timeout_ms,
                |line, _| {
                    verdict = join_verdict(line);
                    verdict.is_some()
                },
            );

            match (outcome, verdict) {
                (Outcome::Completed, Some(Reply::Ok)) => {
                    self.engine.reader_mut().set_network_joined(true);
                    self.enter(None);
                    return Ok(());
                }
                (Outcome::Completed, _) => {
                    self.enter(None);
                    warn!("link: join refused");
                    if attempt < attempts {
                        self.backoff();
                    }
                }
                (Outcome::TimedOut, _) => {
                    self.enter(None);
                    warn!("link: join timed out");
                    if attempt < attempts {
                        self.reset()?;
                    }
                }
            }
        }

        self.drop_connectivity();
        Err(LinkError::AssociationFailed.into())
    }

    /// Open the TCP socket to the remote host (link id 0).
    pub fn open_socket(&mut self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }
        if !self.status().network_joined {
            self.associate()?;
        }

        let mut cmd = CommandText::new();
        write!(
            cmd,
            "AT+CIPSTART=0,\"TCP\",\"{}\",{}\r\n",
            self.config.host, self.config.port
        )
        .map_err(|_| FrameError::RequestTooLong)?;

        self.enter(Some(LinkState::SocketOpening));
        let result = self.engine.execute(cmd.as_bytes(), self.command_timeout_ms);
        self.enter(None);

        match result {
            Ok(()) => {
                self.engine.reader_mut().set_socket_open(true);
                info!("link: socket open to {}:{}", self.config.host, self.config.port);
                Ok(())
            }
            // "ALREADY CONNECTED" arrives with ERROR but leaves the socket usable.
            Err(_) if self.is_open() => Ok(()),
            Err(e) => {
                warn!("link: socket open failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Close the socket.  A no-op unless joined and open.
    pub fn close_socket(&mut self) -> Result<()> {
        let status = self.status();
        if !(status.network_joined && status.socket_open) {
            return Ok(());
        }
        self.engine
            .execute(commands::CLOSE_SOCKET, self.command_timeout_ms)?;
        self.engine.reader_mut().set_socket_open(false);
        info!("link: socket closed");
        Ok(())
    }

    /// Full bring-up: reset → station mode → join → multi-connection.
    pub fn configure(&mut self) -> Result<()> {
        info!("link: configuring modem");
        self.engine.delay_ms(self.config.boot_delay_ms);
        self.engine.flush_input();
        self.force_closed();

        self.reset()?;
        self.set_station_mode()?;
        self.associate()?;
        self.enable_multiplexing()?;

        info!("link: modem configured");
        Ok(())
    }

    /// Two-phase socket send.
    ///
    /// Declares the payload length, waits for the modem to accept it, then
    /// writes the payload and waits until `on_line` accepts a line.
    /// `on_line` sees every line read in both phases, with the time it
    /// completed; only its verdict in the payload phase ends the wait.
    pub fn transmit<F>(&mut self, payload: &[u8], timeout_ms: u32, mut on_line: F) -> Result<Outcome>
    where
        F: FnMut(&[u8], u64) -> bool,
    {
        let status = self.status();
        if !status.network_joined || !status.socket_open {
            return Err(LinkError::NotConnected.into());
        }

        let mut cmd = CommandText::new();
        write!(cmd, "AT+CIPSEND=0,{}\r\n", payload.len()).map_err(|_| FrameError::RequestTooLong)?;

        let mut verdict = None;
        let outcome = self
            .engine
            .send_and_await(cmd.as_bytes(), self.command_timeout_ms, |line, ctx| {
                on_line(line, ctx.at_ms);
                verdict = reply_of(line);
                verdict.is_some() || !ctx.status.socket_open
            });

        if !self.is_open() {
            return Err(LinkError::NotConnected.into());
        }
        match (outcome, verdict) {
            (Outcome::Completed, Some(Reply::Ok)) => {}
            (Outcome::Completed, _) => return Err(LinkError::Rejected.into()),
            (Outcome::TimedOut, _) => return Err(LinkError::Timeout.into()),
        }

        let mut accepted = false;
        let outcome = self.engine.send_and_await(payload, timeout_ms, |line, ctx| {
            accepted = on_line(line, ctx.at_ms);
            accepted || !ctx.status.socket_open
        });

        if outcome == Outcome::Completed && !accepted {
            return Err(LinkError::NotConnected.into());
        }
        Ok(outcome)
    }
}
