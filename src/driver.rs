//! Driver facade: the only type the control loop talks to.
//!
//! ```text
//!  control loop ──step(id, value)──▶ ModemDriver
//!                                      │ 1. staleness watchdog
//!                                      │ 2. drain pending modem lines
//!                                      │ 3. if the send interval elapsed:
//!                                      │      encode → CIPSEND → payload → reply
//!  control loop ◀──last_message()──────┘
//! ```
//!
//! `configure()` must run (and block) once before the first `step`.
//! After that the driver heals itself: when no application data has
//! arrived for `stale_after_ms`, it drops the socket and runs the whole
//! bring-up again.  The caller only ever sees the last good message.

use core::fmt;

use log::{debug, info, warn};

use crate::app::ports::{Clock, DiagnosticSink, NullDiagnostics};
use crate::config::LinkConfig;
use crate::error::{Error, FrameError, LinkError, Result};
use crate::link::connection::{Connection, LinkState};
use crate::link::engine::{CommandEngine, Outcome};
use crate::link::framer::{
    self, Inbound, Inbox, MessageKind, Request, SUFFIX_CAPACITY, decode,
};
use crate::link::node::NodeId;
use crate::link::reader::Connectivity;
use crate::link::transport::ByteChannel;

/// Upper bound on lines drained per `step`, so a chatty modem cannot
/// stall the control loop.
const DRAIN_LIMIT: usize = 16;

/// What one call to [`ModemDriver::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The send interval has not elapsed; nothing was sent.
    Skipped,
    /// A message was sent and the host answered.
    Replied,
    /// A message was sent but no application reply arrived in time.
    NoReply,
    /// The message could not be sent.
    Failed(Error),
}

/// Apply one modem line to the inbox.
///
/// A send failure clears the send timer so the next `step` retries at
/// once.  Returns `(application_data, send_failed)`.
fn absorb(inbox: &mut Inbox, send_timer: &mut Option<u64>, line: &[u8], now: u64) -> (bool, bool) {
    let inbound = decode(line);
    if inbound == Inbound::SendFailed {
        debug!("driver: send failure reported, clearing send timer");
        *send_timer = None;
        return (false, true);
    }
    (inbox.accept(&inbound, now), false)
}

pub struct ModemDriver<C, K, D = NullDiagnostics> {
    link: Connection<C, K, D>,
    inbox: Inbox,
    node: NodeId,
    /// Time of the last send; `None` forces the next `step` to send.
    last_send: Option<u64>,
    /// Start of the current staleness window (configure / reconnect).
    window_start: u64,
    actuator_cfg: Option<heapless::String<SUFFIX_CAPACITY>>,
    last_request: Request,
    reconnects: u32,
}

impl<C, K> ModemDriver<C, K, NullDiagnostics>
where
    C: ByteChannel,
    K: Clock,
{
    /// Build a driver without a diagnostic sink.
    pub fn new(channel: C, clock: K, config: LinkConfig) -> Result<Self> {
        Self::with_diagnostics(channel, clock, NullDiagnostics, config)
    }
}

impl<C, K, D> ModemDriver<C, K, D>
where
    C: ByteChannel,
    K: Clock,
    D: DiagnosticSink,
{
    /// Build a driver that mirrors all modem traffic into `diag`.
    pub fn with_diagnostics(channel: C, clock: K, diag: D, config: LinkConfig) -> Result<Self> {
        config.validate()?;
        let node = NodeId::new(config.node_id_min, config.node_id_max);
        let engine = CommandEngine::new(channel, clock, diag);
        let window_start = engine.now_ms();
        Ok(Self {
            link: Connection::new(engine, config),
            inbox: Inbox::new(),
            node,
            last_send: None,
            window_start,
            actuator_cfg: None,
            last_request: Request::new(),
            reconnects: 0,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Reset the modem, join the network and enable multiplexing.
    ///
    /// Blocks until done.  The staleness window restarts afterwards
    /// whether or not bring-up succeeded.
    pub fn configure(&mut self) -> Result<()> {
        let result = self.link.configure();
        self.window_start = self.now();
        if let Err(e) = result {
            warn!("driver: configure failed: {}", e);
        }
        result
    }

    /// Close the socket (no-op when it is not open).
    pub fn close(&mut self) -> Result<()> {
        self.link.close_socket()
    }

    /// One control-loop tick: watchdog, drain, and a rate-limited send of
    /// `value` under `node`.
    pub fn step(&mut self, node: impl fmt::Display, value: f32) -> StepOutcome {
        self.check_staleness();
        self.drain();

        let now = self.now();
        if !self.send_due(now) {
            return StepOutcome::Skipped;
        }
        self.last_send = Some(now);

        let request = match framer::encode_setpoint(node, value, self.actuator_cfg.as_deref()) {
            Ok(r) => r,
            Err(e) => return StepOutcome::Failed(e.into()),
        };
        if self.actuator_cfg.take().is_some() {
            debug!("driver: actuator config attached");
        }

        let timeout = self.link.command_timeout_ms();
        self.send_request(request, timeout)
    }

    /// Ask the host for this node's configuration.  Not rate-limited, but
    /// restarts the send interval.
    pub fn request_config(&mut self, node: impl fmt::Display) -> StepOutcome {
        self.drain();
        self.last_send = Some(self.now());

        let request = match framer::encode_config_request(node) {
            Ok(r) => r,
            Err(e) => return StepOutcome::Failed(e.into()),
        };
        let timeout = self.link.config().config_request_timeout_ms;
        self.send_request(request, timeout)
    }

    // ── Collaborator surface ──────────────────────────────────

    /// Attach `cfg` to the next setpoint report, once.
    pub fn set_actuator_config(&mut self, cfg: &str) -> Result<()> {
        let mut text = heapless::String::new();
        text.push_str(cfg).map_err(|_| FrameError::SuffixTooLong)?;
        self.actuator_cfg = Some(text);
        Ok(())
    }

    /// Most recent decoded payload (empty until the first reply).
    pub fn last_message(&self) -> &str {
        self.inbox.payload()
    }

    pub fn last_message_kind(&self) -> Option<MessageKind> {
        self.inbox.kind()
    }

    /// When application data (a message or a no-change keepalive) last
    /// arrived.
    pub fn last_received_at(&self) -> Option<u64> {
        self.inbox.received_at()
    }

    /// Raw text of the last application request sent.
    pub fn last_request(&self) -> &str {
        &self.last_request
    }

    pub fn is_open(&self) -> bool {
        self.link.is_open()
    }

    pub fn state(&self) -> LinkState {
        self.link.state()
    }

    pub fn connectivity(&self) -> Connectivity {
        self.link.status()
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn advance_node_id(&mut self) -> u8 {
        self.node.advance()
    }

    /// Make the next `step` send regardless of the interval.
    pub fn reset_send_timer(&mut self) {
        self.last_send = None;
    }

    pub fn set_command_timeout(&mut self, ms: u32) {
        self.link.set_command_timeout(ms);
    }

    /// Watchdog-driven reconfigurations so far.
    pub fn reconnects(&self) -> u32 {
        self.reconnects
    }

    // ── Internal ──────────────────────────────────────────────

    fn now(&self) -> u64 {
        self.link.engine().now_ms()
    }

    fn send_due(&self, now: u64) -> bool {
        match self.last_send {
            None => true,
            Some(at) => now.saturating_sub(at) > self.link.config().send_interval_ms(),
        }
    }

    fn check_staleness(&mut self) {
        let last_data = self
            .inbox
            .received_at()
            .map_or(self.window_start, |at| at.max(self.window_start));
        let idle = self.now().saturating_sub(last_data);
        if idle <= u64::from(self.link.config().stale_after_ms) {
            return;
        }

        warn!("driver: no data for {} ms, restarting connection", idle);
        self.reconnects = self.reconnects.saturating_add(1);
        self.link.force_closed();
        // Failure is already logged; the next window retries.
        let _ = self.configure();

        let settle = self.link.config().reconnect_settle_ms;
        self.link.engine_mut().delay_ms(settle);
        self.window_start = self.now();
    }

    fn drain(&mut self) {
        for _ in 0..DRAIN_LIMIT {
            if !self.link.engine_mut().poll_line() {
                break;
            }
            let now = self.now();
            absorb(
                &mut self.inbox,
                &mut self.last_send,
                self.link.engine().last_line(),
                now,
            );
        }
    }

    fn ensure_open(&mut self) -> Result<()> {
        if !self.link.status().network_joined {
            self.link.associate()?;
        }
        if !self.link.is_open() {
            self.link.open_socket()?;
        }
        Ok(())
    }

    fn send_request(&mut self, request: Request, timeout_ms: u32) -> StepOutcome {
        if let Err(e) = self.ensure_open() {
            return StepOutcome::Failed(e);
        }

        let Self {
            link,
            inbox,
            last_send,
            ..
        } = self;
        let mut replied = false;
        let mut failed = false;
        let result = link.transmit(request.as_bytes(), timeout_ms, |line, at| {
            let (data, send_failed) = absorb(inbox, last_send, line, at);
            replied |= data;
            failed |= send_failed;
            data || send_failed
        });
        self.last_request = request;

        match result {
            Ok(_) if failed => {
                info!("driver: send failed, retrying next step");
                StepOutcome::Failed(LinkError::Rejected.into())
            }
            Ok(Outcome::Completed) if replied => StepOutcome::Replied,
            Ok(_) => StepOutcome::NoReply,
            Err(e) => {
                if e == Error::Link(LinkError::Rejected) {
                    self.last_send = None;
                }
                StepOutcome::Failed(e)
            }
        }
    }
}
