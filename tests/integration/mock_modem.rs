//! Scripted modem and simulated clock for integration tests.
//!
//! `ScriptedModem` answers each write with the reply of the first rule
//! whose prefix matches the written bytes.  One-shot rules are consulted
//! before persistent ones, so a test can script "fail once, then work".
//! Both mocks are `Clone` handles onto shared state: the driver owns one
//! copy and the test keeps another for inspection.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use actuator_link::app::ports::{Clock, DiagnosticSink, Direction};
use actuator_link::config::LinkConfig;
use actuator_link::link::transport::ByteChannel;
use embedded_hal::delay::DelayNs;

// ── SimClock ──────────────────────────────────────────────────

/// Millisecond clock that ticks once per reading, so busy-wait loops
/// always make progress.
#[derive(Clone, Default)]
pub struct SimClock(Rc<Cell<u64>>);

#[allow(dead_code)]
impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }

    /// Current time without ticking.
    pub fn peek(&self) -> u64 {
        self.0.get()
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        let t = self.0.get() + 1;
        self.0.set(t);
        t
    }
}

impl DelayNs for SimClock {
    fn delay_ns(&mut self, ns: u32) {
        self.advance(u64::from(ns.div_ceil(1_000_000)));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance(u64::from(ms));
    }
}

// ── ScriptedModem ─────────────────────────────────────────────

struct Rule {
    prefix: Vec<u8>,
    reply: Vec<u8>,
}

#[derive(Default)]
struct Inner {
    rx: VecDeque<u8>,
    writes: Vec<Vec<u8>>,
    once: Vec<Rule>,
    always: Vec<Rule>,
}

impl Inner {
    fn answer(&mut self, data: &[u8]) {
        if let Some(i) = self.once.iter().position(|r| data.starts_with(&r.prefix)) {
            let rule = self.once.remove(i);
            self.rx.extend(rule.reply);
            return;
        }
        if let Some(rule) = self.always.iter().find(|r| data.starts_with(&r.prefix)) {
            self.rx.extend(rule.reply.iter().copied());
        }
    }
}

#[derive(Clone, Default)]
pub struct ScriptedModem(Rc<RefCell<Inner>>);

#[allow(dead_code)]
impl ScriptedModem {
    pub fn new() -> Self {
        Self::default()
    }

    /// A modem that completes the whole bring-up and opens sockets.
    pub fn healthy() -> Self {
        let modem = Self::new();
        modem.respond("AT+RST", "\r\nOK\r\n\r\nready\r\n");
        modem.respond("AT+CWMODE", "\r\nOK\r\n");
        modem.respond("AT+CWJAP", "WIFI CONNECTED\r\nWIFI GOT IP\r\n\r\nOK\r\n");
        modem.respond("AT+CIPMUX", "\r\nOK\r\n");
        modem.respond("AT+CIPSTART", "0,CONNECT\r\n\r\nOK\r\n");
        modem.respond("AT+CIPSEND", "\r\nOK\r\n> ");
        modem.respond("AT+CIPCLOSE", "0,CLOSED\r\n\r\nOK\r\n");
        modem
    }

    /// Answer every write starting with `prefix`.
    pub fn respond(&self, prefix: &str, reply: &str) {
        self.0.borrow_mut().always.insert(
            0,
            Rule {
                prefix: prefix.as_bytes().to_vec(),
                reply: reply.as_bytes().to_vec(),
            },
        );
    }

    /// Answer the next write starting with `prefix`, once.
    pub fn respond_once(&self, prefix: &str, reply: &str) {
        self.0.borrow_mut().once.push(Rule {
            prefix: prefix.as_bytes().to_vec(),
            reply: reply.as_bytes().to_vec(),
        });
    }

    /// Queue unsolicited modem output.
    pub fn push_rx(&self, data: &str) {
        self.0.borrow_mut().rx.extend(data.bytes());
    }

    /// Every write so far, as text.
    pub fn writes(&self) -> Vec<String> {
        self.0
            .borrow()
            .writes
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    /// Number of writes starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.writes().iter().filter(|w| w.starts_with(prefix)).count()
    }

    pub fn clear_writes(&self) {
        self.0.borrow_mut().writes.clear();
    }
}

impl ByteChannel for ScriptedModem {
    type Error = ();

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
        let mut inner = self.0.borrow_mut();
        let mut n = 0;
        while n < buf.len() {
            match inner.rx.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, ()> {
        let mut inner = self.0.borrow_mut();
        inner.writes.push(data.to_vec());
        inner.answer(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), ()> {
        Ok(())
    }

    fn available(&self) -> bool {
        !self.0.borrow().rx.is_empty()
    }
}

// ── RecordingSink ─────────────────────────────────────────────

/// Diagnostic sink that keeps every mirrored line.
#[derive(Clone, Default)]
pub struct RecordingSink(Rc<RefCell<Vec<(Direction, String)>>>);

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Direction, String)> {
        self.0.borrow().clone()
    }
}

impl DiagnosticSink for RecordingSink {
    fn record(&mut self, direction: Direction, raw: &[u8]) {
        self.0
            .borrow_mut()
            .push((direction, String::from_utf8_lossy(raw).into_owned()));
    }
}

// ── Config ────────────────────────────────────────────────────

/// Short timeouts so failure paths finish quickly on the simulated clock.
pub fn test_config() -> LinkConfig {
    let mut cfg = LinkConfig::with_credentials("testnet", "password1").unwrap();
    cfg.command_timeout_ms = 100;
    cfg.reset_timeout_ms = 100;
    cfg.associate_timeout_ms = 200;
    cfg.config_request_timeout_ms = 150;
    cfg.boot_delay_ms = 0;
    cfg.reset_settle_ms = 10;
    cfg.reconnect_settle_ms = 10;
    cfg.retry_backoff_ms = 5;
    cfg
}
