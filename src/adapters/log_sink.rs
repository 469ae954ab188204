//! Log-based diagnostic sink adapter.
//!
//! Implements [`DiagnosticSink`] by writing every raw modem request and
//! response to the `log` facade (which goes to UART / USB-CDC in
//! production).  A secondary-UART sink would implement the same trait.

use log::info;

use crate::app::ports::{DiagnosticSink, Direction};

/// Adapter that logs all modem traffic at `info` level.
#[derive(Debug, Default)]
pub struct LogDiagnostics {
    lines: u32,
}

impl LogDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of lines recorded so far.
    pub fn lines(&self) -> u32 {
        self.lines
    }
}

impl DiagnosticSink for LogDiagnostics {
    fn record(&mut self, direction: Direction, raw: &[u8]) {
        self.lines = self.lines.wrapping_add(1);
        let text = core::str::from_utf8(raw).map_or("<non-utf8>", str::trim_end);
        match direction {
            Direction::Request => info!("REQ -> {}", text),
            Direction::Response => info!("RES <- {}", text),
        }
    }
}
