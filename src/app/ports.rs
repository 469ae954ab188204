//! Port traits: the boundary between link logic and the platform.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ModemDriver (link logic)
//! ```
//!
//! Platform adapters (system timer, UART, log output) implement these
//! traits.  The [`ModemDriver`](crate::driver::ModemDriver) consumes them
//! via generics, so the protocol core never touches hardware directly.
//! The byte channel port lives next to its users in
//! [`link::transport`](crate::link::transport).

use embedded_hal::delay::DelayNs;

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: platform timer → link logic)
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock plus blocking delay.
///
/// Every timeout, rate limit and staleness check in the driver reads this
/// clock; every settle pause goes through [`DelayNs`].
pub trait Clock: DelayNs {
    /// Milliseconds since an arbitrary fixed origin (monotonic).
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Diagnostic sink port (driven adapter: link logic → debug output)
// ───────────────────────────────────────────────────────────────

/// Which way a diagnostic line travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Bytes written to the modem.
    Request,
    /// A complete line read back from the modem.
    Response,
}

/// Observational mirror of every raw request and response.
///
/// Implementations must not influence control flow; the driver ignores
/// anything they do.
pub trait DiagnosticSink {
    fn record(&mut self, direction: Direction, raw: &[u8]);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDiagnostics;

impl DiagnosticSink for NullDiagnostics {
    fn record(&mut self, _direction: Direction, _raw: &[u8]) {}
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for &mut T {
    fn record(&mut self, direction: Direction, raw: &[u8]) {
        (**self).record(direction, raw);
    }
}
