//! Platform boundary: the port traits the link core is generic over.
//!
//! All interaction with timers and debug output happens through the
//! traits in [`ports`], keeping the protocol layer fully testable
//! without real peripherals.

pub mod ports;
