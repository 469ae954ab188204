//! Actuator link library.
//!
//! Drives an AT-command WiFi co-processor over a serial byte channel so an
//! actuator node can report setpoints to a host and pick up its replies.
//! All ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`;
//! everything else runs on the host against mock channels and clocks.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod driver;
pub mod error;
pub mod link;

pub use driver::{ModemDriver, StepOutcome};
pub use error::{Error, Result};
