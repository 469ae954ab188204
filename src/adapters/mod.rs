//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter    | Implements      | Connects to                 |
//! |------------|-----------------|-----------------------------|
//! | `log_sink` | DiagnosticSink  | `log` output                |
//! | `time`     | Clock           | esp_timer / std `Instant`   |
//! | `uart`     | ByteChannel     | ESP-IDF UART (espidf only)  |

pub mod log_sink;
pub mod time;
#[cfg(target_os = "espidf")]
pub mod uart;
