//! Actuator link firmware entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 Adapters (outer ring)                    │
//! │                                                          │
//! │  UartChannel        SystemClock        LogDiagnostics    │
//! │  (ByteChannel)      (Clock)            (DiagnosticSink)  │
//! │                                                          │
//! │  ─────────────── Port Trait Boundary ───────────────     │
//! │                                                          │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │  ModemDriver                                       │  │
//! │  │  Connection · CommandEngine · Reader · Framer      │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::uart::{UartDriver, config::Config as UartConfig};
use esp_idf_hal::units::Hertz;
use log::{info, warn};

use actuator_link::adapters::log_sink::LogDiagnostics;
use actuator_link::adapters::time::SystemClock;
use actuator_link::adapters::uart::UartChannel;
use actuator_link::config::LinkConfig;
use actuator_link::{ModemDriver, StepOutcome};

const MODEM_BAUD: u32 = 115_200;

/// Control-loop period.
const LOOP_PERIOD_MS: u32 = 10;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Actuator link v{}                ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Config ─────────────────────────────────────────────
    let config = LinkConfig::from_json(include_str!("../link.json"))?;
    info!("Config: host {}:{} at {} Hz", config.host, config.port, config.send_frequency_hz);

    // ── 3. Modem UART ─────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let uart = UartDriver::new(
        peripherals.uart1,
        peripherals.pins.gpio17,
        peripherals.pins.gpio18,
        Option::<esp_idf_hal::gpio::AnyIOPin>::None,
        Option::<esp_idf_hal::gpio::AnyIOPin>::None,
        &UartConfig::new().baudrate(Hertz(MODEM_BAUD)),
    )?;

    let mut driver = ModemDriver::with_diagnostics(
        UartChannel::new(uart),
        SystemClock::new(),
        LogDiagnostics::new(),
        config,
    )?;

    // ── 4. Bring-up ───────────────────────────────────────────
    if let Err(e) = driver.configure() {
        warn!("Initial configure failed ({}); watchdog will retry", e);
    }
    match driver.request_config(driver.node_id()) {
        StepOutcome::Replied => info!("Host config: {}", driver.last_message()),
        other => warn!("Config request: {:?}", other),
    }

    // ── 5. Control loop ───────────────────────────────────────
    let mut clock = SystemClock::new();
    let mut setpoint = 0.0_f32;
    loop {
        match driver.step(driver.node_id(), setpoint) {
            StepOutcome::Replied => {
                if let Ok(v) = driver.last_message().parse::<f32>() {
                    setpoint = v;
                }
            }
            StepOutcome::Failed(e) => warn!("step failed: {}", e),
            StepOutcome::Skipped | StepOutcome::NoReply => {}
        }
        embedded_hal::delay::DelayNs::delay_ms(&mut clock, LOOP_PERIOD_MS);
    }
}
