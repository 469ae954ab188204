//! Link configuration parameters
//!
//! Everything the driver needs to reach the remote host: network
//! credentials, endpoint, per-command timeouts and send cadence.
//! Supplied once at construction; there is no runtime reconfiguration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Core link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    // --- Network ---
    /// Access point SSID
    pub ssid: heapless::String<32>,
    /// WPA2 passphrase (empty for an open network)
    pub password: heapless::String<64>,
    /// Remote host the actuator socket connects to
    pub host: heapless::String<64>,
    /// Remote TCP port
    pub port: u16,

    // --- Timeouts (milliseconds) ---
    /// Default per-command timeout
    pub command_timeout_ms: u32,
    /// Modem reset acknowledgement timeout
    pub reset_timeout_ms: u32,
    /// Access point join timeout
    pub associate_timeout_ms: u32,
    /// Reply timeout for a configuration request
    pub config_request_timeout_ms: u32,

    // --- Cadence ---
    /// Setpoint send rate (Hz)
    pub send_frequency_hz: u32,
    /// No application data for this long triggers a reconnect
    pub stale_after_ms: u32,
    /// Pause before the configuration sequence starts
    pub boot_delay_ms: u32,
    /// Pause after a reset is acknowledged
    pub reset_settle_ms: u32,
    /// Pause after a watchdog-driven reconnect
    pub reconnect_settle_ms: u32,

    // --- Retry policy ---
    /// Attempts per handshake step before giving up
    pub max_attempts: u8,
    /// Fixed delay between attempts
    pub retry_backoff_ms: u32,

    // --- Node identity ---
    pub node_id_min: u8,
    pub node_id_max: u8,
}

impl Default for LinkConfig {
    fn default() -> Self {
        let mut host = heapless::String::new();
        let _ = host.push_str("192.168.4.1");
        Self {
            // Network
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            host,
            port: 1738,

            // Timeouts
            command_timeout_ms: 1500,
            reset_timeout_ms: 5000,
            associate_timeout_ms: 20_000,
            config_request_timeout_ms: 5000,

            // Cadence
            send_frequency_hz: 20,
            stale_after_ms: 3000,
            boot_delay_ms: 1000,
            reset_settle_ms: 3000,
            reconnect_settle_ms: 2000,

            // Retry
            max_attempts: 3,
            retry_backoff_ms: 500,

            // Node identity
            node_id_min: 0,
            node_id_max: 4,
        }
    }
}

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

impl LinkConfig {
    /// Build a default configuration for the given access point.
    pub fn with_credentials(ssid: &str, password: &str) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.ssid.push_str(ssid).map_err(|_| ConfigError::InvalidSsid)?;
        cfg.password
            .push_str(password)
            .map_err(|_| ConfigError::InvalidPassword)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(text).map_err(|_| ConfigError::Malformed)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the driver cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssid.is_empty() || !is_printable_ascii(&self.ssid) {
            return Err(ConfigError::InvalidSsid);
        }
        if !self.password.is_empty() && self.password.len() < 8 {
            return Err(ConfigError::InvalidPassword);
        }
        if self.host.is_empty() {
            return Err(ConfigError::InvalidHost);
        }
        if self.send_frequency_hz == 0 {
            return Err(ConfigError::InvalidFrequency);
        }
        if self.command_timeout_ms == 0
            || self.reset_timeout_ms == 0
            || self.associate_timeout_ms == 0
            || self.config_request_timeout_ms == 0
            || self.stale_after_ms == 0
            || self.max_attempts == 0
        {
            return Err(ConfigError::InvalidTimeout);
        }
        if self.node_id_min > self.node_id_max {
            return Err(ConfigError::InvalidNodeRange);
        }
        Ok(())
    }

    /// Minimum spacing between two setpoint sends.
    pub fn send_interval_ms(&self) -> u64 {
        1000 / u64::from(self.send_frequency_hz.max(1))
    }
}
