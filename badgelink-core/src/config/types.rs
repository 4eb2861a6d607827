//! Configuration type definitions
//!
//! Defaults match the stock badge: websocket on port 80 at `/ws`, open
//! conference network.

use heapless::String;

use badgelink_protocol::{MAX_MESSAGE_SIZE, MAX_PAYLOAD_SIZE};

/// Maximum websocket path length
pub const MAX_PATH_LEN: usize = 32;

/// Maximum SSID length (802.11)
pub const MAX_SSID_LEN: usize = 32;

/// Maximum WPA passphrase length
pub const MAX_PASSWORD_LEN: usize = 64;

/// Validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Port 0
    InvalidPort,
    /// Path empty or not starting with `/`
    InvalidPath,
    /// `max_frame_bytes` below one message or above the static buffers
    FrameSizeOutOfRange,
    /// A timeout or period of zero
    ZeroInterval(&'static str),
    /// Empty SSID
    EmptySsid,
}

/// Session and event loop settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BridgeConfig {
    /// TCP listen port
    pub port: u16,
    /// Request target accepted for the upgrade
    pub path: String<MAX_PATH_LEN>,
    /// Largest frame payload accepted from the client
    pub max_frame_bytes: usize,
    /// Session closes (1001) after this long without inbound bytes
    pub idle_timeout_ms: u32,
    /// Hardware event loop period
    pub tick_period_ms: u32,
    /// Upgrade request must complete within this window
    pub handshake_timeout_ms: u32,
    /// Wait this long for the peer's close echo
    pub close_timeout_ms: u32,
    /// Heartbeat and status report period
    pub heartbeat_interval_ms: u32,
    /// Sensor reading period
    pub sensor_interval_ms: u32,
    /// Push the LED table to every new client
    pub sync_on_connect: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let mut path = String::new();
        let _ = path.push_str("/ws");
        Self {
            port: 80,
            path,
            max_frame_bytes: MAX_PAYLOAD_SIZE,
            idle_timeout_ms: 30_000,
            tick_period_ms: 20,
            handshake_timeout_ms: 5_000,
            close_timeout_ms: 1_000,
            heartbeat_interval_ms: 1_000,
            sensor_interval_ms: 500,
            sync_on_connect: true,
        }
    }
}

impl BridgeConfig {
    /// Check every field against the compile-time bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if !self.path.starts_with('/') {
            return Err(ConfigError::InvalidPath);
        }
        if self.max_frame_bytes < MAX_MESSAGE_SIZE || self.max_frame_bytes > MAX_PAYLOAD_SIZE {
            return Err(ConfigError::FrameSizeOutOfRange);
        }

        let intervals = [
            ("idle_timeout_ms", self.idle_timeout_ms),
            ("tick_period_ms", self.tick_period_ms),
            ("handshake_timeout_ms", self.handshake_timeout_ms),
            ("close_timeout_ms", self.close_timeout_ms),
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("sensor_interval_ms", self.sensor_interval_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(ConfigError::ZeroInterval(name));
            }
        }

        Ok(())
    }
}

/// Station credentials
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WifiConfig {
    pub ssid: String<MAX_SSID_LEN>,
    /// Empty for an open network
    pub password: String<MAX_PASSWORD_LEN>,
}

impl Default for WifiConfig {
    fn default() -> Self {
        let mut ssid = String::new();
        let _ = ssid.push_str("bornhack");
        Self {
            ssid,
            password: String::new(),
        }
    }
}

impl WifiConfig {
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssid.is_empty() {
            return Err(ConfigError::EmptySsid);
        }
        Ok(())
    }
}

/// Complete badge configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BadgeConfig {
    pub bridge: BridgeConfig,
    pub wifi: WifiConfig,
}

impl BadgeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bridge.validate()?;
        self.wifi.validate()
    }
}
