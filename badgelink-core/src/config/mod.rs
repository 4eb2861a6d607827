//! Badge configuration
//!
//! The firmware embeds `badge.toml` and parses it at boot; invalid input
//! falls back to [`BadgeConfig::default`].

pub mod parse;
pub mod types;

pub use parse::{parse_config, ParseError};
pub use types::{BadgeConfig, BridgeConfig, ConfigError, WifiConfig};
