//! Configuration loading
//!
//! `badge.toml` is embedded at build time (and validated by build.rs).
//! Anything the on-device parser or validation rejects falls back to the
//! compiled defaults.

use defmt::*;

use badgelink_core::config::parse_config;
use badgelink_core::BadgeConfig;

/// Embedded configuration; edit badge.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../badge.toml");

pub fn load() -> BadgeConfig {
    let config = match parse_config(EMBEDDED_CONFIG) {
        Ok(config) => config,
        Err(e) => {
            error!("badge.toml parse error: {:?}, using defaults", e);
            return BadgeConfig::default();
        }
    };

    match config.validate() {
        Ok(()) => {
            info!("Loaded configuration from badge.toml");
            config
        }
        Err(e) => {
            error!("badge.toml invalid: {:?}, using defaults", e);
            BadgeConfig::default()
        }
    }
}
