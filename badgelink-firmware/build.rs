//! Build script for badgelink-firmware
//!
//! - Adds the esp-hal and defmt linker scripts
//! - Validates badge.toml at compile time

use std::fs;
use std::path::Path;

/// Largest frame payload the static session buffers hold
const MAX_FRAME_BYTES: i64 = 1024;

/// Largest encoded application message
const MIN_FRAME_BYTES: i64 = 96;

const BRIDGE_KEYS: &[&str] = &[
    "port",
    "path",
    "max_frame_bytes",
    "idle_timeout_ms",
    "tick_period_ms",
    "handshake_timeout_ms",
    "close_timeout_ms",
    "heartbeat_interval_ms",
    "sensor_interval_ms",
    "sync_on_connect",
];

const WIFI_KEYS: &[&str] = &["ssid", "password"];

fn main() {
    setup_linker();
    validate_config();
}

fn setup_linker() {
    println!("cargo:rustc-link-arg=-Tlinkall.x");
    println!("cargo:rustc-link-arg=-Tdefmt.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate badge.toml configuration at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=badge.toml");

    let config_path = Path::new("badge.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: badge.toml not found!                                    ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds badge.toml as its configuration.            ║\n\
            ║  Please create one in the badgelink-firmware directory.          ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read badge.toml                                ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in badge.toml                        ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                {}\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let mut errors = Vec::new();
    check_sections(&config, &mut errors);
    validate_bridge(&config, &mut errors);
    validate_wifi(&config, &mut errors);

    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid badge configuration                              ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }
}

/// Only `[bridge]` and `[wifi]` are understood by the on-device parser
fn check_sections(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(table) = config.as_table() else {
        return;
    };
    for (name, value) in table {
        match (name.as_str(), value) {
            ("bridge" | "wifi", toml::Value::Table(_)) => {}
            ("bridge" | "wifi", _) => errors.push(format!("[{}] must be a table", name)),
            _ => errors.push(format!("unknown section or key '{}'", name)),
        }
    }
}

fn check_keys(table: &toml::Table, section: &str, known: &[&str], errors: &mut Vec<String>) {
    for key in table.keys() {
        if !known.contains(&key.as_str()) {
            errors.push(format!("[{}] unknown key '{}'", section, key));
        }
    }
}

fn validate_bridge(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(bridge) = config.get("bridge").and_then(|b| b.as_table()) else {
        return;
    };
    check_keys(bridge, "bridge", BRIDGE_KEYS, errors);

    if let Some(port) = bridge.get("port") {
        match port.as_integer() {
            Some(p) if (1..=65535).contains(&p) => {}
            _ => errors.push("[bridge] port must be 1-65535".to_string()),
        }
    }

    if let Some(path) = bridge.get("path") {
        match path.as_str() {
            Some(p) if p.starts_with('/') && p.len() <= 32 => {}
            _ => errors.push("[bridge] path must start with '/' (max 32 chars)".to_string()),
        }
    }

    if let Some(max) = bridge.get("max_frame_bytes") {
        match max.as_integer() {
            Some(m) if (MIN_FRAME_BYTES..=MAX_FRAME_BYTES).contains(&m) => {}
            _ => errors.push(format!(
                "[bridge] max_frame_bytes must be {}-{}",
                MIN_FRAME_BYTES, MAX_FRAME_BYTES
            )),
        }
    }

    for key in [
        "idle_timeout_ms",
        "tick_period_ms",
        "handshake_timeout_ms",
        "close_timeout_ms",
        "heartbeat_interval_ms",
        "sensor_interval_ms",
    ] {
        if let Some(value) = bridge.get(key) {
            match value.as_integer() {
                Some(v) if v > 0 && v <= u32::MAX as i64 => {}
                _ => errors.push(format!("[bridge] {} must be a positive integer", key)),
            }
        }
    }

    if let Some(sync) = bridge.get("sync_on_connect") {
        if sync.as_bool().is_none() {
            errors.push("[bridge] sync_on_connect must be true or false".to_string());
        }
    }
}

fn validate_wifi(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(wifi) = config.get("wifi").and_then(|w| w.as_table()) else {
        return;
    };
    check_keys(wifi, "wifi", WIFI_KEYS, errors);

    if let Some(ssid) = wifi.get("ssid") {
        match ssid.as_str() {
            Some(s) if !s.is_empty() && s.len() <= 32 => {}
            _ => errors.push("[wifi] ssid must be 1-32 chars".to_string()),
        }
    }

    if let Some(password) = wifi.get("password") {
        match password.as_str() {
            Some(p) if p.len() <= 64 => {}
            _ => errors.push("[wifi] password must be at most 64 chars".to_string()),
        }
    }
}
