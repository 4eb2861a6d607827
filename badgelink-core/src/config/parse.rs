//! Minimal TOML parser for the badge configuration
//!
//! Handles only the subset `badge.toml` uses:
//! - `[bridge]` and `[wifi]` section headers
//! - `key = value` with quoted strings, integers and booleans
//! - Comments (`#`), whole-line or trailing
//!
//! Keys missing from the input keep their default values.

use core::str::FromStr;

use heapless::String;

use super::types::{BadgeConfig, BridgeConfig, WifiConfig};

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Section header other than `[bridge]` or `[wifi]`
    InvalidSection { line: usize },
    /// Key not known in its section
    UnknownKey { line: usize },
    /// Value has the wrong type or is out of range
    InvalidValue { line: usize },
    /// String does not fit its fixed-capacity field
    ValueTooLong { line: usize },
    /// Line is neither a header, a key/value pair nor a comment
    Syntax { line: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Bridge,
    Wifi,
}

/// Parse a `badge.toml` document on top of the defaults
pub fn parse_config(input: &str) -> Result<BadgeConfig, ParseError> {
    let mut config = BadgeConfig::default();
    let mut section = Section::Root;

    for (index, line) in input.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') {
            let header = strip_comment(line);
            if !header.ends_with(']') {
                return Err(ParseError::Syntax { line: line_no });
            }
            section = match header[1..header.len() - 1].trim() {
                "bridge" => Section::Bridge,
                "wifi" => Section::Wifi,
                _ => return Err(ParseError::InvalidSection { line: line_no }),
            };
            continue;
        }

        let (key, value) = parse_key_value(line).ok_or(ParseError::Syntax { line: line_no })?;
        match section {
            Section::Bridge => apply_bridge(&mut config.bridge, key, value, line_no)?,
            Section::Wifi => apply_wifi(&mut config.wifi, key, value, line_no)?,
            Section::Root => return Err(ParseError::UnknownKey { line: line_no }),
        }
    }

    Ok(config)
}

fn apply_bridge(
    bridge: &mut BridgeConfig,
    key: &str,
    value: &str,
    line: usize,
) -> Result<(), ParseError> {
    match key {
        "port" => bridge.port = parse_int(value, line)?,
        "path" => bridge.path = parse_string(value, line)?,
        "max_frame_bytes" => bridge.max_frame_bytes = parse_int(value, line)?,
        "idle_timeout_ms" => bridge.idle_timeout_ms = parse_int(value, line)?,
        "tick_period_ms" => bridge.tick_period_ms = parse_int(value, line)?,
        "handshake_timeout_ms" => bridge.handshake_timeout_ms = parse_int(value, line)?,
        "close_timeout_ms" => bridge.close_timeout_ms = parse_int(value, line)?,
        "heartbeat_interval_ms" => bridge.heartbeat_interval_ms = parse_int(value, line)?,
        "sensor_interval_ms" => bridge.sensor_interval_ms = parse_int(value, line)?,
        "sync_on_connect" => bridge.sync_on_connect = parse_bool(value, line)?,
        _ => return Err(ParseError::UnknownKey { line }),
    }
    Ok(())
}

fn apply_wifi(wifi: &mut WifiConfig, key: &str, value: &str, line: usize) -> Result<(), ParseError> {
    match key {
        "ssid" => wifi.ssid = parse_string(value, line)?,
        "password" => wifi.password = parse_string(value, line)?,
        _ => return Err(ParseError::UnknownKey { line }),
    }
    Ok(())
}

/// Drop a trailing comment that is not inside a string
fn strip_comment(text: &str) -> &str {
    let mut in_string = false;
    for (pos, ch) in text.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return text[..pos].trim(),
            _ => {}
        }
    }
    text.trim()
}

/// Split `key = value`
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let value = strip_comment(value);

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Parse a double-quoted string into a fixed-capacity field
fn parse_string<const N: usize>(value: &str, line: usize) -> Result<String<N>, ParseError> {
    let inner = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .ok_or(ParseError::InvalidValue { line })?;

    let mut out = String::new();
    out.push_str(inner)
        .map_err(|_| ParseError::ValueTooLong { line })?;
    Ok(out)
}

/// Parse an integer value, allowing `_` digit separators
fn parse_int<T: FromStr>(value: &str, line: usize) -> Result<T, ParseError> {
    let mut digits = String::<24>::new();
    for ch in value.chars().filter(|&c| c != '_') {
        digits
            .push(ch)
            .map_err(|_| ParseError::InvalidValue { line })?;
    }
    digits.parse().map_err(|_| ParseError::InvalidValue { line })
}

/// Parse a boolean value
fn parse_bool(value: &str, line: usize) -> Result<bool, ParseError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ParseError::InvalidValue { line }),
    }
}
