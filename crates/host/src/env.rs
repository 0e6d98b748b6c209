//! Typed environment readers shared by every crate's `Default` configs.

use std::time::Duration;

pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "enabled" | "on"
    )
}

/// Trimmed value, `None` when unset or blank.
pub fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|raw| raw.parse::<T>().ok())
}

pub fn env_bool(name: &str, default: bool) -> bool {
    env_string(name).map_or(default, |raw| parse_bool(&raw))
}

pub fn env_u64(name: &str, default: u64) -> u64 {
    env_parsed(name).unwrap_or(default)
}

pub fn env_u32(name: &str, default: u32) -> u32 {
    env_parsed(name).unwrap_or(default)
}

pub fn env_usize(name: &str, default: usize) -> usize {
    env_parsed(name).unwrap_or(default)
}

/// Non-finite values fall back to `default`.
pub fn env_f64(name: &str, default: f64) -> f64 {
    env_parsed::<f64>(name)
        .filter(|value| value.is_finite())
        .unwrap_or(default)
}

pub fn env_duration_micros(name: &str, default: Duration) -> Duration {
    env_parsed(name).map_or(default, Duration::from_micros)
}

pub fn env_duration_millis(name: &str, default: Duration) -> Duration {
    env_parsed(name).map_or(default, Duration::from_millis)
}
