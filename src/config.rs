use crate::time_utils;
use std::str::FromStr;

pub const DEFAULT_CRISIS_COOLDOWN_HOURS: i64 = 24;
pub const DEFAULT_HISTORY_DAYS: i64 = 30;
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: usize = 120;
pub const MAX_CRISIS_COOLDOWN_HOURS: i64 = 8760;
pub const MAX_HISTORY_DAYS: i64 = 365;
pub const MAX_RATE_LIMIT_PER_MINUTE: usize = 100_000;

/// Knobs the engine reads on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub crisis_cooldown_hours: i64,
    pub history_days: i64,
    pub default_timezone: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            crisis_cooldown_hours: DEFAULT_CRISIS_COOLDOWN_HOURS,
            history_days: DEFAULT_HISTORY_DAYS,
            default_timezone: "UTC".to_string(),
        }
    }
}

/// Process-level settings for the HTTP service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub engine: EngineConfig,
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub rate_limit_per_minute: usize,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default_timezone = match lookup("DEFAULT_TIMEZONE") {
            Some(raw) => time_utils::normalize_timezone(&raw).unwrap_or_else(|| {
                tracing::warn!("DEFAULT_TIMEZONE '{}' is not a known timezone, using UTC", raw);
                "UTC".to_string()
            }),
            None => "UTC".to_string(),
        };

        let engine = EngineConfig {
            crisis_cooldown_hours: parse_or(
                &lookup,
                "CRISIS_COOLDOWN_HOURS",
                DEFAULT_CRISIS_COOLDOWN_HOURS,
                MAX_CRISIS_COOLDOWN_HOURS,
            ),
            history_days: parse_or(&lookup, "HISTORY_DAYS", DEFAULT_HISTORY_DAYS, MAX_HISTORY_DAYS),
            default_timezone,
        };

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| {
            let port = lookup("PORT").unwrap_or_else(|| "3000".to_string());
            format!("0.0.0.0:{}", port)
        });

        Self {
            engine,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            bind_addr,
            rate_limit_per_minute: parse_or(
                &lookup,
                "RATE_LIMIT_PER_MINUTE",
                DEFAULT_RATE_LIMIT_PER_MINUTE,
                MAX_RATE_LIMIT_PER_MINUTE,
            ),
        }
    }
}

/// Positive values up to `max`; larger ones are clamped to it.
fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T, max: T) -> T
where
    T: FromStr + PartialOrd + Default + Copy + std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > max => {
            tracing::warn!("{}={} is above the limit, using {}", key, value, max);
            max
        }
        Ok(value) if value > T::default() => value,
        _ => {
            tracing::warn!("Invalid {}='{}', falling back to {}", key, raw, default);
            default
        }
    }
}
