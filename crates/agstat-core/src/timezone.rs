//! Reporting timezone
//!
//! Daily and monthly keys, date filters and the table timestamps all follow
//! one timezone. Precedence: `--utc`, then `--timezone`, then `TZ`, then
//! the system zone reported by `iana-time-zone`, then UTC.

use chrono_tz::Tz;
use std::str::FromStr;
use tracing::debug;

use crate::error::{AgstatError, Result};

#[derive(Debug, Clone)]
pub struct TimezoneConfig {
    pub tz: Tz,
    pub is_utc: bool,
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        Self::from_tz(get_local_timezone())
    }
}

impl TimezoneConfig {
    pub fn utc() -> Self {
        Self::from_tz(Tz::UTC)
    }

    fn from_tz(tz: Tz) -> Self {
        Self {
            is_utc: tz == Tz::UTC,
            tz,
        }
    }

    /// Build from the `--timezone` / `--utc` flags
    pub fn from_cli(timezone: Option<&str>, use_utc: bool) -> Result<Self> {
        if use_utc {
            return Ok(Self::utc());
        }
        match timezone {
            Some(name) => Tz::from_str(name).map(Self::from_tz).map_err(|_| {
                AgstatError::InvalidTimezone(format!(
                    "'{name}'. Use an IANA name such as 'Europe/Berlin' or 'UTC'"
                ))
            }),
            None => Ok(Self::default()),
        }
    }

    pub fn display_name(&self) -> &str {
        if self.is_utc { "UTC" } else { self.tz.name() }
    }
}

/// Detect the local timezone, falling back to UTC
pub fn get_local_timezone() -> Tz {
    if let Some(tz) = std::env::var("TZ").ok().and_then(|s| Tz::from_str(&s).ok()) {
        debug!("Using timezone from TZ: {}", tz.name());
        return tz;
    }

    match iana_time_zone::get_timezone() {
        Ok(name) => Tz::from_str(&name).unwrap_or_else(|_| {
            debug!("Unrecognized system timezone '{}', using UTC", name);
            Tz::UTC
        }),
        Err(e) => {
            debug!("Could not detect system timezone: {:?}, using UTC", e);
            Tz::UTC
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ENV_MUTEX, EnvVarGuard};

    #[test]
    fn test_utc_flag_wins() {
        let config = TimezoneConfig::from_cli(Some("Asia/Tokyo"), true).unwrap();
        assert!(config.is_utc);
        assert_eq!(config.display_name(), "UTC");
    }

    #[test]
    fn test_explicit_timezone() {
        let config = TimezoneConfig::from_cli(Some("Europe/Berlin"), false).unwrap();
        assert!(!config.is_utc);
        assert_eq!(config.display_name(), "Europe/Berlin");
    }

    #[test]
    fn test_utc_by_name() {
        let config = TimezoneConfig::from_cli(Some("UTC"), false).unwrap();
        assert!(config.is_utc);
    }

    #[test]
    fn test_invalid_timezone() {
        let err = TimezoneConfig::from_cli(Some("Mars/Olympus"), false).unwrap_err();
        assert!(matches!(err, AgstatError::InvalidTimezone(_)));
    }

    #[tokio::test]
    async fn test_tz_env_var() {
        let _lock = ENV_MUTEX.lock().await;
        let mut guard = EnvVarGuard::new();
        guard.set("TZ", "America/Sao_Paulo");
        assert_eq!(get_local_timezone(), chrono_tz::America::Sao_Paulo);
    }
}
