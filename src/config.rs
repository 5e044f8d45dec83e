//! Runtime configuration.
//!
//! Defaults cover a local deployment; every value can be overridden through
//! `ETA_MONITOR_*` environment variables.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;

use crate::engine::EngineConfig;
use crate::error::ConfigError;
use crate::osrm::OsrmConfig;
use crate::schedule::DEFAULT_TIME_ZONE;
use crate::tracking::TrackingConfig;

const ENV_PREFIX: &str = "ETA_MONITOR_";

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub engine: EngineConfig,
    /// Size of the worker pool reconciling entities within one tick.
    pub workers: usize,
    /// Timeout applied to every call to an external collaborator.
    pub call_timeout_secs: u64,
    /// Fixes older than this are treated as missing.
    pub fix_max_age: Duration,
    /// Zone whose midnight starts the monitoring day.
    pub time_zone: Tz,
    /// OSRM endpoint. Without it travel times are straight-line estimates.
    pub osrm_url: Option<String>,
    pub osrm_profile: String,
    pub tracking_url: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            workers: 4,
            call_timeout_secs: 10,
            fix_max_age: Duration::from_secs(12 * 3600),
            time_zone: DEFAULT_TIME_ZONE,
            osrm_url: None,
            osrm_profile: "car".to_string(),
            tracking_url: None,
        }
    }
}

impl MonitorConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let engine = &mut config.engine;

        if let Some(value) = parse_var(&lookup, "MOVEMENT_THRESHOLD_M")? {
            engine.movement_threshold_m = value;
        }
        if let Some(value) = parse_var(&lookup, "PROXIMITY_THRESHOLD_M")? {
            engine.proximity_threshold_m = value;
        }
        if let Some(value) = parse_var(&lookup, "ONE_SHOT_PROXIMITY_M")? {
            engine.one_shot_proximity_m = value;
        }
        if let Some(value) = parse_var(&lookup, "DELAY_THRESHOLD_MIN")? {
            engine.delay_threshold_min = value;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "TICK_SECS")? {
            engine.tick_period = Duration::from_secs(secs);
        }
        if let Some(value) = parse_var(&lookup, "WORKERS")? {
            config.workers = value;
        }
        if let Some(value) = parse_var(&lookup, "CALL_TIMEOUT_SECS")? {
            config.call_timeout_secs = value;
        }
        if let Some(hours) = parse_var::<u64, _>(&lookup, "FIX_MAX_AGE_HOURS")? {
            let secs = hours.checked_mul(3600).ok_or_else(|| ConfigError::Invalid {
                key: "FIX_MAX_AGE_HOURS",
                message: format!("{} hours is out of range", hours),
            })?;
            config.fix_max_age = Duration::from_secs(secs);
        }
        if let Some(zone) = parse_var(&lookup, "TIME_ZONE")? {
            config.time_zone = zone;
        }
        if let Some(url) = lookup(&format!("{ENV_PREFIX}OSRM_URL")) {
            config.osrm_url = Some(url);
        }
        if let Some(profile) = lookup(&format!("{ENV_PREFIX}OSRM_PROFILE")) {
            config.osrm_profile = profile;
        }
        if let Some(url) = lookup(&format!("{ENV_PREFIX}TRACKING_URL")) {
            config.tracking_url = Some(url);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;
        for (key, value) in [
            ("MOVEMENT_THRESHOLD_M", engine.movement_threshold_m),
            ("PROXIMITY_THRESHOLD_M", engine.proximity_threshold_m),
            ("ONE_SHOT_PROXIMITY_M", engine.one_shot_proximity_m),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid {
                    key,
                    message: format!("expected a positive distance, got {}", value),
                });
            }
        }
        if engine.tick_period.is_zero() {
            return Err(ConfigError::Invalid {
                key: "TICK_SECS",
                message: "tick period must be positive".to_string(),
            });
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid {
                key: "WORKERS",
                message: "at least one worker is required".to_string(),
            });
        }
        if self.call_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "CALL_TIMEOUT_SECS",
                message: "call timeout must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn osrm(&self) -> Option<OsrmConfig> {
        self.osrm_url.as_ref().map(|base_url| OsrmConfig {
            base_url: base_url.clone(),
            profile: self.osrm_profile.clone(),
            timeout_secs: self.call_timeout_secs,
        })
    }

    pub fn tracking(&self) -> Option<TrackingConfig> {
        self.tracking_url.as_ref().map(|base_url| TrackingConfig {
            base_url: base_url.clone(),
            timeout_secs: self.call_timeout_secs,
            max_fix_age: self.fix_max_age,
            time_zone: self.time_zone,
        })
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(&format!("{ENV_PREFIX}{name}")) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|err| ConfigError::Invalid {
            key: name,
            message: format!("{:?}: {}", raw, err),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (format!("{ENV_PREFIX}{k}"), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.engine.movement_threshold_m, 100.0);
        assert_eq!(config.engine.proximity_threshold_m, 100.0);
        assert_eq!(config.engine.delay_threshold_min, 5);
        assert_eq!(config.engine.tick_period, Duration::from_secs(15));
        assert_eq!(config.fix_max_age, Duration::from_secs(12 * 3600));
        assert_eq!(config.time_zone, chrono_tz::Europe::Berlin);
        assert!(config.osrm().is_none());
        assert!(config.tracking().is_none());
    }

    #[test]
    fn test_overrides() {
        let config = MonitorConfig::from_lookup(lookup_from(&[
            ("PROXIMITY_THRESHOLD_M", "500"),
            ("DELAY_THRESHOLD_MIN", "10"),
            ("TICK_SECS", "2"),
            ("TIME_ZONE", "UTC"),
            ("OSRM_URL", "http://osrm:5000"),
            ("CALL_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.engine.proximity_threshold_m, 500.0);
        assert_eq!(config.engine.delay_threshold_min, 10);
        assert_eq!(config.engine.tick_period, Duration::from_secs(2));
        assert_eq!(config.time_zone, chrono_tz::UTC);
        let osrm = config.osrm().unwrap();
        assert_eq!(osrm.base_url, "http://osrm:5000");
        assert_eq!(osrm.timeout_secs, 3);
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = MonitorConfig::from_lookup(lookup_from(&[("DELAY_THRESHOLD_MIN", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "DELAY_THRESHOLD_MIN",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_zone_is_rejected() {
        let err = MonitorConfig::from_lookup(lookup_from(&[("TIME_ZONE", "Mars/Olympus")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TIME_ZONE", .. }));
    }

    #[test]
    fn test_oversized_fix_age_is_rejected() {
        let err = MonitorConfig::from_lookup(lookup_from(&[(
            "FIX_MAX_AGE_HOURS",
            "18446744073709551615",
        )]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "FIX_MAX_AGE_HOURS",
                ..
            }
        ));

        let config =
            MonitorConfig::from_lookup(lookup_from(&[("FIX_MAX_AGE_HOURS", "48")])).unwrap();
        assert_eq!(config.fix_max_age, Duration::from_secs(48 * 3600));
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let err = MonitorConfig::from_lookup(lookup_from(&[("WORKERS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "WORKERS", .. }));
    }
}
