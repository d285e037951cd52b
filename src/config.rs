use config::Config;
use thiserror::Error;

use crate::extract::Hms;

/// Tunable thresholds and locale policy, injected into the engine rather
/// than read from ambient globals. Every value has a production default;
/// `from_env` overrides from `RUNCHECK_*` environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum accepted distance; anything strictly below is insufficient.
    pub dist_min_km: f64,
    /// Maximum accepted duration; anything strictly above is "Time Over".
    pub time_over: Hms,
    /// Two-part numeric dates with both fields <= 12 read as day/month.
    pub prefer_day_first: bool,
    /// Offset from UTC used to resolve "today"-style dates.
    pub tz_offset_hours: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            dist_min_km: 2.0,
            time_over: Hms::new(2, 0, 0).unwrap(),
            prefer_day_first: true,
            tz_offset_hours: 7,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config source error: {0}")]
    Source(#[from] config::ConfigError),
    #[error("invalid time_over_hms {0:?}, expected HH:MM:SS")]
    BadTimeOver(String),
}

impl EngineConfig {
    /// Defaults overridden by `RUNCHECK_DIST_MIN_KM`, `RUNCHECK_TIME_OVER_HMS`,
    /// `RUNCHECK_PREFER_DAY_FIRST` and `RUNCHECK_TZ_OFFSET_HOURS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(config::Environment::with_prefix("RUNCHECK"))
            .build()?;

        let mut cfg = EngineConfig::default();
        if let Ok(v) = settings.get_float("dist_min_km") {
            cfg.dist_min_km = v;
        }
        if let Ok(v) = settings.get_string("time_over_hms") {
            cfg.time_over = Hms::parse(&v).ok_or(ConfigError::BadTimeOver(v))?;
        }
        if let Ok(v) = settings.get_bool("prefer_day_first") {
            cfg.prefer_day_first = v;
        }
        if let Ok(v) = settings.get_int("tz_offset_hours") {
            cfg.tz_offset_hours = v as i32;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.dist_min_km, 2.0);
        assert_eq!(cfg.time_over.to_string(), "02:00:00");
        assert!(cfg.prefer_day_first);
        assert_eq!(cfg.tz_offset_hours, 7);
    }
}
