//! Environment-driven configuration.
//!
//! Loaded once at startup with figment from raw environment variables, so
//! `REFRESH_WAVE_SIZE` maps onto `refresh_wave_size` and so on. Durations
//! accept human strings like `200ms` or `5s`; a bare number means seconds.

use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use figment::{Figment, providers::Env};
use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};

use crate::cases::MAX_PAGE_SIZE;
use crate::reconcile::PipelineSettings;
use crate::sync::BackfillSettings;

/// Headroom over the slowest page refresh for queries and serialization.
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(15);
const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_shutdown_timeout", deserialize_with = "duration")]
    pub shutdown_timeout: Duration,

    #[serde(default = "default_user_agent")]
    pub upstream_user_agent: String,
    #[serde(default = "default_list_fetch_timeout", deserialize_with = "duration")]
    pub list_fetch_timeout: Duration,
    #[serde(default = "default_refresh_fetch_timeout", deserialize_with = "duration")]
    pub refresh_fetch_timeout: Duration,
    #[serde(default = "default_wave_size")]
    pub refresh_wave_size: usize,
    #[serde(default = "default_wave_pause", deserialize_with = "duration")]
    pub refresh_wave_pause: Duration,

    #[serde(default = "default_backfill_limit")]
    pub backfill_limit: i64,
    #[serde(default = "default_chunk_size")]
    pub backfill_chunk_size: usize,
    #[serde(default = "default_chunk_pause", deserialize_with = "duration")]
    pub backfill_chunk_pause: Duration,
    #[serde(default = "default_channel", deserialize_with = "text")]
    pub backfill_channel: String,
    #[serde(default = "default_window_months")]
    pub backfill_window_months: i32,
    #[serde(default = "default_backfill_at", deserialize_with = "time_of_day")]
    pub backfill_at: NaiveTime,
    #[serde(default = "default_timezone", deserialize_with = "timezone")]
    pub backfill_timezone: Tz,

    #[serde(default = "default_editor_roles", deserialize_with = "id_list")]
    pub editor_role_ids: Vec<i64>,
    #[serde(default)]
    pub status_url_template: Option<String>,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn load() -> anyhow::Result<Self> {
        let config: Config = Figment::new().merge(Env::raw()).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.refresh_wave_size > 0, "REFRESH_WAVE_SIZE must be positive");
        anyhow::ensure!(self.backfill_chunk_size > 0, "BACKFILL_CHUNK_SIZE must be positive");
        anyhow::ensure!(self.backfill_limit > 0, "BACKFILL_LIMIT must be positive");
        anyhow::ensure!(
            self.backfill_window_months > 0,
            "BACKFILL_WINDOW_MONTHS must be positive"
        );
        if let Some(template) = &self.status_url_template {
            anyhow::ensure!(
                template.contains("{order_id}"),
                "STATUS_URL_TEMPLATE must contain {{order_id}}"
            );
        }
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            wave_size: self.refresh_wave_size,
            wave_pause: self.refresh_wave_pause,
            fetch_timeout: self.list_fetch_timeout,
        }
    }

    /// Deadline for a single HTTP request. Covers a full page refreshed
    /// against an unresponsive upstream, so a list read is never cut short.
    pub fn request_timeout(&self) -> Duration {
        let waves = (MAX_PAGE_SIZE as usize).div_ceil(self.refresh_wave_size.max(1));
        let page_refresh = (self.list_fetch_timeout + self.refresh_wave_pause)
            .saturating_mul(u32::try_from(waves).unwrap_or(u32::MAX));
        page_refresh
            .max(self.refresh_fetch_timeout)
            .saturating_add(REQUEST_TIMEOUT_MARGIN)
            .max(MIN_REQUEST_TIMEOUT)
    }

    pub fn backfill_settings(&self) -> BackfillSettings {
        BackfillSettings {
            limit: self.backfill_limit,
            chunk_size: self.backfill_chunk_size,
            chunk_pause: self.backfill_chunk_pause,
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_user_agent() -> String {
    format!("refund-sync/{}", env!("CARGO_PKG_VERSION"))
}

fn default_list_fetch_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_refresh_fetch_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_wave_size() -> usize {
    10
}

fn default_wave_pause() -> Duration {
    Duration::from_millis(200)
}

fn default_backfill_limit() -> i64 {
    1000
}

fn default_chunk_size() -> usize {
    100
}

fn default_chunk_pause() -> Duration {
    Duration::from_millis(100)
}

fn default_channel() -> String {
    "1688".to_string()
}

fn default_window_months() -> i32 {
    3
}

fn default_backfill_at() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 30, 0).unwrap_or_default()
}

fn default_timezone() -> Tz {
    Tz::Asia__Shanghai
}

fn default_editor_roles() -> Vec<i64> {
    vec![1, 3, 4]
}

/// Parse a duration string such as `200ms`, `5s`, or `2m`.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let parser = DurationParser::with_time_units(&[
        TimeUnit::MilliSecond,
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
    ]);
    let parsed = parser
        .parse(input.trim())
        .map_err(|e| format!("invalid duration '{input}': {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("invalid duration '{input}': {e}"))
}

/// Environment values arrive as strings or, when they look numeric, as numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(u64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

/// Numeric-looking values such as `1688` still land in a `String` field.
fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Scalar::deserialize(deserializer)?.into_text())
}

fn duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let raw = Scalar::deserialize(deserializer)?.into_text();
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

fn time_of_day<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S"))
        .map_err(|_| serde::de::Error::custom(format!("invalid time of day '{raw}', expected HH:MM")))
}

fn timezone<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Tz, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.trim()
        .parse::<Tz>()
        .map_err(|_| serde::de::Error::custom(format!("unknown timezone '{raw}'")))
}

/// Accepts `"1,3,4"`, a single number, or a sequence.
fn id_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<i64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<i64>),
        One(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::List(ids) => Ok(ids),
        Raw::One(id) => Ok(vec![id]),
        Raw::Text(text) => text
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<i64>()
                    .map_err(|_| serde::de::Error::custom(format!("invalid role id '{s}'")))
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("200ms").unwrap(), Duration::from_millis(200));
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_defaults_match_documented_values() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("DATABASE_URL", "postgres://localhost/cases");
            let config = Config::load().map_err(|e| e.to_string())?;

            assert_eq!(config.port, 8080);
            assert_eq!(config.refresh_wave_size, 10);
            assert_eq!(config.refresh_wave_pause, Duration::from_millis(200));
            assert_eq!(config.list_fetch_timeout, Duration::from_secs(5));
            assert_eq!(config.refresh_fetch_timeout, Duration::from_secs(10));
            assert_eq!(config.backfill_chunk_size, 100);
            assert_eq!(config.backfill_limit, 1000);
            assert_eq!(config.backfill_at, NaiveTime::from_hms_opt(17, 30, 0).unwrap());
            assert_eq!(config.backfill_timezone, Tz::Asia__Shanghai);
            assert_eq!(config.editor_role_ids, vec![1, 3, 4]);
            assert!(config.status_url_template.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_overrides_from_environment() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("DATABASE_URL", "postgres://localhost/cases");
            jail.set_env("REFRESH_WAVE_SIZE", "4");
            jail.set_env("REFRESH_WAVE_PAUSE", "50ms");
            jail.set_env("BACKFILL_AT", "03:15");
            jail.set_env("BACKFILL_TIMEZONE", "Europe/Berlin");
            jail.set_env("EDITOR_ROLE_IDS", "2, 9");
            jail.set_env("BACKFILL_CHANNEL", "1688");
            let config = Config::load().map_err(|e| e.to_string())?;

            assert_eq!(config.refresh_wave_size, 4);
            assert_eq!(config.refresh_wave_pause, Duration::from_millis(50));
            assert_eq!(config.backfill_at, NaiveTime::from_hms_opt(3, 15, 0).unwrap());
            assert_eq!(config.backfill_timezone, Tz::Europe__Berlin);
            assert_eq!(config.editor_role_ids, vec![2, 9]);
            assert_eq!(config.backfill_channel, "1688");
            Ok(())
        });
    }

    #[test]
    fn test_request_timeout_outlasts_slowest_page_refresh() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("DATABASE_URL", "postgres://localhost/cases");
            let config = Config::load().map_err(|e| e.to_string())?;
            // 10 waves of 5s fetch + 200ms pause
            assert_eq!(
                config.request_timeout(),
                Duration::from_millis(52_000) + REQUEST_TIMEOUT_MARGIN
            );

            jail.set_env("REFRESH_WAVE_SIZE", "100");
            jail.set_env("LIST_FETCH_TIMEOUT", "1s");
            let config = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(config.request_timeout(), MIN_REQUEST_TIMEOUT);

            jail.set_env("LIST_FETCH_TIMEOUT", "5s");
            jail.set_env("REFRESH_WAVE_SIZE", "5");
            let config = Config::load().map_err(|e| e.to_string())?;
            // 20 waves of 5s fetch + 200ms pause
            let slowest_page = Duration::from_millis(104_000);
            assert!(config.request_timeout() > slowest_page);
            assert_eq!(config.request_timeout(), slowest_page + REQUEST_TIMEOUT_MARGIN);
            Ok(())
        });
    }

    #[test]
    fn test_zero_wave_size_is_rejected() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("DATABASE_URL", "postgres://localhost/cases");
            jail.set_env("REFRESH_WAVE_SIZE", "0");
            assert!(Config::load().is_err());
            Ok(())
        });
    }
}
