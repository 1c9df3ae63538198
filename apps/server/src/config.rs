use std::{net::SocketAddr, time::Duration};

use tidemark_core::constants::{
    DEFAULT_CAPTURE_CONCURRENCY, DEFAULT_COMPACTION_CONCURRENCY, DEFAULT_VALUATION_TIMEOUT_MS,
};
use tidemark_core::errors::{Error, Result};
use tidemark_core::retention::RetentionSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub db_path: String,
    pub retention: RetentionSettings,
    pub capture_interval: Duration,
    pub compaction_interval: Duration,
    pub valuation_timeout: Duration,
    pub capture_concurrency: usize,
    pub compaction_concurrency: usize,
    /// Base URL of the service answering valuation and active-account calls.
    pub valuation_url: String,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = RetentionSettings::default();
        let listen_addr = parse_or(
            &lookup,
            "TM_LISTEN_ADDR",
            SocketAddr::from(([0, 0, 0, 0], 8080)),
        )?;
        let db_path = lookup("TM_DB_PATH").unwrap_or_else(|| "./db/tidemark.db".into());

        let retention = RetentionSettings {
            fine_days: parse_or(&lookup, "TM_FINE_DAYS", defaults.fine_days)?,
            mid_days: parse_or(&lookup, "TM_MID_DAYS", defaults.mid_days)?,
            coarse_days: parse_or(&lookup, "TM_COARSE_DAYS", defaults.coarse_days)?,
            mid_bucket_minutes: parse_or(
                &lookup,
                "TM_MID_BUCKET_MINUTES",
                defaults.mid_bucket_minutes,
            )?,
            coarse_bucket_minutes: parse_or(
                &lookup,
                "TM_COARSE_BUCKET_MINUTES",
                defaults.coarse_bucket_minutes,
            )?,
            archive_bucket_minutes: parse_or(
                &lookup,
                "TM_ARCHIVE_BUCKET_MINUTES",
                defaults.archive_bucket_minutes,
            )?,
        };

        let capture_secs: u64 = positive(&lookup, "TM_CAPTURE_INTERVAL_SECS", 60)?;
        let compaction_secs: u64 = positive(&lookup, "TM_COMPACTION_INTERVAL_SECS", 86_400)?;
        let timeout_ms: u64 = positive(
            &lookup,
            "TM_VALUATION_TIMEOUT_MS",
            DEFAULT_VALUATION_TIMEOUT_MS,
        )?;
        let capture_concurrency: usize =
            positive(&lookup, "TM_CAPTURE_CONCURRENCY", DEFAULT_CAPTURE_CONCURRENCY)?;
        let compaction_concurrency: usize = positive(
            &lookup,
            "TM_COMPACTION_CONCURRENCY",
            DEFAULT_COMPACTION_CONCURRENCY,
        )?;

        let valuation_url = lookup("TM_VALUATION_URL")
            .unwrap_or_else(|| "http://127.0.0.1:9000".into())
            .trim_end_matches('/')
            .to_string();

        let log_format = match lookup("TM_LOG_FORMAT") {
            None => LogFormat::Text,
            Some(raw) if raw.eq_ignore_ascii_case("text") => LogFormat::Text,
            Some(raw) if raw.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(raw) => return Err(invalid("TM_LOG_FORMAT", &raw)),
        };

        Ok(Self {
            listen_addr,
            db_path,
            retention,
            capture_interval: Duration::from_secs(capture_secs),
            compaction_interval: Duration::from_secs(compaction_secs),
            valuation_timeout: Duration::from_millis(timeout_ms),
            capture_concurrency,
            compaction_concurrency,
            valuation_url,
            log_format,
        })
    }
}

fn invalid(key: &str, raw: &str) -> Error {
    Error::InvalidConfigValue(format!("{}={}", key, raw))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| invalid(key, &raw)),
        None => Ok(default),
    }
}

fn positive<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + PartialOrd + Default + std::fmt::Display,
{
    let value = parse_or(lookup, key, default)?;
    if value <= T::default() {
        return Err(invalid(key, &value.to_string()));
    }
    Ok(value)
}
