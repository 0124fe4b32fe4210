use anyhow::{Context, Result, anyhow};
use chrono::{NaiveTime, Weekday};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub api_prefix: String,
    pub run_migrations: bool,

    // Rate limiting
    pub rate_protected_per_min: u32,
    pub rate_device_per_min: u32,

    // Logging
    pub log_dir: String,
    pub log_level: tracing::Level,

    // Attendance policy
    pub scheduled_start: NaiveTime,
    pub standard_workday_minutes: i32,
    pub lateness_grace_minutes: i32,
    pub repeated_lateness_threshold: u32,
    pub working_days: Vec<Weekday>,

    // Leave policy
    pub default_leave_allotment: i32,

    pub device_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{key} must be set"));

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),
            run_migrations: parse_or(&lookup, "RUN_MIGRATIONS", true)?,

            rate_protected_per_min: parse_or(&lookup, "RATE_PROTECTED_PER_MIN", 1000)?,
            rate_device_per_min: parse_or(&lookup, "RATE_DEVICE_PER_MIN", 120)?,

            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
            log_level: parse_or(&lookup, "LOG_LEVEL", tracing::Level::DEBUG)?,

            scheduled_start: match lookup("SCHEDULED_START") {
                Some(raw) => parse_clock_time(&raw).context("SCHEDULED_START")?,
                None => NaiveTime::from_hms_opt(8, 0, 0).context("default start")?,
            },
            standard_workday_minutes: parse_or(&lookup, "STANDARD_WORKDAY_MINUTES", 480)?,
            lateness_grace_minutes: parse_or(&lookup, "LATENESS_GRACE_MINUTES", 0)?,
            repeated_lateness_threshold: parse_or(&lookup, "REPEATED_LATENESS_THRESHOLD", 3)?,
            working_days: parse_weekdays(
                &lookup("WORKING_DAYS").unwrap_or_else(|| "Mon,Tue,Wed,Thu,Fri".to_string()),
            )?,

            default_leave_allotment: parse_or(&lookup, "DEFAULT_LEAVE_ALLOTMENT", 30)?,

            device_timeout: Duration::from_secs(parse_or(&lookup, "DEVICE_TIMEOUT_SECS", 5)?),
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key} has an invalid value {raw:?}: {e}")),
        None => Ok(default),
    }
}

/// Accepts `HH:MM` or `HH:MM:SS`.
pub fn parse_clock_time(raw: &str) -> Result<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .with_context(|| format!("invalid time of day {raw:?}"))
}

pub fn parse_weekdays(raw: &str) -> Result<Vec<Weekday>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Weekday>()
                .map_err(|_| anyhow!("invalid weekday {s:?} in WORKING_DAYS"))
        })
        .collect()
}
