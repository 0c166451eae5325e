use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::delivery::push::EXPO_PUSH_ENDPOINT;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// SMTP relay settings. Present only when every credential is configured.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub smtp: Option<SmtpSettings>,
    pub portal_base_url: Option<String>,
    pub push_endpoint: String,
    /// Bearer secret required on `/functions/v1/*` when set.
    pub function_secret: Option<String>,
    pub dispatch_batch_size: i64,
    pub dispatch_concurrency: usize,
    pub reminder_horizon_hours: i64,
    pub reminder_batch_size: usize,
    pub delivery_timeout: Duration,
    pub log_dir: Option<PathBuf>,
    pub run_migrations: bool,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let smtp = match (
            get("SMTP_HOST"),
            get("SMTP_USER"),
            get("SMTP_PASSWORD"),
            get("SMTP_FROM"),
        ) {
            (Some(host), Some(username), Some(password), Some(from)) => Some(SmtpSettings {
                host,
                port: parse_or("SMTP_PORT", get("SMTP_PORT"), 587)?,
                username,
                password,
                from,
            }),
            _ => None,
        };

        let config = Self {
            database_url,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            smtp,
            portal_base_url: get("PORTAL_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            push_endpoint: get("PUSH_ENDPOINT").unwrap_or_else(|| EXPO_PUSH_ENDPOINT.to_string()),
            function_secret: get("FUNCTION_SECRET"),
            dispatch_batch_size: positive("DISPATCH_BATCH_SIZE", get("DISPATCH_BATCH_SIZE"), 50)?,
            dispatch_concurrency: positive("DISPATCH_CONCURRENCY", get("DISPATCH_CONCURRENCY"), 4)?,
            reminder_horizon_hours: positive(
                "REMINDER_HORIZON_HOURS",
                get("REMINDER_HORIZON_HOURS"),
                24,
            )?,
            reminder_batch_size: positive("REMINDER_BATCH_SIZE", get("REMINDER_BATCH_SIZE"), 500)?,
            delivery_timeout: Duration::from_secs(positive(
                "DELIVERY_TIMEOUT_SECS",
                get("DELIVERY_TIMEOUT_SECS"),
                10,
            )?),
            log_dir: get("LOG_DIR").map(PathBuf::from),
            run_migrations: parse_or("RUN_MIGRATIONS", get("RUN_MIGRATIONS"), false)?,
        };

        Ok(config)
    }

    pub fn email_enabled(&self) -> bool {
        self.smtp.is_some()
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

fn positive<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default + Copy,
    T::Err: std::fmt::Display,
{
    let value = parse_or(key, raw.clone(), default)?;
    if value <= T::default() {
        return Err(ConfigError::Invalid {
            key,
            value: raw.unwrap_or_default(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}
