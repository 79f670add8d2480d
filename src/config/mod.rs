//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing or
//! malformed. The database URL is wrapped in secrecy::SecretString so it
//! never ends up in logs.

use std::time::Duration;

use crate::error::{Error, Result};
use secrecy::SecretString;

/// Seconds between reconcile passes when `RECONCILE_INTERVAL_SECS` is unset.
pub const DEFAULT_RECONCILE_SECS: u64 = 30;

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    /// How often `habit serve` re-aligns its scheduler with the database.
    pub reconcile_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    /// In production, systemd EnvironmentFile provides the vars.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let reconcile_secs = match lookup("RECONCILE_INTERVAL_SECS") {
            Some(raw) => parse_positive("RECONCILE_INTERVAL_SECS", &raw)?,
            None => DEFAULT_RECONCILE_SECS,
        };

        Ok(Self {
            database_url: SecretString::from(required_var(&lookup, "DATABASE_URL")?),
            otel_endpoint: lookup("OTEL_ENDPOINT").filter(|s| !s.is_empty()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            reconcile_interval: Duration::from_secs(reconcile_secs),
        })
    }
}

fn required_var(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    lookup(name)
        .ok_or_else(|| Error::Config(format!("required environment variable {name} is not set")))
}

fn parse_positive(name: &str, raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::Config(format!(
            "{name} must be a positive number of seconds, got '{raw}'"
        ))),
    }
}
