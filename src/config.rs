//! Configuration loading and types for the exporter.
//!
//! Configuration is read from environment variables, matching the
//! conventions of other single-purpose exporters: two required
//! credential variables and two optional tuning knobs with defaults.

use std::str::FromStr;

use crate::errors::ConfigError;

/// Default port for the `/metrics` endpoint.
pub const DEFAULT_METRICS_PORT: u16 = 9139;

/// Default seconds between refresh cycles (12 hours).
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 43_200;

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// B2 application key ID (`B2_APPLICATION_KEY_ID`, required).
    pub application_key_id: String,

    /// B2 application key secret (`B2_APPLICATION_KEY`, required).
    pub application_key: String,

    /// Port to serve `/metrics` on (`METRICS_PORT`).
    pub metrics_port: u16,

    /// Seconds between the end of one refresh cycle and the start of the
    /// next (`UPDATE_INTERVAL`).
    pub update_interval_secs: u64,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an injectable variable lookup, so tests
    /// can supply values without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let application_key_id = lookup("B2_APPLICATION_KEY_ID")
            .ok_or(ConfigError::MissingVar("B2_APPLICATION_KEY_ID"))?;
        let application_key =
            lookup("B2_APPLICATION_KEY").ok_or(ConfigError::MissingVar("B2_APPLICATION_KEY"))?;

        let metrics_port = parse_var(&lookup, "METRICS_PORT", "port number", DEFAULT_METRICS_PORT)?;
        let update_interval_secs = parse_var(
            &lookup,
            "UPDATE_INTERVAL",
            "number of seconds",
            DEFAULT_UPDATE_INTERVAL_SECS,
        )?;

        Ok(Self {
            application_key_id,
            application_key,
            metrics_port,
            update_interval_secs,
        })
    }
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_var<F, T>(
    lookup: &F,
    var: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidVar {
            var,
            expected,
            value,
        }),
    }
}

// -- Tests --------------------------------------------------------------------
