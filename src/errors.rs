//! Exporter error types.
//!
//! Two families: [`ConfigError`] for startup configuration problems,
//! which are always fatal, and [`ExporterError`] for anything that goes
//! wrong talking to the storage backend. A backend error during startup
//! authentication is fatal; the same error inside a refresh cycle only
//! abandons that cycle (the loop logs it and keeps serving the previous
//! snapshot).

use thiserror::Error;

/// Invalid or missing configuration, detected before the metrics port is
/// bound or the backend is contacted. The process exits non-zero.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("{0} must be set")]
    MissingVar(&'static str),

    /// An environment variable is set but cannot be parsed.
    #[error("{var} is not a valid {expected}: '{value}'")]
    InvalidVar {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// A failure while querying the storage backend.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// Credentials rejected, or the authorize call itself failed.
    #[error("authentication with the storage backend failed: {0}")]
    Auth(String),

    /// Bucket enumeration failed.
    #[error("failed to list buckets")]
    ListBuckets(#[source] anyhow::Error),

    /// Object-version enumeration failed for one bucket.
    #[error("failed to list object versions in bucket '{bucket}'")]
    ListVersions {
        bucket: String,
        #[source]
        source: anyhow::Error,
    },
}
