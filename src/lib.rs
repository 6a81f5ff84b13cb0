//! B2 exporter library -- per-bucket usage metrics for Backblaze B2.
//!
//! This crate provides the components for running a small Prometheus
//! exporter: a read-only B2 API client, per-bucket aggregation into
//! snapshots, atomically replaced gauge state, and the refresh loop
//! that ties them together alongside an HTTP metrics server.

use std::sync::Arc;

pub mod config;
pub mod errors;
pub mod metrics;
pub mod refresh;
pub mod server;
pub mod snapshot;
pub mod storage;

use crate::metrics::PublishedMetrics;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// The currently published gauge families, replaced by the refresh loop.
    pub metrics: Arc<PublishedMetrics>,
}
