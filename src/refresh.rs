//! The refresh loop: build a snapshot, publish it, sleep, repeat.
//!
//! This is the only writer of [`PublishedMetrics`]. Cycles never
//! overlap; the interval is measured from the end of one cycle to the
//! start of the next, so a slow cycle simply delays its successor.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::errors::ExporterError;
use crate::metrics::PublishedMetrics;
use crate::snapshot::build_snapshot;
use crate::storage::client::StorageClient;

/// Run one Building -> Publishing pass. Returns the number of buckets
/// published. On error nothing is published and the previously published
/// set is left untouched.
pub async fn run_cycle(
    client: &dyn StorageClient,
    metrics: &PublishedMetrics,
) -> Result<usize, ExporterError> {
    let snapshot = build_snapshot(client).await?;
    let bucket_count = snapshot.buckets.len();
    metrics.publish(&snapshot);
    Ok(bucket_count)
}

/// Run cycles forever. A failed cycle is logged at `warn` and skipped;
/// the last successfully published metrics keep being served until a
/// later cycle succeeds. Only process shutdown ends the loop.
pub async fn run(
    client: Arc<dyn StorageClient>,
    metrics: Arc<PublishedMetrics>,
    interval: Duration,
) {
    loop {
        match run_cycle(client.as_ref(), &metrics).await {
            Ok(buckets) => info!(buckets, "published bucket metrics"),
            Err(e) => warn!(error = %e, "refresh cycle failed, keeping previous metrics"),
        }
        tokio::time::sleep(interval).await;
    }
}

// -- Tests --------------------------------------------------------------------
