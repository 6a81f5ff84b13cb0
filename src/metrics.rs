//! Published gauge state for the exporter.
//!
//! Three gauge families, each labeled by bucket name, live in a private
//! [`prometheus::Registry`] (no process/platform collectors -- the only
//! series served are the bucket gauges). Replacement is clear-then-set
//! under an exclusive guard, and rendering takes the shared side of the
//! same guard, so a scrape observes either the fully-old or fully-new
//! set, never a mixture.

use std::sync::RwLock;

use prometheus::proto::MetricFamily;
use prometheus::{IntGaugeVec, Opts, Registry, TextEncoder};

use crate::snapshot::Snapshot;

/// Unix timestamp of the most recent upload per bucket (gauge).
pub const LAST_UPDATE_TIME: &str = "backblaze_b2_last_update_time";

/// Summed byte size of all object versions per bucket (gauge).
pub const TOTAL_SIZE: &str = "backblaze_b2_total_size";

/// Count of all object versions per bucket (gauge).
pub const OBJECT_COUNT: &str = "backblaze_b2_object_count";

/// The process-wide published metric set.
///
/// Writer: the refresh loop, one [`PublishedMetrics::publish`] per
/// successful cycle. Readers: scrape handlers, arbitrarily many.
pub struct PublishedMetrics {
    registry: Registry,
    last_update: IntGaugeVec,
    total_size: IntGaugeVec,
    object_count: IntGaugeVec,
    /// Held exclusively across the clear-then-set replacement and shared
    /// while gathering, keeping each scrape internally consistent.
    guard: RwLock<()>,
}

impl PublishedMetrics {
    /// Create the three gauge families, initially empty. They stay empty
    /// until the first successful refresh cycle publishes a snapshot.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let last_update = IntGaugeVec::new(
            Opts::new(
                LAST_UPDATE_TIME,
                "last update timestamp for a given bucket, in unix time.",
            ),
            &["bucket"],
        )?;
        let total_size = IntGaugeVec::new(
            Opts::new(
                TOTAL_SIZE,
                "total size of contents for a given bucket, in bytes.",
            ),
            &["bucket"],
        )?;
        let object_count = IntGaugeVec::new(
            Opts::new(
                OBJECT_COUNT,
                "total count of contents for a given bucket, in objects.",
            ),
            &["bucket"],
        )?;

        registry.register(Box::new(last_update.clone()))?;
        registry.register(Box::new(total_size.clone()))?;
        registry.register(Box::new(object_count.clone()))?;

        Ok(Self {
            registry,
            last_update,
            total_size,
            object_count,
            guard: RwLock::new(()),
        })
    }

    /// Replace the published values with exactly the contents of
    /// `snapshot`: every existing label series is cleared first, then one
    /// series per bucket is set. Buckets absent from the snapshot lose
    /// their series; a bucket with no latest timestamp (empty bucket)
    /// gets no last-update series this cycle.
    pub fn publish(&self, snapshot: &Snapshot) {
        let _guard = self.guard.write().expect("metrics guard poisoned");

        self.last_update.reset();
        self.total_size.reset();
        self.object_count.reset();

        for (bucket, stats) in &snapshot.buckets {
            if let Some(ts) = stats.latest_timestamp {
                self.last_update.with_label_values(&[bucket.as_str()]).set(ts);
            }
            self.total_size
                .with_label_values(&[bucket.as_str()])
                .set(stats.total_size as i64);
            self.object_count
                .with_label_values(&[bucket.as_str()])
                .set(stats.object_count as i64);
        }
    }

    /// Render the current set in the Prometheus text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        let _guard = self.guard.read().expect("metrics guard poisoned");
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }

    /// Gather the raw metric families (consistent under the read guard).
    pub fn gather(&self) -> Vec<MetricFamily> {
        let _guard = self.guard.read().expect("metrics guard poisoned");
        self.registry.gather()
    }
}

// -- Tests --------------------------------------------------------------------
