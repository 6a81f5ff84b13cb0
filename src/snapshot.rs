//! Per-bucket aggregation and whole-account snapshots.
//!
//! A snapshot is complete or it does not exist: any per-bucket failure
//! abandons the whole build, because a partially populated mapping would
//! be indistinguishable from deleted buckets once published.

use std::collections::BTreeMap;

use tracing::debug;

use crate::errors::ExporterError;
use crate::storage::client::{ObjectVersion, StorageClient};

/// Usage statistics for one bucket, folded over every object version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketStats {
    /// Summed byte size of all versions.
    pub total_size: u64,
    /// Number of versions.
    pub object_count: u64,
    /// Most recent upload time in epoch milliseconds. `None` for a bucket
    /// with no versions; the last-update gauge is then simply not emitted
    /// for that bucket.
    pub latest_timestamp: Option<i64>,
}

impl BucketStats {
    /// Fold object versions into stats. An empty sequence yields zero
    /// size, zero count, and no latest timestamp.
    pub fn aggregate<I>(versions: I) -> Self
    where
        I: IntoIterator<Item = ObjectVersion>,
    {
        let mut stats = BucketStats {
            total_size: 0,
            object_count: 0,
            latest_timestamp: None,
        };
        for version in versions {
            stats.total_size += version.size;
            stats.object_count += 1;
            stats.latest_timestamp = Some(match stats.latest_timestamp {
                Some(ts) => ts.max(version.upload_timestamp),
                None => version.upload_timestamp,
            });
        }
        stats
    }
}

/// One complete, internally consistent view of every bucket in the
/// account, captured during a single refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Bucket name -> stats. Key set equals exactly the bucket names
    /// listed for this cycle.
    pub buckets: BTreeMap<String, BucketStats>,
}

/// List all buckets visible under the current credentials and aggregate
/// each one. Read-only; the first failure aborts the whole build.
pub async fn build_snapshot(client: &dyn StorageClient) -> Result<Snapshot, ExporterError> {
    let names = client.list_bucket_names().await?;

    let mut buckets = BTreeMap::new();
    for name in names {
        let versions = client.list_object_versions(&name).await?;
        let stats = BucketStats::aggregate(versions);
        debug!(
            bucket = %name,
            total_size = stats.total_size,
            object_count = stats.object_count,
            "aggregated bucket"
        );
        buckets.insert(name, stats);
    }

    Ok(Snapshot { buckets })
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;

    /// Canned storage account for tests.
    struct FakeClient {
        buckets: Vec<(String, Vec<ObjectVersion>)>,
        fail_bucket: Option<String>,
    }

    impl FakeClient {
        fn new(buckets: Vec<(&str, Vec<ObjectVersion>)>) -> Self {
            Self {
                buckets: buckets
                    .into_iter()
                    .map(|(name, versions)| (name.to_string(), versions))
                    .collect(),
                fail_bucket: None,
            }
        }
    }

    impl StorageClient for FakeClient {
        fn list_bucket_names(
            &self,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, ExporterError>> + Send + '_>>
        {
            let names: Vec<String> = self.buckets.iter().map(|(n, _)| n.clone()).collect();
            Box::pin(async move { Ok(names) })
        }

        fn list_object_versions(
            &self,
            bucket: &str,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<ObjectVersion>, ExporterError>> + Send + '_>>
        {
            let result = if self.fail_bucket.as_deref() == Some(bucket) {
                Err(ExporterError::ListVersions {
                    bucket: bucket.to_string(),
                    source: anyhow::anyhow!("simulated listing failure"),
                })
            } else {
                Ok(self
                    .buckets
                    .iter()
                    .find(|(n, _)| n == bucket)
                    .map(|(_, v)| v.clone())
                    .unwrap_or_default())
            };
            Box::pin(async move { result })
        }
    }

    fn version(size: u64, ts: i64) -> ObjectVersion {
        ObjectVersion {
            size,
            upload_timestamp: ts,
        }
    }

    #[test]
    fn test_aggregate_folds_all_versions() {
        let stats = BucketStats::aggregate(vec![version(100, 1000), version(50, 2000)]);
        assert_eq!(stats.total_size, 150);
        assert_eq!(stats.object_count, 2);
        assert_eq!(stats.latest_timestamp, Some(2000));
    }

    #[test]
    fn test_aggregate_latest_timestamp_is_max_not_last() {
        let stats = BucketStats::aggregate(vec![
            version(1, 5000),
            version(1, 3000),
            version(1, 4000),
        ]);
        assert_eq!(stats.latest_timestamp, Some(5000));
    }

    #[test]
    fn test_aggregate_empty_bucket() {
        let stats = BucketStats::aggregate(Vec::new());
        assert_eq!(stats.total_size, 0);
        assert_eq!(stats.object_count, 0);
        assert_eq!(stats.latest_timestamp, None);
    }

    #[tokio::test]
    async fn test_build_snapshot_covers_all_listed_buckets() {
        let client = FakeClient::new(vec![
            ("logs", vec![version(100, 1000), version(50, 2000)]),
            ("archive", vec![]),
        ]);

        let snapshot = build_snapshot(&client).await.unwrap();

        let names: Vec<&str> = snapshot.buckets.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["archive", "logs"]);

        let logs = &snapshot.buckets["logs"];
        assert_eq!(logs.total_size, 150);
        assert_eq!(logs.object_count, 2);
        assert_eq!(logs.latest_timestamp, Some(2000));

        let archive = &snapshot.buckets["archive"];
        assert_eq!(archive.total_size, 0);
        assert_eq!(archive.object_count, 0);
        assert_eq!(archive.latest_timestamp, None);
    }

    #[tokio::test]
    async fn test_build_snapshot_fails_whole_cycle_on_one_bucket() {
        let mut client = FakeClient::new(vec![
            ("logs", vec![version(100, 1000)]),
            ("broken", vec![]),
        ]);
        client.fail_bucket = Some("broken".to_string());

        let err = build_snapshot(&client).await.unwrap_err();
        assert!(matches!(
            err,
            ExporterError::ListVersions { ref bucket, .. } if bucket == "broken"
        ));
    }
}
