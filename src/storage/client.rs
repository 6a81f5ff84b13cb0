//! Abstract storage client trait.
//!
//! The refresh loop only needs two read-only operations against the
//! storage account, so the trait stays small and tests can implement it
//! with canned data.

use std::future::Future;
use std::pin::Pin;

use crate::errors::ExporterError;

/// One stored object version: its byte size and when it was uploaded.
///
/// A bucket may retain several versions per key; every one of them is
/// reported separately and counts toward the bucket's totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectVersion {
    /// Size of this version in bytes.
    pub size: u64,
    /// Upload time, epoch milliseconds.
    pub upload_timestamp: i64,
}

/// Async read-only view of an object-storage account.
pub trait StorageClient: Send + Sync + 'static {
    /// Names of every bucket visible to the authenticated account.
    fn list_bucket_names(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, ExporterError>> + Send + '_>>;

    /// Every object version in `bucket`, recursing through any folder-like
    /// key structure and including historical (non-latest) versions.
    fn list_object_versions(
        &self,
        bucket: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ObjectVersion>, ExporterError>> + Send + '_>>;
}
