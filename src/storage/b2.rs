//! Backblaze B2 native JSON API client.
//!
//! Talks to the B2 v2 API over `reqwest`: a single authorize call yields
//! a per-session API base URL and token, after which bucket and
//! file-version listings are plain JSON POSTs. The session token is
//! cached in memory and refreshed once when the API answers 401 (expired
//! or revoked token); a second rejection fails the call.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::client::{ObjectVersion, StorageClient};
use crate::errors::ExporterError;

/// Authorize endpoint. Fixed host; every later call goes to the
/// session-specific `apiUrl` returned by this one.
const B2_AUTH_URL: &str = "https://api.backblazeb2.com/b2api/v2/b2_authorize_account";

/// Maximum entries per `b2_list_file_versions` transaction.
const LIST_VERSIONS_PAGE_SIZE: u32 = 1000;

/// Bounded per-call timeout so one unresponsive request cannot stall the
/// refresh loop indefinitely.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

// -- B2 JSON API response types -----------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeResponse {
    account_id: String,
    authorization_token: String,
    api_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct B2Bucket {
    bucket_id: String,
    bucket_name: String,
}

#[derive(Debug, Deserialize)]
struct ListBucketsResponse {
    buckets: Vec<B2Bucket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct B2FileVersion {
    content_length: u64,
    upload_timestamp: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListFileVersionsResponse {
    files: Vec<B2FileVersion>,
    next_file_name: Option<String>,
    next_file_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct B2ErrorResponse {
    code: Option<String>,
    message: Option<String>,
}

// -- Session management -------------------------------------------------------

/// Cached result of `b2_authorize_account`.
#[derive(Clone)]
struct AuthSession {
    account_id: String,
    token: String,
    api_url: String,
}

/// Read-only client for one B2 account.
pub struct B2Client {
    /// HTTP client for all B2 API calls.
    client: reqwest::Client,
    /// Application key ID used to authorize.
    key_id: String,
    /// Application key secret.
    key: String,
    /// Cached session; cleared on 401 to force re-authorization.
    session: Mutex<Option<AuthSession>>,
    /// Bucket name -> bucket ID, refreshed by every bucket listing.
    bucket_ids: Mutex<HashMap<String, String>>,
}

impl B2Client {
    /// Create a client for the given application key pair. No network
    /// traffic happens until [`B2Client::authorize`] or the first listing.
    pub fn new(key_id: String, key: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to create HTTP client: {e}"))?;

        Ok(Self {
            client,
            key_id,
            key,
            session: Mutex::new(None),
            bucket_ids: Mutex::new(HashMap::new()),
        })
    }

    /// Authorize eagerly. Called once at startup so bad credentials are
    /// reported before the metrics port is even bound.
    pub async fn authorize(&self) -> Result<(), ExporterError> {
        self.ensure_session().await.map(|_| ())
    }

    /// Return the cached session, authorizing first if there is none.
    async fn ensure_session(&self) -> Result<AuthSession, ExporterError> {
        let cached = self.session.lock().expect("session lock poisoned").clone();
        if let Some(session) = cached {
            return Ok(session);
        }

        let response = self
            .client
            .get(B2_AUTH_URL)
            .basic_auth(&self.key_id, Some(&self.key))
            .send()
            .await
            .map_err(|e| ExporterError::Auth(format!("authorize request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = read_error_detail(response).await;
            return Err(ExporterError::Auth(format!("{status}: {detail}")));
        }

        let auth: AuthorizeResponse = response
            .json()
            .await
            .map_err(|e| ExporterError::Auth(format!("malformed authorize response: {e}")))?;

        let session = AuthSession {
            account_id: auth.account_id,
            token: auth.authorization_token,
            api_url: auth.api_url,
        };
        info!(api_url = %session.api_url, "authorized with B2");

        *self.session.lock().expect("session lock poisoned") = Some(session.clone());
        Ok(session)
    }

    /// POST to a v2 API endpoint, building the body from the current
    /// session. On a 401 the cached session is dropped and the call is
    /// retried once with a fresh token.
    async fn api_post<T, B>(&self, endpoint: &str, body: B) -> anyhow::Result<T>
    where
        T: DeserializeOwned,
        B: Fn(&AuthSession) -> serde_json::Value,
    {
        let mut reauthorized = false;
        loop {
            let session = self.ensure_session().await?;
            let url = format!("{}/b2api/v2/{}", session.api_url, endpoint);
            let response = self
                .client
                .post(&url)
                .header(reqwest::header::AUTHORIZATION, session.token.as_str())
                .json(&body(&session))
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED && !reauthorized {
                warn!(endpoint, "session token rejected, re-authorizing");
                self.session.lock().expect("session lock poisoned").take();
                reauthorized = true;
                continue;
            }
            if !status.is_success() {
                let detail = read_error_detail(response).await;
                anyhow::bail!("{endpoint} returned {status}: {detail}");
            }
            return Ok(response.json().await?);
        }
    }

    /// List all buckets in the account, refreshing the name -> ID cache.
    async fn list_buckets(&self) -> anyhow::Result<Vec<B2Bucket>> {
        let response: ListBucketsResponse = self
            .api_post("b2_list_buckets", |session| {
                json!({ "accountId": session.account_id })
            })
            .await?;

        let mut ids = self.bucket_ids.lock().expect("bucket id cache poisoned");
        ids.clear();
        for bucket in &response.buckets {
            ids.insert(bucket.bucket_name.clone(), bucket.bucket_id.clone());
        }
        drop(ids);

        Ok(response.buckets)
    }

    /// Resolve a bucket name to its ID, refreshing the cache on a miss.
    async fn bucket_id(&self, bucket: &str) -> anyhow::Result<String> {
        let cached = self
            .bucket_ids
            .lock()
            .expect("bucket id cache poisoned")
            .get(bucket)
            .cloned();
        if let Some(id) = cached {
            return Ok(id);
        }

        self.list_buckets().await?;
        self.bucket_ids
            .lock()
            .expect("bucket id cache poisoned")
            .get(bucket)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("bucket '{bucket}' not found in account"))
    }

    /// Walk every version page in `bucket`. No delimiter is sent, so the
    /// listing recurses through folder-like keys and reports historical
    /// versions too.
    async fn list_versions(&self, bucket: &str) -> anyhow::Result<Vec<ObjectVersion>> {
        let bucket_id = self.bucket_id(bucket).await?;

        let mut versions = Vec::new();
        let mut cursor: Option<(String, Option<String>)> = None;
        loop {
            let page: ListFileVersionsResponse = self
                .api_post("b2_list_file_versions", |_| {
                    let mut body = json!({
                        "bucketId": bucket_id,
                        "maxFileCount": LIST_VERSIONS_PAGE_SIZE,
                    });
                    if let Some((name, id)) = &cursor {
                        body["startFileName"] = json!(name);
                        if let Some(id) = id {
                            body["startFileId"] = json!(id);
                        }
                    }
                    body
                })
                .await?;

            versions.extend(page.files.iter().map(|f| ObjectVersion {
                size: f.content_length,
                upload_timestamp: f.upload_timestamp,
            }));

            match page.next_file_name {
                Some(name) => {
                    debug!(bucket, fetched = versions.len(), "fetching next version page");
                    cursor = Some((name, page.next_file_id));
                }
                None => break,
            }
        }

        Ok(versions)
    }
}

impl StorageClient for B2Client {
    fn list_bucket_names(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, ExporterError>> + Send + '_>> {
        Box::pin(async move {
            let buckets = self
                .list_buckets()
                .await
                .map_err(ExporterError::ListBuckets)?;
            Ok(buckets.into_iter().map(|b| b.bucket_name).collect())
        })
    }

    fn list_object_versions(
        &self,
        bucket: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ObjectVersion>, ExporterError>> + Send + '_>> {
        let bucket = bucket.to_string();
        Box::pin(async move {
            self.list_versions(&bucket)
                .await
                .map_err(|source| ExporterError::ListVersions { bucket, source })
        })
    }
}

/// Pull a human-readable error description out of a failed response.
async fn read_error_detail(response: reqwest::Response) -> String {
    match response.json::<B2ErrorResponse>().await {
        Ok(body) => {
            let code = body.code.unwrap_or_default();
            let message = body.message.unwrap_or_default();
            format!("{code} {message}").trim().to_string()
        }
        Err(_) => "(unreadable error body)".to_string(),
    }
}
