//! S3-compatible object store.
//!
//! Works with AWS S3 and the S3-compatible services records usually end up
//! archived on (Backblaze B2, Tigris, MinIO, ...).
//!
//! # Credentials
//!
//! Credentials are provided explicitly via the configuration file: each store
//! specifies its own `key_id` and `key_secret`.

use crate::backend::{KeyStream, key_for};
use crate::error::{ErrorKind, Result};
use crate::{ObjectStore, validate_key};
use async_stream::stream;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region, retry::RetryConfig};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use exn::ResultExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Generous default for concurrent S3 requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;

/// S3-compatible object store.
///
/// Keys live in a bucket, optionally under a key prefix; every key handed to
/// or returned from this store is relative to that prefix.
///
/// # Examples
///
/// ```no_run
/// use pantry_storage::backend::S3ObjectStore;
///
/// # fn example() -> pantry_storage::error::Result<()> {
/// let store = S3ObjectStore::new(
///     "archive",
///     "recordings",
///     Some("raw/".to_string()),
///     "us-west-004",
///     Some("https://s3.us-west-004.backblazeb2.com".to_string()),
///     "access_key_id",
///     "secret_access_key",
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    name: String,
    client: Client,
    bucket: String,
    prefix: Option<String>,
    rate_limiter: Arc<Semaphore>,
}

impl S3ObjectStore {
    /// Create a new S3 object store.
    ///
    /// # Arguments
    /// * `name` - A name for this store (used in logging)
    /// * `bucket` - S3 bucket name
    /// * `prefix` - Optional key prefix (acts as virtual directory)
    /// * `region` - AWS region or provider-specific region (e.g., "us-west-004" for Backblaze)
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - Access key ID
    /// * `key_secret` - Secret access key
    pub fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let credentials = Credentials::new(key_id, key_secret, None, None, "pantry-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            // 1 initial attempt + 3 retries with exponential backoff.
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Path-style addressing for S3-compatible services.
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Self::from_client(name, Client::from_conf(config_builder.build()), bucket, prefix)
    }

    /// Wrap an already configured client.
    pub fn from_client(
        name: impl Into<String>,
        client: Client,
        bucket: impl Into<String>,
        prefix: Option<String>,
    ) -> Result<Self> {
        let prefix = prefix.map(normalize_prefix).transpose()?.flatten();
        Ok(Self {
            name: name.into(),
            client,
            bucket: bucket.into(),
            prefix,
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        })
    }

    fn full_key(&self, key: &str) -> Result<String> {
        Ok(join_prefix(self.prefix.as_deref(), &validate_key(key)?))
    }

    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        self.rate_limiter
            .clone()
            .acquire_owned()
            .await
            .or_raise(|| ErrorKind::BackendError("S3 rate limiter closed".to_string()))
    }
}

/// Normalize a configured prefix to `segment/segment` form, `None` if empty.
fn normalize_prefix(prefix: String) -> Result<Option<String>> {
    if prefix.trim_matches('/').is_empty() {
        return Ok(None);
    }
    Ok(Some(validate_key(&prefix)?))
}

fn join_prefix(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}/{key}"),
        None => key.to_string(),
    }
}

/// Strip the store prefix from a bucket key; `None` for keys outside of it.
fn strip_prefix<'k>(prefix: Option<&str>, key: &'k str) -> Option<&'k str> {
    match prefix {
        Some(prefix) => key.strip_prefix(prefix).and_then(|rest| rest.strip_prefix('/')),
        None => Some(key),
    }
}

fn network_error<E: std::error::Error>(key: &str, err: E) -> ErrorKind {
    ErrorKind::Network(format!("{key}: {}", DisplayErrorContext(err)))
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: &'a str) -> KeyStream<'a> {
        // Raw string prefix: S3 matches it character-wise, so it must not go
        // through key normalization ("1.ogg." has to stay "1.ogg.").
        let full_prefix = join_prefix(self.prefix.as_deref(), prefix.trim_start_matches('/'));
        Box::pin(stream! {
            let _permit = match self.acquire_permit().await {
                Ok(permit) => permit,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            let mut pages = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&full_prefix)
                .into_paginator()
                .send();
            while let Some(page) = pages.next().await {
                let page = match page {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(exn::Exn::from(network_error(&full_prefix, e)));
                        break;
                    },
                };
                for object in page.contents() {
                    let Some(key) = object.key() else { continue };
                    match strip_prefix(self.prefix.as_deref(), key) {
                        Some(relative) => yield Ok(relative.to_string()),
                        None => tracing::warn!(store = %self.name, key, "Listed key outside of store prefix"),
                    }
                }
            }
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let full_key = self.full_key(key)?;
        let _permit = self.acquire_permit().await?;
        let output = match self.client.get_object().bucket(&self.bucket).key(&full_key).send().await {
            Ok(output) => output,
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    exn::bail!(ErrorKind::NotFound(key.to_string()));
                }
                exn::bail!(network_error(key, service_error));
            },
        };
        let body = output.body.collect().await.map_err(|e| network_error(key, e))?;
        Ok(body.into_bytes().to_vec())
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let full_key = self.full_key(key)?;
        let _permit = self.acquire_permit().await?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| network_error(key, e))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let full_key = self.full_key(key)?;
        let _permit = self.acquire_permit().await?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
            .map_err(|e| network_error(key, e))?;
        Ok(())
    }

    async fn create(&self, paths: &[PathBuf]) -> Result<Vec<String>> {
        // Stream from disk; cooked files can be large.
        let mut keys = Vec::with_capacity(paths.len());
        for path in paths {
            let key = key_for(path)?;
            let body = ByteStream::from_path(path).await.map_err(|e| network_error(&key, e))?;
            let full_key = self.full_key(&key)?;
            let _permit = self.acquire_permit().await?;
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&full_key)
                .body(body)
                .send()
                .await
                .map_err(|e| network_error(&key, e))?;
            tracing::debug!(store = %self.name, key = %key, "Uploaded object");
            keys.push(key);
        }
        Ok(keys)
    }
}
