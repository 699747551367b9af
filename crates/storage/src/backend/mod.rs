//! Object store trait and implementations.
//!
//! This module defines the [`ObjectStore`] trait, the only way the rest of
//! the workspace talks to a remote tier, plus the backends shipped with it:
//! a directory on the local filesystem, an S3-compatible bucket (feature
//! `s3`) and an in-memory store for tests (feature `mock`).

mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalObjectStore;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::{MockObjectStore, Operation};
#[cfg(feature = "s3")]
pub use self::s3::S3ObjectStore;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::pin::Pin;

pub(crate) type KeyStream<'a> = Pin<Box<dyn Stream<Item = Result<String>> + Send + 'a>>;

/// Upper bound on concurrent transfers issued by the provided batch methods.
const MAX_CONCURRENT_TRANSFERS: usize = 8;

/// Unified interface for object stores.
///
/// Implementors provide the single-object primitives ([`get`](Self::get),
/// [`put`](Self::put), [`remove`](Self::remove)) and a prefix listing; the
/// batch operations used by the record reconciler are provided on top of
/// them and may be overridden when a backend has a cheaper native form.
///
/// Implementations must be safe for concurrent use: several transcoding
/// jobs upload and list at the same time.
///
/// # Examples
///
/// ```
/// use pantry_storage::{ObjectStore, error::Result};
///
/// async fn record_on_remote(store: &dyn ObjectStore, id: u64) -> Result<bool> {
///     let keys = store.list(&format!("{id}.ogg.")).await?;
///     Ok(!keys.is_empty())
/// }
/// ```
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the configured store, used for logging only.
    fn name(&self) -> &str;

    /// Stream every key starting with `prefix`.
    ///
    /// Prefix matching is plain string matching (`"12"` matches `"123.zip"`),
    /// the way S3-compatible listings behave. An empty prefix lists
    /// everything.
    fn list_stream<'a>(&'a self, prefix: &'a str) -> KeyStream<'a>;

    /// Collect [`list_stream()`](Self::list_stream) into a [`Vec`].
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Fetch the contents of a single object.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the key
    /// does not exist.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Create or overwrite a single object.
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()>;

    /// Remove a single object.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the key
    /// does not exist.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Fetch several objects at once, keyed by object key.
    ///
    /// Fails as a whole on the first object that cannot be fetched.
    async fn retrieve(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>> {
        let fetches: Vec<_> = keys
            .iter()
            .map(|key| async move { self.get(key).await.map(|data| (key.clone(), data)) })
            .collect();
        futures::stream::iter(fetches)
            .buffer_unordered(MAX_CONCURRENT_TRANSFERS)
            .try_collect()
            .await
    }

    /// Upload local files, each under its own file name.
    ///
    /// Returns the created keys in the order of `paths`.
    async fn create(&self, paths: &[PathBuf]) -> Result<Vec<String>> {
        let mut keys = Vec::with_capacity(paths.len());
        for path in paths {
            let key = key_for(path)?;
            let data = tokio::fs::read(path).await.map_err(ErrorKind::Io)?;
            self.put(&key, data).await?;
            tracing::debug!(store = self.name(), key = %key, "Uploaded object");
            keys.push(key);
        }
        Ok(keys)
    }

    /// Remove several objects.
    ///
    /// Every key is attempted even if some fail; failures are reported
    /// together as [`Partial`](crate::error::ErrorKind::Partial).
    async fn delete(&self, keys: &[String]) -> Result<()> {
        let removals: Vec<_> = keys
            .iter()
            .map(|key| async move { self.remove(key).await.err().map(|e| format!("{key}: {}", &*e)) })
            .collect();
        let failures: Vec<String> = futures::stream::iter(removals)
            .buffer_unordered(MAX_CONCURRENT_TRANSFERS)
            .filter_map(std::future::ready)
            .collect()
            .await;
        if !failures.is_empty() {
            exn::bail!(ErrorKind::Partial { total: keys.len(), failures });
        }
        Ok(())
    }
}

/// Object key for a local file about to be uploaded: its file name.
pub(crate) fn key_for(path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| exn::Exn::from(ErrorKind::Unnamed(path.display().to_string())))?;
    crate::validate_key(name)
}
