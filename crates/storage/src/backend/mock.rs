//! In-memory object store for testing.

use super::KeyStream;
use crate::error::{ErrorKind, Result};
use crate::{ObjectStore, validate_key};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Primitive operations that can be told to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Get,
    Put,
    Remove,
}

/// In-memory object store for testing.
///
/// Objects are kept in a `HashMap` behind a [`RwLock`], so all trait methods
/// operate on `&self`. Individual operations can be made to fail with
/// [`failing()`](Self::failing) to exercise error paths of callers.
///
/// # Examples
///
/// ```
/// use pantry_storage::backend::{MockObjectStore, Operation};
/// use pantry_storage::ObjectStore;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> pantry_storage::error::Result<()> {
/// let store = MockObjectStore::with_objects([("1.ogg.data", b"opus")]);
/// assert_eq!(store.list("1.ogg.").await?, vec!["1.ogg.data"]);
///
/// let broken = MockObjectStore::default().failing(Operation::Put);
/// assert!(broken.put("2.zip", b"data".to_vec()).await.is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MockObjectStore {
    name: String,
    objects: RwLock<HashMap<String, Vec<u8>>>,
    failures: HashSet<Operation>,
    calls: [AtomicUsize; 4],
}

impl MockObjectStore {
    /// Create a mock store pre-populated with objects.
    ///
    /// Panics if any key fails validation. If test setup is wrong, then the
    /// test should not pass.
    pub fn with_objects(objects: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        for (key, data) in objects {
            let key = key.into();
            let Ok(validated) = validate_key(&key) else {
                panic!("MockObjectStore::with_objects: invalid key {key:?}");
            };
            map.insert(validated, data.into());
        }
        Self {
            name: "mock".to_string(),
            objects: RwLock::new(map),
            failures: HashSet::new(),
            calls: Default::default(),
        }
    }

    /// Make every call of `operation` fail with a network error.
    pub fn failing(mut self, operation: Operation) -> Self {
        self.failures.insert(operation);
        self
    }

    /// Snapshot of every stored key, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// How many times `operation` was called, failed calls included.
    pub fn calls(&self, operation: Operation) -> usize {
        self.calls[operation as usize].load(Ordering::Relaxed)
    }

    fn check(&self, operation: Operation, key: &str) -> Result<()> {
        self.calls[operation as usize].fetch_add(1, Ordering::Relaxed);
        if self.failures.contains(&operation) {
            exn::bail!(ErrorKind::Network(format!("injected {operation:?} failure for {key:?}")));
        }
        Ok(())
    }
}
impl Default for MockObjectStore {
    fn default() -> Self {
        let objects: [(&str, &[u8]); 0] = [];
        Self::with_objects(objects)
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: &'a str) -> KeyStream<'a> {
        if let Err(e) = self.check(Operation::List, prefix) {
            return Box::pin(futures::stream::once(async move { Err(e) }));
        }
        Box::pin(stream! {
            // Snapshot under the read lock, then release it before yielding.
            let keys: Vec<String> = {
                let guard = self.objects.read().await;
                guard.keys().filter(|key| key.starts_with(prefix)).cloned().collect()
            };
            for key in keys {
                yield Ok(key);
            }
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.check(Operation::Get, key)?;
        let key = validate_key(key)?;
        let guard = self.objects.read().await;
        let data = guard.get(&key).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key)))?;
        Ok(data)
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
        self.check(Operation::Put, key)?;
        let key = validate_key(key)?;
        self.objects.write().await.insert(key, data);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check(Operation::Remove, key)?;
        let key = validate_key(key)?;
        self.objects.write().await.remove(&key).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key)))
    }
}
