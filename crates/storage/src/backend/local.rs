//! Local filesystem object store.
//!
//! Maps object keys onto files below a root directory, using `tokio::fs` for
//! async I/O. Handy as a "remote" tier on a mounted network share, and as a
//! real backend in tests.

use crate::backend::{KeyStream, key_for};
use crate::error::{ErrorKind, Result};
use crate::{ObjectStore, validate_key};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

enum WalkEntry {
    Object(String),
    Descend(PathBuf),
    Skip,
}

/// Directory-backed object store.
///
/// # Examples
///
/// ```no_run
/// use pantry_storage::backend::LocalObjectStore;
///
/// # fn example() -> pantry_storage::error::Result<()> {
/// let store = LocalObjectStore::new("archive", "/mnt/archive/records")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    name: String,
    /// Directory holding every object
    root: PathBuf,
}
impl LocalObjectStore {
    /// Create a new directory-backed store, creating `root` if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute or is not a directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
            }
        } else {
            // Only happens once at start-up; not worth an async constructor.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root.display().to_string()))?;
        }
        Ok(Self { name: name.into(), root })
    }

    fn absolute_path(&self, key: &str) -> Result<PathBuf> {
        Ok(self.root.join(validate_key(key)?))
    }

    /// Convert a file below the root back into its object key.
    fn key_of(&self, absolute: &Path) -> Result<String> {
        let relative = absolute.strip_prefix(&self.root).or_raise(|| {
            ErrorKind::BackendError(format!("path `{:?}` is not within root `{:?}`", absolute, self.root))
        })?;
        let segments = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| exn::Exn::from(ErrorKind::InvalidKey(relative.display().to_string())))?;
        validate_key(segments.join("/"))
    }

    fn map_io_error(e: std::io::Error, key: &str) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(key.to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(key.to_string()),
            _ => ErrorKind::Io(e),
        }
    }

    async fn process_entry(&self, entry: DirEntry, prefix: &str) -> Result<WalkEntry> {
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(ErrorKind::Io)?;
        if file_type.is_dir() {
            return Ok(WalkEntry::Descend(path));
        }
        if !file_type.is_file() {
            // Most likely a broken symlink.
            return Ok(WalkEntry::Skip);
        }
        let key = self.key_of(&path)?;
        match key.starts_with(prefix) {
            true => Ok(WalkEntry::Object(key)),
            false => Ok(WalkEntry::Skip),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: &'a str) -> KeyStream<'a> {
        // Walk from the deepest directory named by the prefix; the last
        // segment is a partial file name ("1234.ogg." -> root).
        let start_dir = match prefix.rfind('/') {
            Some(idx) => match validate_key(&prefix[..idx]) {
                Ok(dir) => self.root.join(dir),
                Err(e) => return Box::pin(futures::stream::once(async move { Err(e) })),
            },
            None => self.root.clone(),
        };
        let prefix = prefix.trim_start_matches('/');
        let mut stack = vec![start_dir];

        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    // Listing a "directory" that doesn't exist is an empty
                    // listing on S3-compatible stores; stay consistent.
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, prefix)));
                        continue 'dirs;
                    }
                };
                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, prefix))); continue 'entries; },
                    };
                    match self.process_entry(entry, prefix).await {
                        Ok(WalkEntry::Object(key)) => yield Ok(key),
                        Ok(WalkEntry::Descend(dir)) => stack.push(dir),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.absolute_path(key)?;
        Ok(fs::read(&path).await.map_err(|e| Self::map_io_error(e, key))?)
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let path = self.absolute_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, key))?;
        }
        Ok(fs::write(&path, data).await.map_err(|e| Self::map_io_error(e, key))?)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.absolute_path(key)?;
        Ok(fs::remove_file(&path).await.map_err(|e| Self::map_io_error(e, key))?)
    }

    async fn create(&self, paths: &[PathBuf]) -> Result<Vec<String>> {
        // Copy instead of read+write so large cooked files never sit in memory.
        let mut keys = Vec::with_capacity(paths.len());
        for source in paths {
            let key = key_for(source)?;
            let target = self.absolute_path(&key)?;
            fs::copy(source, &target).await.map_err(|e| Self::map_io_error(e, &key))?;
            keys.push(key);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, LocalObjectStore) {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new("local", temp_dir.path()).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalObjectStore::new("name", temp_dir.path()).is_ok());
        assert!(LocalObjectStore::new("name", "relative/path").is_err());
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (_dir, store) = store();
        store.put("1.ogg.data", b"hello".to_vec()).await.unwrap();
        assert_eq!(store.get("1.ogg.data").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_get_missing() {
        let (_dir, store) = store();
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_is_string_prefix_based() {
        let (_dir, store) = store();
        for key in ["1.ogg.data", "1.ogg.info", "12.ogg.data", "1.zip", "nested/1.ogg.data"] {
            store.put(key, b"x".to_vec()).await.unwrap();
        }
        let mut keys = store.list("1.ogg.").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["1.ogg.data", "1.ogg.info"]);
        assert_eq!(store.list("1").await.unwrap().len(), 4);
        assert_eq!(store.list("nested/").await.unwrap(), vec!["nested/1.ogg.data"]);
        assert_eq!(store.list("").await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_list_nonexistent_directory() {
        let (_dir, store) = store();
        assert!(store.list("nowhere/1.ogg.").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_many() {
        let (_dir, store) = store();
        store.put("a", b"1".to_vec()).await.unwrap();
        store.put("b", b"2".to_vec()).await.unwrap();
        let objects = store.retrieve(&["a".to_string(), "b".to_string()]).await.unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects["b"], b"2");
        assert!(store.retrieve(&["a".to_string(), "c".to_string()]).await.is_err());
    }

    #[tokio::test]
    async fn test_create_uploads_under_file_name() {
        let (_dir, store) = store();
        let scratch = tempfile::tempdir().unwrap();
        let source = scratch.path().join("42.zip");
        std::fs::write(&source, b"zipped").unwrap();
        let keys = store.create(&[source]).await.unwrap();
        assert_eq!(keys, vec!["42.zip"]);
        assert_eq!(store.get("42.zip").await.unwrap(), b"zipped");
    }

    #[tokio::test]
    async fn test_delete_reports_partial_failures() {
        let (_dir, store) = store();
        store.put("a", b"1".to_vec()).await.unwrap();
        let err = store.delete(&["a".to_string(), "missing".to_string()]).await.unwrap_err();
        match &*err {
            ErrorKind::Partial { total, failures } => {
                assert_eq!(*total, 2);
                assert_eq!(failures.len(), 1);
            },
            other => panic!("unexpected error: {other}"),
        }
        // The existing object was still removed.
        assert!(store.list("a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_key_security() {
        let (_dir, store) = store();
        assert!(store.get("../etc/passwd").await.is_err());
        assert!(store.put("../escape", b"bad".to_vec()).await.is_err());
        assert!(store.remove("a/../../b").await.is_err());
    }
}
