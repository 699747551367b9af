use crate::error::{ErrorKind, Result};
use crate::guard::{AccessGuard, ExclusiveLease};
use exn::ResultExt;
use pantry_cook::{RecordMetadata, record_files};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Records stored as segment files in a local directory.
#[derive(Clone, Debug)]
pub struct LocalRecords {
    dir: PathBuf,
    guard: AccessGuard,
}

impl LocalRecords {
    pub fn new(dir: impl Into<PathBuf>, guard: AccessGuard) -> Self {
        Self { dir: dir.into(), guard }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn guard(&self) -> &AccessGuard {
        &self.guard
    }

    /// Whether every segment file of record `id` is present. A partial set
    /// counts as absent.
    pub async fn exists(&self, id: u64) -> Result<bool> {
        for path in record_files(&self.dir, id) {
            if !fs::try_exists(&path).await.or_raise(|| ErrorKind::Local)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Remove every segment file of the record `lease` holds. Files already
    /// missing are skipped, so a record living only on the remote tier
    /// deletes cleanly.
    pub async fn remove_files(&self, lease: &ExclusiveLease) -> Result<()> {
        for path in record_files(&self.dir, lease.id()) {
            match fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "Removed segment file"),
                Err(e) if e.kind() == IoErrorKind::NotFound => {},
                Err(e) => return Err(e).or_raise(|| ErrorKind::Local),
            }
        }
        Ok(())
    }

    /// Raw content of the sidecar info file, `None` if there is none.
    pub async fn read_info(&self, id: u64) -> Result<Option<Vec<u8>>> {
        match fs::read(RecordMetadata::path(&self.dir, id)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).or_raise(|| ErrorKind::Metadata),
        }
    }
}
