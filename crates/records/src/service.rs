//! Caller-facing record operations.
//!
//! [`RecordsService`] reconciles the local record directory with the optional
//! remote tier, hands out cooked streams while holding the record shared, and
//! runs transcoding jobs with the collaborators it was built with.

use crate::error::{ErrorKind, Result};
use crate::guard::AccessGuard;
use crate::job::{self, JobContext, JobOptions, JobOutcome};
use crate::local::LocalRecords;
use exn::ResultExt;
use futures::StreamExt;
use pantry_cook::{CookedStream, CookingOptions, Encoder, FileMetadata, RecordMetadata, file_metadata_for, remote_prefix};
use pantry_notify::{JobNotifier, NotifierHandle};
use pantry_storage::StoreHandle;
use pantry_storage::error::Result as StorageResult;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncRead;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Tiers a record is present on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    Local,
    Remote,
    Both,
    None,
}

impl Tier {
    fn from_presence(local: bool, remote: bool) -> Self {
        match (local, remote) {
            (true, true) => Tier::Both,
            (true, false) => Tier::Local,
            (false, true) => Tier::Remote,
            (false, false) => Tier::None,
        }
    }
}

/// What [`RecordsService::delete_detailed`] managed to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Someone is reading the record; nothing was touched.
    InUse,
    /// Gone from every configured tier.
    Deleted,
    /// The local files are gone but the remote objects may not be.
    DeletedLocalOnly { remote_error: String },
}

impl DeleteOutcome {
    pub fn is_deleted(&self) -> bool {
        !matches!(self, DeleteOutcome::InUse)
    }
}

pub struct RecordsService {
    local: LocalRecords,
    encoder: Encoder,
    store: Option<StoreHandle>,
    notifier: Option<JobNotifier>,
    job_options: JobOptions,
}

impl RecordsService {
    pub fn new(recordings_dir: impl Into<PathBuf>, encoder: Encoder) -> Self {
        Self {
            local: LocalRecords::new(recordings_dir, AccessGuard::new()),
            encoder,
            store: None,
            notifier: None,
            job_options: JobOptions::default(),
        }
    }

    #[must_use]
    pub fn with_object_store(mut self, store: StoreHandle) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: NotifierHandle) -> Self {
        self.notifier = Some(JobNotifier::new(notifier));
        self
    }

    #[must_use]
    pub fn with_job_options(mut self, job_options: JobOptions) -> Self {
        self.job_options = job_options;
        self
    }

    pub fn guard(&self) -> &AccessGuard {
        self.local.guard()
    }

    pub fn local(&self) -> &LocalRecords {
        &self.local
    }

    pub fn job_options(&self) -> &JobOptions {
        &self.job_options
    }

    /// Whether record `id` is present on any tier.
    pub async fn exists(&self, id: u64) -> Result<bool> {
        Ok(self.exists_locally(id).await? || self.exists_remotely(id).await?)
    }

    pub async fn exists_locally(&self, id: u64) -> Result<bool> {
        self.local.exists(id).await
    }

    /// Whether the remote tier holds at least one object of record `id`.
    /// Always `false` without a remote tier.
    pub async fn exists_remotely(&self, id: u64) -> Result<bool> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        let prefix = remote_prefix(id);
        let mut keys = store.list_stream(&prefix);
        match keys.next().await {
            None => Ok(false),
            Some(Ok(_)) => Ok(true),
            Some(Err(e)) => Err(e).or_raise(|| ErrorKind::Storage),
        }
    }

    pub async fn tier(&self, id: u64) -> Result<Tier> {
        let local = self.exists_locally(id).await?;
        let remote = self.exists_remotely(id).await?;
        Ok(Tier::from_presence(local, remote))
    }

    /// Start cooking record `id`.
    ///
    /// A record missing locally is first downloaded from the remote tier, if
    /// there is one. The record is held shared until the returned stream
    /// ends, fails or is dropped, so it can't be deleted in the meantime.
    #[instrument(skip_all, fields(record = id, format = %options.format, container = %options.container))]
    pub async fn stream(&self, id: u64, options: &CookingOptions) -> Result<CookedStream> {
        options.validate().map_err(ErrorKind::options_invalid)?;
        let lease = self.guard().acquire_shared(id).await;
        if self.store.is_some() {
            // Checked under the fetch lock: a download in progress already
            // shows some of the files.
            let _fetching = lease.lock_fetch().await;
            if !self.local.exists(id).await? {
                info!("Record missing locally, downloading");
                self.download_from_remote(id, self.local.dir()).await?;
            }
        }
        let stream = self.encoder.cook(id, options).or_raise(|| ErrorKind::Encoder)?;
        Ok(stream.with_guard(lease))
    }

    /// Delete record `id` from every tier.
    ///
    /// Returns `false` if the record is in use. Once the local files are gone
    /// this returns `true` even if the remote objects could not be removed;
    /// use [`delete_detailed()`](Self::delete_detailed) to tell these apart.
    pub async fn delete(&self, id: u64) -> Result<bool> {
        Ok(self.delete_detailed(id).await?.is_deleted())
    }

    #[instrument(skip_all, fields(record = id))]
    pub async fn delete_detailed(&self, id: u64) -> Result<DeleteOutcome> {
        let Some(lease) = self.guard().try_acquire_exclusive(id) else {
            debug!("Record in use, not deleting");
            return Ok(DeleteOutcome::InUse);
        };
        self.local.remove_files(&lease).await?;
        let Some(store) = &self.store else {
            return Ok(DeleteOutcome::Deleted);
        };
        let outcome = match delete_remote(store, id).await {
            Ok(()) => DeleteOutcome::Deleted,
            Err(e) => {
                warn!(store = store.name(), error = ?e, "Remote objects not deleted");
                DeleteOutcome::DeletedLocalOnly {
                    remote_error: (*e).to_string(),
                }
            },
        };
        lease.release();
        Ok(outcome)
    }

    /// Fetch every remote object of record `id` into `target_dir`.
    ///
    /// All objects are attempted; if some can't be written the error lists
    /// every failure, and the files that were written stay in place.
    #[instrument(skip_all, fields(record = id))]
    pub async fn download_from_remote(&self, id: u64, target_dir: &Path) -> Result<Vec<PathBuf>> {
        let Some(store) = &self.store else {
            exn::bail!(ErrorKind::RemoteStoreMissing);
        };
        let keys = store.list(&remote_prefix(id)).await.or_raise(|| ErrorKind::Storage)?;
        if keys.is_empty() {
            exn::bail!(ErrorKind::RemoteRecordMissing(id));
        }
        let objects = store.retrieve(&keys).await.or_raise(|| ErrorKind::Storage)?;
        let writes = objects.into_iter().map(|(key, data)| async move {
            let path = target_dir.join(&key);
            match fs::write(&path, data).await {
                Ok(()) => Ok(path),
                Err(e) => Err(format!("{key}: {e}")),
            }
        });
        let (mut written, mut failures) = (Vec::new(), Vec::new());
        for result in futures::future::join_all(writes).await {
            match result {
                Ok(path) => written.push(path),
                Err(failure) => failures.push(failure),
            }
        }
        if !failures.is_empty() {
            failures.sort();
            exn::bail!(ErrorKind::Download { id, failures });
        }
        written.sort();
        debug!(store = store.name(), files = written.len(), "Record downloaded");
        Ok(written)
    }

    /// Extension and MIME type of what cooking with `options` produces.
    pub fn get_metadata(&self, options: &CookingOptions) -> FileMetadata {
        file_metadata_for(options)
    }

    /// Parse the sidecar info file of record `id`, from the remote tier if it
    /// isn't available locally.
    pub async fn get_record_metadata(&self, id: u64) -> Result<RecordMetadata> {
        let data = match self.local.read_info(id).await? {
            Some(data) => data,
            None => match &self.store {
                Some(store) => {
                    let key = format!("{}info", remote_prefix(id));
                    store.get(&key).await.or_raise(|| ErrorKind::Metadata)?
                },
                None => exn::bail!(ErrorKind::Metadata),
            },
        };
        RecordMetadata::from_json(&data).or_raise(|| ErrorKind::Metadata)
    }

    fn job_context(&self) -> JobContext {
        JobContext {
            store: self.store.clone(),
            notifier: self.notifier.clone(),
        }
    }

    /// Run a transcoding job over an already opened stream and wait for it.
    ///
    /// `job_options` overrides the options the service was built with.
    pub async fn start_job<R>(
        &self,
        input: R,
        id: u64,
        job_id: Option<String>,
        options: &CookingOptions,
        job_options: Option<&JobOptions>,
    ) -> Result<JobOutcome>
    where
        R: AsyncRead + Unpin + Send,
    {
        let job_options = job_options.unwrap_or(&self.job_options);
        job::start_async_transcoding_job(input, id, job_id, options, job_options, &self.job_context()).await
    }

    /// Run a transcoding job in the background.
    pub fn spawn_job<R>(
        &self,
        input: R,
        id: u64,
        job_id: Option<String>,
        options: &CookingOptions,
        job_options: Option<JobOptions>,
    ) -> JoinHandle<Result<JobOutcome>>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let job_options = job_options.unwrap_or_else(|| self.job_options.clone());
        job::spawn_async_transcoding_job(input, id, job_id, *options, job_options, self.job_context())
    }

    /// Cook several records in the background.
    ///
    /// Nothing starts unless every record exists and every stream could be
    /// opened. Duplicate ids are cooked once.
    #[instrument(skip_all, fields(ids = ?ids, job_id = job_id.as_deref()))]
    pub async fn submit_batch(
        &self,
        ids: &[u64],
        options: &CookingOptions,
        job_id: Option<String>,
    ) -> Result<Vec<JoinHandle<Result<JobOutcome>>>> {
        options.validate().map_err(ErrorKind::options_invalid)?;
        let mut seen = HashSet::new();
        let ids: Vec<u64> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let mut missing = Vec::new();
        for &id in &ids {
            if !self.exists(id).await? {
                missing.push(id);
            }
        }
        if !missing.is_empty() {
            exn::bail!(ErrorKind::NotFound(missing));
        }

        let mut streams = Vec::with_capacity(ids.len());
        for id in ids {
            streams.push(self.stream(id, options).await?);
        }
        info!(jobs = streams.len(), "Starting transcoding jobs");
        Ok(streams
            .into_iter()
            .map(|stream| {
                let id = stream.id();
                self.spawn_job(stream, id, job_id.clone(), options, None)
            })
            .collect())
    }
}

/// Remove every remote object of record `id`.
async fn delete_remote(store: &StoreHandle, id: u64) -> StorageResult<()> {
    let keys = store.list(&remote_prefix(id)).await?;
    if keys.is_empty() {
        return Ok(());
    }
    store.delete(&keys).await?;
    debug!(store = store.name(), objects = keys.len(), "Remote objects deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::tests::write_record;
    use pantry_cook::{Container, Format, SUFFIXES};
    use pantry_notify::MockNotifier;
    use pantry_storage::backend::{MockObjectStore, Operation};
    use rstest::rstest;
    use std::sync::Arc;

    fn remote_record(id: u64) -> Vec<(String, Vec<u8>)> {
        SUFFIXES.iter().map(|suffix| (format!("{id}{suffix}"), suffix.as_bytes().to_vec())).collect()
    }

    fn service(dir: &Path, store: Option<Arc<MockObjectStore>>) -> RecordsService {
        let service = RecordsService::new(dir, Encoder::new("/nonexistent/cook.sh", dir));
        match store {
            Some(store) => service.with_object_store(store),
            None => service,
        }
    }

    #[rstest]
    #[case(false, false, false, Tier::None)]
    #[case(true, false, false, Tier::Local)]
    #[case(false, true, true, Tier::Remote)]
    #[case(true, true, true, Tier::Both)]
    #[case(false, true, false, Tier::None)]
    #[tokio::test]
    async fn test_existence(#[case] local: bool, #[case] remote: bool, #[case] with_store: bool, #[case] tier: Tier) {
        let dir = tempfile::tempdir().unwrap();
        if local {
            write_record(dir.path(), 1);
        }
        let objects = if remote { remote_record(1) } else { Vec::new() };
        // Record 12 must never count as record 1.
        let objects = objects.into_iter().chain(remote_record(12));
        let store = with_store.then(|| Arc::new(MockObjectStore::with_objects(objects)));
        let service = service(dir.path(), store);

        assert_eq!(service.tier(1).await.unwrap(), tier);
        let expected = service.exists_locally(1).await.unwrap() || service.exists_remotely(1).await.unwrap();
        assert_eq!(service.exists(1).await.unwrap(), expected);
        assert_eq!(expected, tier != Tier::None);
    }

    #[tokio::test]
    async fn test_remote_listing_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MockObjectStore::default().failing(Operation::List));
        let err = service(dir.path(), Some(store)).exists(1).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Storage));
        assert!(err.is_record_error());
    }

    #[tokio::test]
    async fn test_delete_both_tiers() {
        let dir = tempfile::tempdir().unwrap();
        write_record(dir.path(), 1);
        let store = Arc::new(MockObjectStore::with_objects(remote_record(1).into_iter().chain(remote_record(12))));
        let service = service(dir.path(), Some(store.clone()));

        assert_eq!(service.delete_detailed(1).await.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(service.tier(1).await.unwrap(), Tier::None);
        assert_eq!(store.keys().await.len(), SUFFIXES.len());
        assert_eq!(service.guard().active(), 0);
    }

    #[tokio::test]
    async fn test_delete_refused_while_streaming() {
        let dir = tempfile::tempdir().unwrap();
        write_record(dir.path(), 1);
        let store = Arc::new(MockObjectStore::with_objects(remote_record(1)));
        let service = service(dir.path(), Some(store.clone()));

        let reading = service.guard().acquire_shared(1).await;
        assert!(!service.delete(1).await.unwrap());
        assert_eq!(service.delete_detailed(1).await.unwrap(), DeleteOutcome::InUse);
        assert!(service.exists_locally(1).await.unwrap());
        assert_eq!(store.keys().await.len(), SUFFIXES.len());

        drop(reading);
        assert!(service.delete(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_remote_delete_failure_is_reported_separately() {
        let dir = tempfile::tempdir().unwrap();
        write_record(dir.path(), 1);
        let store = Arc::new(MockObjectStore::with_objects(remote_record(1)).failing(Operation::Remove));
        let service = service(dir.path(), Some(store));

        match service.delete_detailed(1).await.unwrap() {
            DeleteOutcome::DeletedLocalOnly { remote_error } => assert!(!remote_error.is_empty()),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!service.exists_locally(1).await.unwrap());
        // Still true through the boolean form.
        write_record(dir.path(), 1);
        assert!(service.delete(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_remote_only_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MockObjectStore::with_objects(remote_record(1)));
        let service = service(dir.path(), Some(store.clone()));
        assert!(service.delete(1).await.unwrap());
        assert!(store.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_download() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MockObjectStore::with_objects(remote_record(1).into_iter().chain(remote_record(12))));
        let service = service(dir.path(), Some(store));

        let written = service.download_from_remote(1, dir.path()).await.unwrap();
        assert_eq!(written.len(), SUFFIXES.len());
        assert!(service.exists_locally(1).await.unwrap());
        assert!(!service.exists_locally(12).await.unwrap());
        assert_eq!(std::fs::read(dir.path().join("1.ogg.users")).unwrap(), b".ogg.users");
    }

    #[tokio::test]
    async fn test_download_without_store_or_record() {
        let dir = tempfile::tempdir().unwrap();
        let err = service(dir.path(), None).download_from_remote(1, dir.path()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::RemoteStoreMissing));

        let store = Arc::new(MockObjectStore::with_objects(remote_record(12)));
        let err = service(dir.path(), Some(store)).download_from_remote(1, dir.path()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::RemoteRecordMissing(1)));
        assert!(err.is_record_error());
    }

    #[tokio::test]
    async fn test_partial_download_keeps_written_files() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where a segment file should go makes that write fail.
        std::fs::create_dir(dir.path().join("1.ogg.data")).unwrap();
        let store = Arc::new(MockObjectStore::with_objects(remote_record(1)));
        let service = service(dir.path(), Some(store));

        let err = service.download_from_remote(1, dir.path()).await.unwrap_err();
        match &*err {
            ErrorKind::Download { id, failures } => {
                assert_eq!(*id, 1);
                assert_eq!(failures.len(), 1);
                assert!(failures[0].starts_with("1.ogg.data"));
            },
            other => panic!("unexpected error: {other}"),
        }
        assert!(dir.path().join("1.ogg.header1").is_file());
    }

    #[tokio::test]
    async fn test_record_metadata() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.ogg.info"), br#"{"channel": "local", "startTime": 1700000000000}"#).unwrap();
        let store = Arc::new(MockObjectStore::with_objects([
            ("2.ogg.info", br#"{"channel": "remote"}"#.to_vec()),
            ("3.ogg.info", b"not json".to_vec()),
        ]));
        let service = service(dir.path(), Some(store));

        let local = service.get_record_metadata(1).await.unwrap();
        assert_eq!(local.channel.as_deref(), Some("local"));
        assert_eq!(local.start_time.as_deref(), Some("1700000000000"));
        let remote = service.get_record_metadata(2).await.unwrap();
        assert_eq!(remote.channel.as_deref(), Some("remote"));
        for id in [3, 4] {
            let err = service.get_record_metadata(id).await.unwrap_err();
            assert!(matches!(&*err, ErrorKind::Metadata));
        }
    }

    #[tokio::test]
    async fn test_record_metadata_without_store() {
        let dir = tempfile::tempdir().unwrap();
        let err = service(dir.path(), None).get_record_metadata(1).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Metadata));
    }

    #[test]
    fn test_get_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), None);
        let zip = service.get_metadata(&CookingOptions::new(Format::Flac, Container::Zip));
        assert_eq!((zip.extension, zip.mime), (".zip", "application/zip"));
        let mix = service.get_metadata(&CookingOptions::new(Format::Opus, Container::Mix));
        assert_eq!((mix.extension, mix.mime), (".ogg", "audio/ogg"));
    }

    #[tokio::test]
    async fn test_invalid_options_touch_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MockObjectStore::with_objects(remote_record(1)));
        let service = service(dir.path(), Some(store));

        let err = service.stream(1, &CookingOptions::new(Format::Mp3, Container::Ogg)).await.unwrap_err();
        match &*err {
            ErrorKind::OptionsInvalid(reason) => assert!(reason.contains("mp3")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!err.is_record_error());
        assert!(!service.exists_locally(1).await.unwrap());
        assert_eq!(service.guard().active(), 0);

        let err = service.submit_batch(&[1], &CookingOptions::new(Format::Copy, Container::Mix), None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::OptionsInvalid(_)));
    }

    #[tokio::test]
    async fn test_batch_with_missing_records() {
        let dir = tempfile::tempdir().unwrap();
        write_record(dir.path(), 1);
        let service = service(dir.path(), None);
        let err = service.submit_batch(&[1, 5, 1, 6], &CookingOptions::default(), None).await.unwrap_err();
        match &*err {
            ErrorKind::NotFound(ids) => assert_eq!(ids, &[5, 6]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    mod encoding {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;
        use tokio::io::AsyncReadExt;

        /// Encoder emitting the record's data file, after `delay` seconds.
        fn encoder(dir: &Path, records: &Path, delay: &str) -> Encoder {
            let path = dir.join("cook.sh");
            std::fs::write(&path, format!("#!/bin/sh\nsleep {delay}\ncat \"$1.ogg.data\"\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            Encoder::new(path, records)
        }

        #[tokio::test]
        async fn test_stream_downloads_remote_record_and_holds_it() {
            let scripts = tempfile::tempdir().unwrap();
            let records = tempfile::tempdir().unwrap();
            let store = Arc::new(MockObjectStore::with_objects(remote_record(1)));
            let service = RecordsService::new(records.path(), encoder(scripts.path(), records.path(), "0"))
                .with_object_store(store);

            let mut stream = service.stream(1, &CookingOptions::default()).await.unwrap();
            assert!(service.exists_locally(1).await.unwrap());
            assert!(!service.delete(1).await.unwrap());

            let mut out = Vec::new();
            stream.read_to_end(&mut out).await.unwrap();
            assert_eq!(out, b".ogg.data");
            drop(stream);
            assert!(service.delete(1).await.unwrap());
            assert_eq!(service.tier(1).await.unwrap(), Tier::None);
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn test_concurrent_streams_download_once() {
            let scripts = tempfile::tempdir().unwrap();
            let records = tempfile::tempdir().unwrap();
            let store = Arc::new(MockObjectStore::with_objects(remote_record(1)));
            let service = RecordsService::new(records.path(), encoder(scripts.path(), records.path(), "0"))
                .with_object_store(store.clone());

            let options = CookingOptions::default();
            let (first, second) = tokio::join!(service.stream(1, &options), service.stream(1, &options));
            assert_eq!(store.calls(Operation::Get), SUFFIXES.len());
            for mut stream in [first.unwrap(), second.unwrap()] {
                let mut out = Vec::new();
                stream.read_to_end(&mut out).await.unwrap();
                assert_eq!(out, b".ogg.data");
            }
            assert_eq!(service.guard().active(), 0);
        }

        #[tokio::test]
        async fn test_dropped_stream_releases_record() {
            let scripts = tempfile::tempdir().unwrap();
            let records = tempfile::tempdir().unwrap();
            write_record(records.path(), 1);
            let service = RecordsService::new(records.path(), encoder(scripts.path(), records.path(), "30"));

            let stream = service.stream(1, &CookingOptions::default()).await.unwrap();
            assert!(!service.delete(1).await.unwrap());
            drop(stream);
            assert!(service.delete(1).await.unwrap());
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn test_batch_runs_one_job_per_record() {
            let scripts = tempfile::tempdir().unwrap();
            let records = tempfile::tempdir().unwrap();
            let output = tempfile::tempdir().unwrap();
            write_record(records.path(), 1);
            write_record(records.path(), 2);
            let notifier = Arc::new(MockNotifier::default());
            let service = RecordsService::new(records.path(), encoder(scripts.path(), records.path(), "0"))
                .with_notifier(notifier.clone())
                .with_job_options(JobOptions {
                    progress_interval: Duration::from_millis(50),
                    output_dir: output.path().to_path_buf(),
                    ..JobOptions::default()
                });

            let options = CookingOptions::new(Format::Flac, Container::Zip);
            let handles = service.submit_batch(&[1, 2, 1], &options, Some("batch".to_string())).await.unwrap();
            assert_eq!(handles.len(), 2);
            for handle in handles {
                handle.await.unwrap().unwrap();
            }
            assert_eq!(notifier.count("cookingDone").await, 2);
            assert_eq!(notifier.count("cookingError").await, 0);
            assert_eq!(std::fs::read(output.path().join("1.zip")).unwrap(), b".ogg.data");
            assert!(output.path().join("2.zip").is_file());
            // Every lease went with its finished stream.
            assert_eq!(service.guard().active(), 0);
        }
    }
}
