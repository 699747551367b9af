//! Asynchronous transcoding jobs.
//!
//! A job drains an already opened cooked stream into `<output_dir>/<id><extension>`,
//! reports the sampled byte count on a fixed interval, and optionally moves the
//! result to the remote tier. Every job ends with exactly one terminal event:
//! `Done` once the output is in its final place, `Error` if writing or
//! uploading failed.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use pantry_asyncutils::{DEFAULT_SAMPLING_RATE, Sampled};
use pantry_cook::{CookingOptions, file_metadata_for};
use pantry_notify::{JobEvent, JobNotifier};
use pantry_storage::StoreHandle;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

/// Shortest progress interval honoured; shorter ones are raised to it.
const MIN_PROGRESS_INTERVAL: Duration = Duration::from_millis(10);

/// Tunables of a single job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobOptions {
    /// How often the written byte count is published. Never more often than
    /// every 10ms.
    pub progress_interval: Duration,
    /// Refresh the byte count visible to the progress timer once every this
    /// many chunks.
    pub write_data_sampling_rate: NonZeroU64,
    /// Directory the cooked file is written to.
    pub output_dir: PathBuf,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            progress_interval: Duration::from_millis(2000),
            write_data_sampling_rate: DEFAULT_SAMPLING_RATE,
            output_dir: std::env::temp_dir(),
        }
    }
}

/// Optional collaborators of a job.
#[derive(Clone, Default)]
pub struct JobContext {
    /// Upload the cooked file here, then remove the local copy.
    pub store: Option<StoreHandle>,
    pub notifier: Option<JobNotifier>,
}

/// Where the cooked file ended up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputLocation {
    Local(PathBuf),
    /// Object key on the remote tier.
    Remote(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobOutcome {
    pub bytes_written: u64,
    pub location: OutputLocation,
}

/// Run a transcoding job to completion.
///
/// Failures are published as a `cookingError` event and returned. A failed
/// write leaves no file behind; a failed upload keeps the local file.
#[instrument(skip_all, fields(record = id, job_id = job_id.as_deref()))]
pub async fn start_async_transcoding_job<R>(
    input: R,
    id: u64,
    job_id: Option<String>,
    options: &CookingOptions,
    job_options: &JobOptions,
    context: &JobContext,
) -> Result<JobOutcome>
where
    R: AsyncRead + Unpin + Send,
{
    let metadata = file_metadata_for(options);
    let path = job_options.output_dir.join(format!("{id}{}", metadata.extension));
    let event = JobEvent::new(id, job_id);
    let outcome = run(input, &path, &event, job_options, context).await;
    if let Some(notifier) = &context.notifier {
        match &outcome {
            Ok(_) => notifier.done(&event).await,
            Err(_) => notifier.error(&event).await,
        };
    }
    outcome
}

/// Run a transcoding job in the background.
///
/// The job logs its own failure; awaiting the handle is only needed to learn
/// the outcome.
pub fn spawn_async_transcoding_job<R>(
    input: R,
    id: u64,
    job_id: Option<String>,
    options: CookingOptions,
    job_options: JobOptions,
    context: JobContext,
) -> JoinHandle<Result<JobOutcome>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let span = info_span!("job", record = id);
    tokio::spawn(
        async move {
            let outcome = start_async_transcoding_job(input, id, job_id, &options, &job_options, &context).await;
            if let Err(e) = &outcome {
                error!(error = ?e, "Transcoding job failed");
            }
            outcome
        }
        .instrument(span),
    )
}

async fn run<R>(
    input: R,
    path: &Path,
    event: &JobEvent,
    job_options: &JobOptions,
    context: &JobContext,
) -> Result<JobOutcome>
where
    R: AsyncRead + Unpin + Send,
{
    let bytes_written = match write(input, path, event, job_options, context.notifier.as_ref()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            if let Err(remove) = fs::remove_file(path).await {
                debug!(path = %path.display(), error = %remove, "No partial output to remove");
            }
            return Err(e);
        },
    };
    info!(path = %path.display(), bytes = bytes_written, "Cooked output written");

    let Some(store) = &context.store else {
        return Ok(JobOutcome {
            bytes_written,
            location: OutputLocation::Local(path.to_path_buf()),
        });
    };
    let keys = store.create(&[path.to_path_buf()]).await.or_raise(|| ErrorKind::Upload)?;
    let key = keys.into_iter().next().ok_or_else(|| exn::Exn::from(ErrorKind::Upload))?;
    info!(store = store.name(), key = %key, "Cooked output uploaded");
    if let Err(e) = fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Could not remove uploaded output");
    }
    Ok(JobOutcome {
        bytes_written,
        location: OutputLocation::Remote(key),
    })
}

/// Copy `input` to `path`, publishing the sampled byte count on every tick
/// of the progress timer. The timer lives in this function only, so it is
/// gone on every way out of it.
async fn write<R>(
    input: R,
    path: &Path,
    event: &JobEvent,
    job_options: &JobOptions,
    notifier: Option<&JobNotifier>,
) -> Result<u64>
where
    R: AsyncRead + Unpin + Send,
{
    let mut reader = Sampled::new(input, job_options.write_data_sampling_rate);
    let progress = reader.progress();
    let mut file = File::create(path).await.or_raise(|| ErrorKind::Write)?;

    let interval = job_options.progress_interval.max(MIN_PROGRESS_INTERVAL);
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let copied = {
        let copy = tokio::io::copy(&mut reader, &mut file);
        tokio::pin!(copy);
        loop {
            tokio::select! {
                biased;
                copied = &mut copy => break copied,
                _ = ticker.tick(), if notifier.is_some() => {
                    if let Some(notifier) = notifier {
                        notifier.progress(&event.progress(progress.get())).await;
                    }
                },
            }
        }
    };
    let bytes = copied.or_raise(|| ErrorKind::Write)?;
    file.flush().await.or_raise(|| ErrorKind::Write)?;
    debug!(bytes, chunks = reader.chunks(), "Input drained");
    Ok(bytes)
}
