//! Builds the records service and its optional collaborators from the
//! configuration.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use pantry_config::{Config, NotifierConfig, ObjectStoreConfig};
use pantry_cook::Encoder;
use pantry_notify::{NotifierHandle, TracingNotifier};
use pantry_records::{JobOptions, RecordsService};
use pantry_storage::StoreHandle;
use pantry_storage::backend::{LocalObjectStore, S3ObjectStore};
use std::sync::Arc;

pub fn build_service(config: &Config) -> Result<RecordsService> {
    let encoder = Encoder::discover(&config.cook_script, config.working_dir.clone())
        .or_raise(|| ErrorKind::Setup("the encoder"))?;
    tracing::debug!(script = %encoder.script().display(), "Encoder found");
    let mut service = RecordsService::new(&config.recordings_dir, encoder).with_job_options(job_options(config)?);
    if let Some(store) = &config.object_store {
        service = service.with_object_store(build_store(store)?);
    }
    if let Some(notifier) = config.notifier {
        service = service.with_notifier(build_notifier(notifier));
    }
    Ok(service)
}

fn job_options(config: &Config) -> Result<JobOptions> {
    Ok(JobOptions {
        progress_interval: config.jobs.progress_interval(),
        write_data_sampling_rate: config.jobs.sampling_rate().or_raise(|| ErrorKind::Config)?,
        output_dir: config.output_dir.clone(),
    })
}

pub fn build_store(config: &ObjectStoreConfig) -> Result<StoreHandle> {
    let store: StoreHandle = match config {
        ObjectStoreConfig::Local { path } => {
            Arc::new(LocalObjectStore::new("local", path).or_raise(|| ErrorKind::Setup("the object store"))?)
        },
        ObjectStoreConfig::S3 {
            bucket,
            prefix,
            region,
            endpoint,
            key_id,
            key_secret,
        } => Arc::new(
            S3ObjectStore::new("s3", bucket, prefix.clone(), region, endpoint.clone(), key_id, key_secret)
                .or_raise(|| ErrorKind::Setup("the object store"))?,
        ),
    };
    tracing::debug!(store = store.name(), "Object store configured");
    Ok(store)
}

fn build_notifier(config: NotifierConfig) -> NotifierHandle {
    match config {
        NotifierConfig::Log => Arc::new(TracingNotifier),
    }
}
