//! Record access, storage tiers and transcoding jobs.
//!
//! - [`AccessGuard`] keeps records from being deleted while they are cooked.
//! - [`LocalRecords`] is the on-disk tier; [`RecordsService`] reconciles it
//!   with an optional remote [`ObjectStore`](pantry_storage::ObjectStore)
//!   and is the entry point for callers.
//! - [`start_async_transcoding_job`] drains a cooked stream to a file,
//!   reporting progress through a [`JobNotifier`](pantry_notify::JobNotifier).
//! - [`format_file_name`] names the result for download.

pub mod error;
mod filename;
mod guard;
mod job;
mod local;
mod service;

pub use crate::filename::format_file_name;
pub use crate::guard::{AccessGuard, ExclusiveLease, SharedLease};
pub use crate::job::{
    JobContext, JobOptions, JobOutcome, OutputLocation, spawn_async_transcoding_job, start_async_transcoding_job,
};
pub use crate::local::LocalRecords;
pub use crate::service::{DeleteOutcome, RecordsService, Tier};
