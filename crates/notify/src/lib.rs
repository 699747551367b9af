//! Job notifications.
//!
//! A [`Notifier`] publishes JSON payloads to named topics on some
//! publish/subscribe transport. Delivery is best-effort: the [`JobNotifier`]
//! built on top of it logs failed deliveries and never reports them to the
//! job that triggered them.

pub mod error;
mod job;
mod log;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use crate::job::{JobEvent, JobNotifier, JobProgress, Topic};
pub use crate::log::TracingNotifier;
#[cfg(any(test, feature = "mock"))]
pub use crate::mock::MockNotifier;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Publish side of a publish/subscribe transport.
///
/// Implementations must be safe for concurrent use; several jobs publish at
/// the same time and no ordering between them is assumed.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Publish `payload` to `topic`.
    ///
    /// `Ok(false)` means the transport declined the message without failing.
    async fn publish(&self, topic: &str, payload: &serde_json::Value) -> Result<bool>;
}

pub type NotifierHandle = Arc<dyn Notifier + Send + Sync>;
