use crate::NotifierHandle;
use crate::error::{ErrorKind, Result};
use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::{debug, warn};

/// Topics a transcoding job reports on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    Progress,
    Done,
    Error,
}

impl Topic {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Progress => "cookingProgress",
            Topic::Done => "cookingDone",
            Topic::Error => "cookingError",
        }
    }
}

impl Display for Topic {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Payload of the terminal `Done`/`Error` events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    /// Record id, as a string.
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl JobEvent {
    pub fn new(id: u64, job_id: Option<String>) -> Self {
        Self {
            id: id.to_string(),
            job_id,
        }
    }

    pub fn progress(&self, total_bytes: u64) -> JobProgress {
        JobProgress {
            id: self.id.clone(),
            job_id: self.job_id.clone(),
            total_bytes,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Bytes written so far, as last sampled.
    pub total_bytes: u64,
}

/// Publishes job events, logging and swallowing every delivery failure.
#[derive(Clone)]
pub struct JobNotifier {
    publisher: NotifierHandle,
}

impl JobNotifier {
    pub fn new(publisher: NotifierHandle) -> Self {
        Self { publisher }
    }

    /// Returns whether the event was delivered.
    pub async fn progress(&self, payload: &JobProgress) -> bool {
        self.send(Topic::Progress, payload).await
    }

    pub async fn done(&self, payload: &JobEvent) -> bool {
        self.send(Topic::Done, payload).await
    }

    pub async fn error(&self, payload: &JobEvent) -> bool {
        self.send(Topic::Error, payload).await
    }

    async fn send<T: Serialize>(&self, topic: Topic, payload: &T) -> bool {
        match self.publish(topic, payload).await {
            Ok(true) => {
                debug!(%topic, "Published job event");
                true
            },
            Ok(false) => {
                warn!(%topic, "Job event was not accepted by the transport");
                false
            },
            Err(e) => {
                warn!(%topic, error = ?e, "Error while publishing job event");
                false
            },
        }
    }

    async fn publish<T: Serialize>(&self, topic: Topic, payload: &T) -> Result<bool> {
        let value = serde_json::to_value(payload).map_err(|source| ErrorKind::Encode {
            topic: topic.to_string(),
            source,
        })?;
        self.publisher.publish(topic.as_str(), &value).await
    }
}
