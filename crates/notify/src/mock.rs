//! In-memory notifier for testing.

use crate::Notifier;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Behaviour {
    #[default]
    Deliver,
    Reject,
    Fail,
}

/// Records every published event, in publication order.
///
/// Events are recorded whatever the configured behaviour, so tests can count
/// attempts even when delivery fails.
#[derive(Debug, Default)]
pub struct MockNotifier {
    events: Mutex<Vec<(String, Value)>>,
    behaviour: Behaviour,
}

impl MockNotifier {
    /// Every publish returns `Ok(false)`.
    pub fn rejecting() -> Self {
        Self {
            behaviour: Behaviour::Reject,
            ..Self::default()
        }
    }

    /// Every publish fails with a transport error.
    pub fn failing() -> Self {
        Self {
            behaviour: Behaviour::Fail,
            ..Self::default()
        }
    }

    pub async fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().await.clone()
    }

    /// Number of events published to `topic`.
    pub async fn count(&self, topic: &str) -> usize {
        self.events.lock().await.iter().filter(|(t, _)| t == topic).count()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn publish(&self, topic: &str, payload: &Value) -> Result<bool> {
        self.events.lock().await.push((topic.to_string(), payload.clone()));
        match self.behaviour {
            Behaviour::Deliver => Ok(true),
            Behaviour::Reject => Ok(false),
            Behaviour::Fail => exn::bail!(ErrorKind::Transport(format!("injected failure on {topic}"))),
        }
    }
}
