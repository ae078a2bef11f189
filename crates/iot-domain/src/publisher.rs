use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::capability::Publisher;
use crate::error::Result;

#[derive(Clone, Debug)]
pub struct PublishedMessage {
    pub subject: String,
    pub message: serde_json::Value,
}

/// Process-local stand-in for the platform message bus: fans out to a
/// bounded broadcast channel (for test probes and the event handler) and a
/// structured log line.
pub struct LocalPublisher {
    tx: broadcast::Sender<PublishedMessage>,
}

impl LocalPublisher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedMessage> {
        self.tx.subscribe()
    }
}

impl Default for LocalPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for LocalPublisher {
    async fn publish(&self, subject: &str, message: serde_json::Value) -> Result<()> {
        tracing::info!(subject, "publish");
        let _ = self.tx.send(PublishedMessage {
            subject: subject.to_string(),
            message,
        });
        Ok(())
    }
}
