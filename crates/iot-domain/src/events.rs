//! Subscriber side of the external event reactions: thing-removed,
//! group-removed, and profile-updated events ride the same
//! `Publisher`/broadcast-channel transport used for outbound publishing.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::Result;
use crate::publisher::PublishedMessage;

pub const EVENT_SUBJECT: &str = "platform.events";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlatformEvent {
    ThingRemove { thing_id: Uuid },
    GroupRemove { group_id: Uuid },
    ProfileUpdate { profile_id: Uuid },
}

/// Implemented by each adapter's domain service; lets the event loop below
/// dispatch cascades without depending on either adapter crate directly.
#[async_trait]
pub trait EventReactor: Send + Sync {
    async fn remove_by_thing(&self, thing_id: Uuid) -> Result<()>;
    async fn remove_by_group(&self, group_id: Uuid) -> Result<()>;
    async fn reschedule(&self, profile_id: Uuid) -> Result<()>;
}

/// Drains `rx` for messages on [`EVENT_SUBJECT`] and dispatches each to
/// `reactor`. Every event is handled independently: a reactor error is
/// logged and does not stop the loop, matching the spec's "errors surface
/// to the event framework, which is responsible for retry".
pub async fn run(mut rx: broadcast::Receiver<PublishedMessage>, reactor: Arc<dyn EventReactor>) {
    loop {
        let msg = match rx.recv().await {
            Ok(msg) => msg,
            Err(broadcast::error::RecvError::Closed) => return,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event handler lagged, dropped messages");
                continue;
            }
        };
        if msg.subject != EVENT_SUBJECT {
            continue;
        }
        let event: PlatformEvent = match serde_json::from_value(msg.message) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "malformed platform event");
                continue;
            }
        };
        let outcome = match event {
            PlatformEvent::ThingRemove { thing_id } => reactor.remove_by_thing(thing_id).await,
            PlatformEvent::GroupRemove { group_id } => reactor.remove_by_group(group_id).await,
            PlatformEvent::ProfileUpdate { profile_id } => reactor.reschedule(profile_id).await,
        };
        if let Err(e) = outcome {
            tracing::warn!(error = %e, "event reaction failed");
        }
    }
}
