// EventBus contract — fire-and-forget, at-least-once publish of domain
// events to whatever indexing/search-refresh/audit sinks have subscribed.
// Ordering within a single conversation or repository is preserved
// best-effort; no ordering guarantee holds across different ids.

use crate::error::Result;
use crate::types::{ConversationId, RepositoryId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DomainEvent {
    RepositoryAdded {
        repository_id: RepositoryId,
    },
    RepositoryAnalysisStarted {
        repository_id: RepositoryId,
    },
    RepositoryAnalysisCompleted {
        repository_id: RepositoryId,
        documents_indexed: usize,
    },
    RepositoryAnalysisFailed {
        repository_id: RepositoryId,
        reason: String,
    },
    DocumentationGenerationStarted {
        repository_id: RepositoryId,
    },
    DocumentationGenerationCompleted {
        repository_id: RepositoryId,
    },
    DocumentationGenerationFailed {
        repository_id: RepositoryId,
        reason: String,
    },
    ConversationStarted {
        conversation_id: ConversationId,
    },
    QueryProcessed {
        conversation_id: ConversationId,
        confidence: f32,
    },
    QueryProcessingFailed {
        conversation_id: ConversationId,
        reason: String,
    },
}

/// Publishes domain events. Implementations never block a caller on slow
/// or absent subscribers — a full channel drops the oldest events rather
/// than back-pressuring the publisher.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: DomainEvent) -> Result<()>;
}

/// In-process pub/sub over a broadcast channel. `subscribe` can be called
/// any number of times; each subscriber gets its own lagging-tolerant
/// receiver.
pub struct InProcessEventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl InProcessEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

impl Default for InProcessEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventBus for InProcessEventBus {
    async fn publish(&self, event: DomainEvent) -> Result<()> {
        // No subscribers is not an error: publish is fire-and-forget.
        let _ = self.sender.send(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = InProcessEventBus::default();
        let mut receiver = bus.subscribe();
        let repository_id = RepositoryId::new();

        bus.publish(DomainEvent::RepositoryAdded { repository_id }).await.unwrap();

        let event = receiver.recv().await.unwrap();
        assert_eq!(event, DomainEvent::RepositoryAdded { repository_id });
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_error() {
        let bus = InProcessEventBus::default();
        bus.publish(DomainEvent::ConversationStarted {
            conversation_id: ConversationId::new(),
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive_the_event() {
        let bus = InProcessEventBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        let repository_id = RepositoryId::new();

        bus.publish(DomainEvent::RepositoryAnalysisStarted { repository_id })
            .await
            .unwrap();

        assert_eq!(a.recv().await.unwrap(), DomainEvent::RepositoryAnalysisStarted { repository_id });
        assert_eq!(b.recv().await.unwrap(), DomainEvent::RepositoryAnalysisStarted { repository_id });
    }
}
