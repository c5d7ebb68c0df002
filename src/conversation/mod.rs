// Conversation aggregate and ConversationStore — per-user conversational
// history over one or more indexed repositories.

use crate::error::{ArchieError, Result};
use crate::types::{ConversationId, MessageId, NonEmptyText, RepositoryId, TimestampPair, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub role: MessageRole,
    pub text: NonEmptyText,
    pub citations: Vec<String>,
    pub attachments: Vec<String>,
    pub parent_message_id: Option<MessageId>,
    pub timestamp: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

impl ConversationMessage {
    pub fn user(
        conversation_id: ConversationId,
        text: impl Into<String>,
        parent_message_id: Option<MessageId>,
    ) -> Result<Self> {
        Ok(Self {
            id: MessageId::new(),
            conversation_id,
            role: MessageRole::User,
            text: NonEmptyText::new(text)?,
            citations: Vec::new(),
            attachments: Vec::new(),
            parent_message_id,
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        })
    }

    pub fn assistant(
        conversation_id: ConversationId,
        text: impl Into<String>,
        citations: Vec<String>,
        attachments: Vec<String>,
        parent_message_id: Option<MessageId>,
    ) -> Result<Self> {
        Ok(Self {
            id: MessageId::new(),
            conversation_id,
            role: MessageRole::Assistant,
            text: NonEmptyText::new(text)?,
            citations,
            attachments,
            parent_message_id,
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        })
    }
}

/// The set of repositories a conversation is grounded in, and any sticky
/// state `QueryEngine` carries between turns (last classified intent, etc).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub repository_ids: Vec<RepositoryId>,
}

/// Lifecycle of a conversation. Only an `Active` conversation admits new
/// messages; `Paused`/`Archived` conversations are read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationStatus {
    Active,
    Paused,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub user_id: UserId,
    pub context: ConversationContext,
    pub status: ConversationStatus,
    pub messages: Vec<ConversationMessage>,
    pub timestamps: TimestampPair,
}

impl Conversation {
    pub fn new(user_id: UserId, context: ConversationContext) -> Self {
        Self {
            id: ConversationId::new(),
            user_id,
            context,
            status: ConversationStatus::Active,
            messages: Vec::new(),
            timestamps: TimestampPair::now(),
        }
    }

    /// Whether this conversation can currently accept a new message.
    pub fn accepts_messages(&self) -> bool {
        self.status == ConversationStatus::Active
    }

    /// Append-only: messages are never reordered or removed once added.
    pub fn append(&mut self, message: ConversationMessage) {
        self.messages.push(message);
        self.timestamps.touch();
    }
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn save(&self, conversation: Conversation) -> Result<()>;

    /// Fetch a conversation, enforcing that `requester` owns it. Returns
    /// `Unauthorized` if it exists but belongs to someone else, `NotFound`
    /// if it doesn't exist at all.
    async fn get_by_id(&self, id: &ConversationId, requester: &UserId) -> Result<Conversation>;

    async fn get_by_user_id(
        &self,
        user_id: &UserId,
        status: Option<ConversationStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Conversation>>;

    /// All reads filter by `user_id` for authorization; a repository scope
    /// never widens visibility across users.
    async fn get_by_repository_ids(
        &self,
        repository_ids: &[RepositoryId],
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Conversation>>;

    async fn search(
        &self,
        user_id: &UserId,
        query_text: &str,
        status: Option<ConversationStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Conversation>>;

    async fn delete(&self, id: &ConversationId, requester: &UserId) -> Result<bool>;
}

#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: DashMap<ConversationId, RwLock<Conversation>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn save(&self, conversation: Conversation) -> Result<()> {
        self.conversations
            .insert(conversation.id, RwLock::new(conversation));
        Ok(())
    }

    async fn get_by_id(&self, id: &ConversationId, requester: &UserId) -> Result<Conversation> {
        let entry = self
            .conversations
            .get(id)
            .ok_or_else(|| ArchieError::not_found(format!("conversation not found: {id}")))?;
        let conversation = entry.read();
        if &conversation.user_id != requester {
            return Err(ArchieError::unauthorized(
                "conversation belongs to a different user",
            ));
        }
        Ok(conversation.clone())
    }

    async fn get_by_user_id(
        &self,
        user_id: &UserId,
        status: Option<ConversationStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Conversation>> {
        Ok(self
            .conversations
            .iter()
            .map(|entry| entry.read().clone())
            .filter(|c| &c.user_id == user_id)
            .filter(|c| status.map_or(true, |s| c.status == s))
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn get_by_repository_ids(
        &self,
        repository_ids: &[RepositoryId],
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Conversation>> {
        Ok(self
            .conversations
            .iter()
            .map(|entry| entry.read().clone())
            .filter(|c| &c.user_id == user_id)
            .filter(|c| c.context.repository_ids.iter().any(|id| repository_ids.contains(id)))
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn search(
        &self,
        user_id: &UserId,
        query_text: &str,
        status: Option<ConversationStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Conversation>> {
        let lowered = query_text.to_lowercase();
        Ok(self
            .conversations
            .iter()
            .map(|entry| entry.read().clone())
            .filter(|c| &c.user_id == user_id)
            .filter(|c| status.map_or(true, |s| c.status == s))
            .filter(|c| {
                c.messages
                    .iter()
                    .any(|m| m.text.as_str().to_lowercase().contains(&lowered))
            })
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn delete(&self, id: &ConversationId, requester: &UserId) -> Result<bool> {
        let owns = self
            .conversations
            .get(id)
            .map(|entry| &entry.read().user_id == requester)
            .unwrap_or(false);

        if !self.conversations.contains_key(id) {
            return Ok(false);
        }
        if !owns {
            return Err(ArchieError::unauthorized(
                "conversation belongs to a different user",
            ));
        }
        self.conversations.remove(id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_by_id_rejects_other_users() {
        let store = InMemoryConversationStore::new();
        let owner = UserId::new();
        let stranger = UserId::new();
        let conversation = Conversation::new(owner, ConversationContext::default());
        let id = conversation.id;
        store.save(conversation).await.unwrap();

        let err = store.get_by_id(&id, &stranger).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Unauthorized);
        assert!(store.get_by_id(&id, &owner).await.is_ok());
    }

    #[test]
    fn append_preserves_order() {
        let mut conversation = Conversation::new(UserId::new(), ConversationContext::default());
        let id = conversation.id;
        let user_message = ConversationMessage::user(id, "hello", None).unwrap();
        let parent = user_message.id;
        conversation.append(user_message);
        conversation
            .append(ConversationMessage::assistant(id, "hi there", vec![], vec![], Some(parent)).unwrap());
        assert_eq!(conversation.messages[0].role, MessageRole::User);
        assert_eq!(conversation.messages[1].role, MessageRole::Assistant);
        assert_eq!(conversation.messages[1].parent_message_id, Some(parent));
    }

    #[test]
    fn only_active_conversations_accept_messages() {
        let mut conversation = Conversation::new(UserId::new(), ConversationContext::default());
        assert!(conversation.accepts_messages());
        conversation.status = ConversationStatus::Archived;
        assert!(!conversation.accepts_messages());
    }

    #[tokio::test]
    async fn delete_by_non_owner_is_unauthorized() {
        let store = InMemoryConversationStore::new();
        let owner = UserId::new();
        let stranger = UserId::new();
        let conversation = Conversation::new(owner, ConversationContext::default());
        let id = conversation.id;
        store.save(conversation).await.unwrap();

        let err = store.delete(&id, &stranger).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Unauthorized);
    }
}
