// QueryEngine — the conversational entry point. Coordinates
// ConversationStore, SearchIndex, GraphStore and an Llm to turn one user
// message into a grounded answer, appended to the conversation alongside
// the question that prompted it.

use crate::contracts::llm::{CompletionRequest, Llm, QueryIntent};
use crate::contracts::search_index::SearchIndex;
use crate::contracts::SearchQuery;
use crate::conversation::{Conversation, ConversationContext, ConversationMessage, ConversationStore};
use crate::error::{ArchieError, Result};
use crate::event_bus::{DomainEvent, EventBus};
use crate::graph::GraphStore;
use crate::types::{ConversationId, MessageId, RepositoryId, UserId, ValidatedLimit};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// A question posed against an existing conversation.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub query_text: String,
    pub include_context: bool,
    pub max_context_items: usize,
    pub parent_message_id: Option<MessageId>,
}

/// The last K recency messages considered per query, regardless of how
/// long the conversation has grown.
const MAX_RECENCY_MESSAGES: usize = 10;
const MAX_FOLLOW_UP_QUESTIONS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
    pub answer: String,
    pub confidence: f32,
    pub citations: Vec<String>,
    pub follow_up_questions: Vec<String>,
    pub response_time: Duration,
}

pub struct QueryEngine {
    conversations: Arc<dyn ConversationStore>,
    search_index: Arc<dyn SearchIndex>,
    graph_store: Arc<dyn GraphStore>,
    llm: Arc<dyn Llm>,
    event_bus: Arc<dyn EventBus>,
    conversation_locks: DashMap<ConversationId, Arc<Mutex<()>>>,
}

impl QueryEngine {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        search_index: Arc<dyn SearchIndex>,
        graph_store: Arc<dyn GraphStore>,
        llm: Arc<dyn Llm>,
        event_bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            conversations,
            search_index,
            graph_store,
            llm,
            event_bus,
            conversation_locks: DashMap::new(),
        }
    }

    /// Starts a new conversation scoped to `repository_ids` and persists it
    /// immediately so a subsequent `process_query` can find it.
    pub async fn start_conversation(&self, user_id: UserId, repository_ids: Vec<RepositoryId>) -> Result<ConversationId> {
        let conversation = Conversation::new(user_id, ConversationContext { repository_ids });
        let conversation_id = conversation.id;
        self.conversations.save(conversation).await?;
        let _ = self
            .event_bus
            .publish(DomainEvent::ConversationStarted { conversation_id })
            .await;
        Ok(conversation_id)
    }

    fn conversation_lock(&self, conversation_id: ConversationId) -> Arc<Mutex<()>> {
        self.conversation_locks
            .entry(conversation_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn process_query(&self, request: QueryRequest) -> Result<QueryResponse> {
        let lock = self.conversation_lock(request.conversation_id);
        let _guard = lock.lock().await;
        let start = Instant::now();

        match self.run_pipeline(&request, start).await {
            Ok(response) => Ok(response),
            Err(e) => {
                let _ = self
                    .event_bus
                    .publish(DomainEvent::QueryProcessingFailed {
                        conversation_id: request.conversation_id,
                        reason: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    async fn run_pipeline(&self, request: &QueryRequest, start: Instant) -> Result<QueryResponse> {
        // 1. Load conversation; ownership and acceptance checks.
        let mut conversation = self
            .conversations
            .get_by_id(&request.conversation_id, &request.user_id)
            .await?;
        if !conversation.accepts_messages() {
            return Err(ArchieError::invalid_state(format!(
                "conversation {} cannot accept new messages in its current state",
                conversation.id
            )));
        }

        // 2. Classify intent.
        let classification = self.llm.classify_intent(&request.query_text).await?;

        // 3. Retrieve candidate context, if requested and the conversation
        // has an active repository scope.
        let mut context_snippets = Vec::new();
        if request.include_context && !conversation.context.repository_ids.is_empty() {
            context_snippets.extend(self.retrieve_context(request, &conversation.context.repository_ids).await?);
        }
        if matches!(classification.intent, QueryIntent::ArchitectureOverview) {
            context_snippets.extend(self.retrieve_pattern_context(&conversation.context.repository_ids).await?);
        }

        // 4. Last K messages as recency context.
        let recency: Vec<String> = conversation
            .messages
            .iter()
            .rev()
            .take(MAX_RECENCY_MESSAGES)
            .map(|m| m.text.as_str().to_string())
            .collect();

        // 5. Invoke the LLM for a grounded answer.
        let system_prompt = format!(
            "Answer using the supplied context. Recent turns: {}",
            recency.join(" / ")
        );
        let completion = self
            .llm
            .complete(CompletionRequest {
                system_prompt,
                user_message: request.query_text.clone(),
                context_snippets: context_snippets.clone(),
            })
            .await?;
        let confidence = completion.confidence.clamp(0.0, 1.0);

        // 6. Up to 3 follow-up questions, derived from intent — the
        // reference Llm has no dedicated follow-up endpoint, so these are
        // templated rather than generated.
        let follow_up_questions = follow_up_questions_for(classification.intent, &request.query_text);

        // 7. Append User then AI message.
        let user_message = ConversationMessage::user(
            conversation.id,
            request.query_text.clone(),
            request.parent_message_id,
        )?;
        let user_message_id = user_message.id;
        let ai_message = ConversationMessage::assistant(
            conversation.id,
            completion.text.clone(),
            completion.citations.clone(),
            completion.attachments.clone(),
            Some(user_message_id),
        )?;
        let message_id = ai_message.id;
        conversation.append(user_message);
        conversation.append(ai_message);

        // 8. Persist; failure here is surfaced directly (caller never sees
        // a partial append).
        self.conversations.save(conversation).await?;

        let _ = self
            .event_bus
            .publish(DomainEvent::QueryProcessed {
                conversation_id: request.conversation_id,
                confidence,
            })
            .await;

        Ok(QueryResponse {
            message_id,
            conversation_id: request.conversation_id,
            answer: completion.text,
            confidence,
            citations: completion.citations,
            follow_up_questions,
            response_time: start.elapsed(),
        })
    }

    async fn retrieve_context(&self, request: &QueryRequest, repository_ids: &[RepositoryId]) -> Result<Vec<String>> {
        let limit = ValidatedLimit::new(request.max_context_items.max(1), 1000)?;
        let query = SearchQuery::new(request.query_text.clone(), repository_ids.to_vec())?.with_limit(limit);
        let results = self.search_index.search(&query).await?;
        Ok(results.hits.into_iter().map(|hit| hit.snippet).collect())
    }

    async fn retrieve_pattern_context(&self, repository_ids: &[RepositoryId]) -> Result<Vec<String>> {
        let mut snippets = Vec::new();
        for repository_id in repository_ids {
            let patterns = self.graph_store.get_patterns(repository_id).await?;
            snippets.extend(patterns.into_iter().map(|p| format!("{}: {}", p.name, p.description)));
        }
        Ok(snippets)
    }
}

fn follow_up_questions_for(intent: QueryIntent, query_text: &str) -> Vec<String> {
    let suggestions = match intent {
        QueryIntent::CodeSearch => vec![
            format!("Where else is this used besides what you asked about in \"{query_text}\"?"),
            "Can you show the tests covering this?".to_string(),
            "What would break if this changed?".to_string(),
        ],
        QueryIntent::RelationshipLookup => vec![
            "What else depends on this?".to_string(),
            "Is there a cycle involving this component?".to_string(),
            "Which of these dependencies are architectural?".to_string(),
        ],
        QueryIntent::ArchitectureOverview => vec![
            "What anti-patterns were detected here?".to_string(),
            "Which module has the highest fan-out?".to_string(),
            "How does this compare to the rest of the codebase?".to_string(),
        ],
        QueryIntent::GeneralQuestion => vec![
            "Would you like me to search the indexed code for this?".to_string(),
            "Should I scope this to a specific repository?".to_string(),
        ],
    };
    suggestions.into_iter().take(MAX_FOLLOW_UP_QUESTIONS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::git_provider::InMemoryGitProvider;
    use crate::contracts::llm::InMemoryLlm;
    use crate::contracts::search_index::InMemorySearchIndex;
    use crate::conversation::InMemoryConversationStore;
    use crate::error::ErrorKind;
    use crate::event_bus::InProcessEventBus;
    use crate::graph::PetgraphGraphStore;
    use crate::search::Document;
    use crate::types::ValidatedPath;

    fn engine() -> (QueryEngine, Arc<dyn ConversationStore>, Arc<dyn SearchIndex>) {
        let conversations: Arc<dyn ConversationStore> = Arc::new(InMemoryConversationStore::new());
        let search_index: Arc<dyn SearchIndex> = Arc::new(InMemorySearchIndex::new());
        let graph_store: Arc<dyn GraphStore> = Arc::new(PetgraphGraphStore::default());
        let llm: Arc<dyn Llm> = Arc::new(InMemoryLlm::new());
        let event_bus: Arc<dyn EventBus> = Arc::new(InProcessEventBus::default());
        let engine = QueryEngine::new(conversations.clone(), search_index.clone(), graph_store, llm, event_bus);
        (engine, conversations, search_index)
    }

    #[tokio::test]
    async fn process_query_appends_user_then_ai_message() {
        let (engine, conversations, _search_index) = engine();
        let user_id = UserId::new();
        let conversation_id = engine.start_conversation(user_id, vec![]).await.unwrap();

        let response = engine
            .process_query(QueryRequest {
                conversation_id,
                user_id,
                query_text: "Where is the auth middleware?".to_string(),
                include_context: true,
                max_context_items: 5,
                parent_message_id: None,
            })
            .await
            .unwrap();

        let conversation = conversations.get_by_id(&conversation_id, &user_id).await.unwrap();
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.messages[0].role, crate::conversation::MessageRole::User);
        assert_eq!(conversation.messages[1].role, crate::conversation::MessageRole::Assistant);
        assert_eq!(conversation.messages[1].id, response.message_id);
    }

    #[tokio::test]
    async fn process_query_rejects_other_users_conversation() {
        let (engine, _conversations, _search_index) = engine();
        let owner = UserId::new();
        let stranger = UserId::new();
        let conversation_id = engine.start_conversation(owner, vec![]).await.unwrap();

        let err = engine
            .process_query(QueryRequest {
                conversation_id,
                user_id: stranger,
                query_text: "anything".to_string(),
                include_context: false,
                max_context_items: 5,
                parent_message_id: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn process_query_retrieves_context_when_repository_scoped() {
        let (engine, _conversations, search_index) = engine();
        let user_id = UserId::new();
        let repository_id = RepositoryId::new();
        let path = ValidatedPath::new("src/auth.rs").unwrap();
        search_index
            .upsert_document(Document::new(repository_id, path, 0, "fn auth_middleware() {}".into()))
            .await
            .unwrap();

        let conversation_id = engine.start_conversation(user_id, vec![repository_id]).await.unwrap();
        let response = engine
            .process_query(QueryRequest {
                conversation_id,
                user_id,
                query_text: "Where is the auth middleware defined?".to_string(),
                include_context: true,
                max_context_items: 5,
                parent_message_id: None,
            })
            .await
            .unwrap();

        assert!(!response.answer.is_empty());
    }
}
