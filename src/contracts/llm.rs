// Llm contract — intent classification and grounded completion for the
// conversational query pipeline. Production implementations call a hosted
// chat model; the in-memory reference applies simple deterministic
// heuristics so `QueryEngine` tests don't depend on a network call.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The coarse intent behind a user's question, used to pick which
/// collaborators (`SearchIndex`, `GraphStore`, or both) a query needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryIntent {
    /// "Where is X defined / how does Y work" — keyword/semantic search.
    CodeSearch,
    /// "What calls X" / "What does X depend on" — graph traversal.
    RelationshipLookup,
    /// "What patterns does this codebase use" — pattern/anti-pattern query.
    ArchitectureOverview,
    /// Free-form conversational follow-up with no clear retrieval target.
    GeneralQuestion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentClassification {
    pub intent: QueryIntent,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_message: String,
    pub context_snippets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    pub confidence: f32,
    pub citations: Vec<String>,
    pub attachments: Vec<String>,
}

/// A large language model used for intent classification and grounded
/// answer generation.
#[async_trait]
pub trait Llm: Send + Sync {
    async fn classify_intent(&self, query_text: &str) -> Result<IntentClassification>;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

/// A deterministic keyword-based `Llm`. Classification is a handful of
/// `contains` checks; completion echoes back the retrieved context so
/// tests can assert the pipeline actually passed it through.
pub struct InMemoryLlm;

impl InMemoryLlm {
    pub fn new() -> Self {
        Self
    }
}

impl Default for InMemoryLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Llm for InMemoryLlm {
    async fn classify_intent(&self, query_text: &str) -> Result<IntentClassification> {
        let lowered = query_text.to_lowercase();
        let (intent, confidence) = if lowered.contains("call") || lowered.contains("depend") || lowered.contains("use") {
            (QueryIntent::RelationshipLookup, 0.8)
        } else if lowered.contains("pattern") || lowered.contains("architecture") || lowered.contains("layer") {
            (QueryIntent::ArchitectureOverview, 0.8)
        } else if lowered.contains("where") || lowered.contains("find") || lowered.contains("how does") {
            (QueryIntent::CodeSearch, 0.75)
        } else {
            (QueryIntent::GeneralQuestion, 0.5)
        };

        Ok(IntentClassification { intent, confidence })
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let citations = request.context_snippets.clone();
        let (text, confidence) = if citations.is_empty() {
            (
                format!("I don't have enough indexed context to answer: {}", request.user_message),
                0.3,
            )
        } else {
            (
                format!(
                    "Based on {} relevant snippet(s): {}",
                    citations.len(),
                    citations.join(" | ")
                ),
                0.85,
            )
        };

        Ok(CompletionResponse {
            text,
            confidence,
            citations,
            attachments: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn classifies_relationship_questions() {
        let llm = InMemoryLlm::new();
        let classification = llm.classify_intent("what calls parse_config?").await.unwrap();
        assert_eq!(classification.intent, QueryIntent::RelationshipLookup);
    }

    #[tokio::test]
    async fn completion_cites_provided_context() {
        let llm = InMemoryLlm::new();
        let response = llm
            .complete(CompletionRequest {
                system_prompt: "answer using context".into(),
                user_message: "how does ingestion work?".into(),
                context_snippets: vec!["ingestion chunks files before embedding".into()],
            })
            .await
            .unwrap();
        assert_eq!(response.citations.len(), 1);
        assert!(response.text.contains("relevant snippet"));
    }
}
