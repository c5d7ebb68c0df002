// Contracts Module
// The external collaborators Archie depends on but does not implement in
// production: a hosted git provider, an embedding model, an LLM, and a
// search backend. Each trait here is paired with an in-memory reference
// implementation (in the sibling modules) so the rest of the crate can be
// exercised in tests without a network.

pub mod embedder;
pub mod git_provider;
pub mod llm;
pub mod search_index;

pub use embedder::{Embedder, InMemoryEmbedder};
pub use git_provider::{BranchInfo, CommitInfo, FileEntry, GitProvider, InMemoryGitProvider, RepositoryMetadata};
pub use llm::{CompletionRequest, CompletionResponse, InMemoryLlm, IntentClassification, Llm, QueryIntent};
pub use search_index::{InMemorySearchIndex, SearchIndex};

use crate::error::Result;
use crate::types::{DocumentId, RepositoryId, ValidatedLimit, ValidatedTag};
use serde::{Deserialize, Serialize};

/// A search query against the `SearchIndex`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub repository_ids: Vec<RepositoryId>,
    pub tags: Vec<ValidatedTag>,
    pub limit: ValidatedLimit,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, repository_ids: Vec<RepositoryId>) -> Result<Self> {
        let text = text.into();
        crate::validation::validate_query_text(&text)?;
        Ok(Self {
            text,
            repository_ids,
            tags: Vec::new(),
            limit: ValidatedLimit::new(10, 1000)?,
        })
    }

    pub fn with_limit(mut self, limit: ValidatedLimit) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_tags(mut self, tags: Vec<ValidatedTag>) -> Self {
        self.tags = tags;
        self
    }
}

/// A single ranked hit from a `SearchIndex::search` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub document_id: DocumentId,
    pub repository_id: RepositoryId,
    pub path: String,
    pub snippet: String,
    pub score: f32,
}

/// A ranked result set. Results are sorted descending by `score`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub total_matched: usize,
}
