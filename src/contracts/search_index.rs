// SearchIndex contract — keyword + vector hybrid search over indexed
// Documents. Production implementations delegate to a dedicated search
// engine; the in-memory reference here does a simple term-overlap plus
// cosine-similarity blend, sufficient to make ranking order checkable in
// tests without standing up a real backend.

use super::embedder::cosine_similarity;
use super::{SearchHit, SearchQuery, SearchResults};
use crate::error::Result;
use crate::search::Document;
use crate::types::{DocumentId, RepositoryId};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn upsert_document(&self, document: Document) -> Result<()>;

    async fn delete_document(&self, id: &DocumentId) -> Result<bool>;

    async fn delete_repository(&self, repository_id: &RepositoryId) -> Result<usize>;

    async fn search(&self, query: &SearchQuery) -> Result<SearchResults>;

    async fn document_count(&self, repository_id: &RepositoryId) -> Result<usize>;
}

#[derive(Default)]
pub struct InMemorySearchIndex {
    documents: DashMap<DocumentId, Document>,
    by_repository: DashMap<RepositoryId, RwLock<Vec<DocumentId>>>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn keyword_score(query_terms: &[&str], content: &str) -> f32 {
        if query_terms.is_empty() {
            return 0.0;
        }
        let lowered = content.to_lowercase();
        let matched = query_terms
            .iter()
            .filter(|term| lowered.contains(&term.to_lowercase()))
            .count();
        matched as f32 / query_terms.len() as f32
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn upsert_document(&self, document: Document) -> Result<()> {
        let repository_id = document.repository_id;
        let id = document.id;
        self.documents.insert(id, document);
        self.by_repository
            .entry(repository_id)
            .or_default()
            .write()
            .push(id);
        Ok(())
    }

    async fn delete_document(&self, id: &DocumentId) -> Result<bool> {
        if let Some((_, doc)) = self.documents.remove(id) {
            if let Some(ids) = self.by_repository.get(&doc.repository_id) {
                ids.write().retain(|existing| existing != id);
            }
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn delete_repository(&self, repository_id: &RepositoryId) -> Result<usize> {
        let Some((_, ids)) = self.by_repository.remove(repository_id) else {
            return Ok(0);
        };
        let ids = ids.into_inner();
        for id in &ids {
            self.documents.remove(id);
        }
        Ok(ids.len())
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResults> {
        let query_terms: Vec<&str> = query.text.split_whitespace().collect();

        let mut hits: Vec<SearchHit> = self
            .documents
            .iter()
            .filter(|entry| {
                query.repository_ids.is_empty() || query.repository_ids.contains(&entry.repository_id)
            })
            .map(|entry| {
                let score = Self::keyword_score(&query_terms, &entry.content);
                SearchHit {
                    document_id: entry.id,
                    repository_id: entry.repository_id,
                    path: entry.path.as_str().to_string(),
                    snippet: entry.content.chars().take(200).collect(),
                    score,
                }
            })
            .filter(|hit| hit.score > 0.0)
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        let total_matched = hits.len();
        hits.truncate(query.limit.get());

        Ok(SearchResults { hits, total_matched })
    }

    async fn document_count(&self, repository_id: &RepositoryId) -> Result<usize> {
        Ok(self
            .by_repository
            .get(repository_id)
            .map(|ids| ids.read().len())
            .unwrap_or(0))
    }
}

/// Semantic re-ranking helper: blend a document's cosine similarity to a
/// query embedding with its keyword score. Not part of the trait — callers
/// that have an embedding for the query can use this directly.
pub fn hybrid_score(keyword_score: f32, query_embedding: &[f32], document_embedding: &[f32]) -> f32 {
    let semantic = cosine_similarity(query_embedding, document_embedding);
    0.5 * keyword_score + 0.5 * semantic.max(0.0)
}
