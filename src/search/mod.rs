// Document aggregate, owned by the SearchIndex.
//
// A Document is one indexed chunk of a repository file: enough text to be
// searched and embedded, plus enough provenance (repository, path, chunk
// offsets) to resolve a hit back to source.

use crate::types::{DocumentId, RepositoryId, ValidatedPath, ValidatedTag};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub repository_id: RepositoryId,
    pub path: ValidatedPath,
    pub chunk_index: usize,
    pub content: String,
    pub tags: Vec<ValidatedTag>,
    pub embedding: Option<Vec<f32>>,
    pub indexed_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        repository_id: RepositoryId,
        path: ValidatedPath,
        chunk_index: usize,
        content: String,
    ) -> Self {
        Self {
            id: DocumentId::new(),
            repository_id,
            path,
            chunk_index,
            content,
            tags: Vec::new(),
            embedding: None,
            indexed_at: Utc::now(),
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_tags(mut self, tags: Vec<ValidatedTag>) -> Self {
        self.tags = tags;
        self
    }
}

/// Indexing progress/outcome for one repository, surfaced by
/// `IngestionPipeline::getIndexingStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexStatus {
    Pending,
    InProgress {
        documents_indexed: usize,
        total_documents: usize,
    },
    Completed {
        documents_indexed: usize,
        total_documents: usize,
    },
    Failed {
        error_message: String,
    },
}

impl IndexStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, IndexStatus::Completed { .. } | IndexStatus::Failed { .. })
    }
}
