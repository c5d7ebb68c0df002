// Fluent builders for the aggregates constructed throughout the pipeline.

use crate::error::{ArchieError, Result};
use crate::graph::{CodeEntity, EntityKind};
use crate::repository::Repository;
use crate::search::Document;
use crate::types::{RepositoryId, ValidatedPath, ValidatedTag};

/// Builds a `Repository` from a URL plus optional tags/branch override.
pub struct RepositoryBuilder {
    url: Option<String>,
    default_branch: String,
    tags: Vec<ValidatedTag>,
}

impl RepositoryBuilder {
    pub fn new() -> Self {
        Self {
            url: None,
            default_branch: "main".to_string(),
            tags: Vec::new(),
        }
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    pub fn tag(mut self, tag: &str) -> Result<Self> {
        self.tags.push(ValidatedTag::new(tag)?);
        Ok(self)
    }

    pub fn build(self) -> Result<Repository> {
        let url = self
            .url
            .ok_or_else(|| ArchieError::invalid_input("repository url is required"))?;
        Ok(Repository::new(url, self.default_branch)?.with_tags(self.tags))
    }
}

impl Default for RepositoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a search `Document` for one chunk of one file.
pub struct DocumentBuilder {
    repository_id: Option<RepositoryId>,
    path: Option<ValidatedPath>,
    chunk_index: usize,
    content: Option<String>,
    tags: Vec<ValidatedTag>,
    embedding: Option<Vec<f32>>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self {
            repository_id: None,
            path: None,
            chunk_index: 0,
            content: None,
            tags: Vec::new(),
            embedding: None,
        }
    }

    pub fn repository_id(mut self, id: RepositoryId) -> Self {
        self.repository_id = Some(id);
        self
    }

    pub fn path(mut self, path: impl AsRef<std::path::Path>) -> Result<Self> {
        self.path = Some(ValidatedPath::new(path)?);
        Ok(self)
    }

    pub fn chunk_index(mut self, index: usize) -> Self {
        self.chunk_index = index;
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn tag(mut self, tag: &str) -> Result<Self> {
        self.tags.push(ValidatedTag::new(tag)?);
        Ok(self)
    }

    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn build(self) -> Result<Document> {
        let repository_id = self
            .repository_id
            .ok_or_else(|| ArchieError::invalid_input("document repository_id is required"))?;
        let path = self
            .path
            .ok_or_else(|| ArchieError::invalid_input("document path is required"))?;
        let content = self
            .content
            .ok_or_else(|| ArchieError::invalid_input("document content is required"))?;

        let mut document = Document::new(repository_id, path, self.chunk_index, content).with_tags(self.tags);
        if let Some(embedding) = self.embedding {
            document = document.with_embedding(embedding);
        }
        Ok(document)
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a `CodeEntity` for the knowledge graph extractor.
pub struct CodeEntityBuilder {
    repository_id: Option<RepositoryId>,
    name: Option<String>,
    fully_qualified_name: Option<String>,
    kind: Option<EntityKind>,
    file_path: Option<String>,
    line_start: u32,
    line_end: u32,
}

impl CodeEntityBuilder {
    pub fn new() -> Self {
        Self {
            repository_id: None,
            name: None,
            fully_qualified_name: None,
            kind: None,
            file_path: None,
            line_start: 0,
            line_end: 0,
        }
    }

    pub fn repository_id(mut self, id: RepositoryId) -> Self {
        self.repository_id = Some(id);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn fully_qualified_name(mut self, name: impl Into<String>) -> Self {
        self.fully_qualified_name = Some(name.into());
        self
    }

    pub fn kind(mut self, kind: EntityKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn lines(mut self, start: u32, end: u32) -> Self {
        self.line_start = start;
        self.line_end = end;
        self
    }

    pub fn build(self) -> Result<CodeEntity> {
        let repository_id = self
            .repository_id
            .ok_or_else(|| ArchieError::invalid_input("entity repository_id is required"))?;
        let name = self
            .name
            .ok_or_else(|| ArchieError::invalid_input("entity name is required"))?;
        let fully_qualified_name = self
            .fully_qualified_name
            .unwrap_or_else(|| name.clone());
        let kind = self
            .kind
            .ok_or_else(|| ArchieError::invalid_input("entity kind is required"))?;
        let file_path = self
            .file_path
            .ok_or_else(|| ArchieError::invalid_input("entity file_path is required"))?;

        Ok(CodeEntity::new(
            repository_id,
            name,
            fully_qualified_name,
            kind,
            file_path,
            self.line_start,
            self.line_end,
        ))
    }
}

impl Default for CodeEntityBuilder {
    fn default() -> Self {
        Self::new()
    }
}
