// Repository aggregate and RepositoryStore — the crate's record of which
// repositories have been added and what is known about their branches and
// recent commits.

use crate::contracts::git_provider::{BranchInfo, CommitInfo};
use crate::error::{ArchieError, Result};
use crate::search::IndexStatus;
use crate::types::{RepositoryId, TimestampPair, ValidatedTag, ValidatedUrl};
use crate::validation::parse_repository_url;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Lifecycle of the repository aggregate itself, independent of the
/// progress of any particular indexing run (tracked by `IndexStatus`).
/// Transitions: `Disconnected` -> `Connected` -> `Analyzing` -> `Ready` |
/// `Error`. Ingestion consumers should only act on a repository once it
/// reaches `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepositoryStatus {
    Disconnected,
    Connected,
    Analyzing,
    Ready,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepositoryId,
    pub url: ValidatedUrl,
    pub owner: String,
    pub name: String,
    pub default_branch: String,
    pub tags: Vec<ValidatedTag>,
    pub status: RepositoryStatus,
    pub index_status: IndexStatus,
    pub timestamps: TimestampPair,
}

impl Repository {
    /// Construct a new `Repository` from a URL. URL parsing and validation
    /// have already succeeded by the time this returns, so the aggregate
    /// starts life `Connected` rather than `Disconnected` (§8 Scenario B).
    pub fn new(url: impl Into<String>, default_branch: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let (owner, name) = parse_repository_url(&url)?;
        Ok(Self {
            id: RepositoryId::new(),
            url: ValidatedUrl::new(url)?,
            owner,
            name,
            default_branch: default_branch.into(),
            tags: Vec::new(),
            status: RepositoryStatus::Connected,
            index_status: IndexStatus::Pending,
            timestamps: TimestampPair::now(),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn with_tags(mut self, tags: Vec<ValidatedTag>) -> Self {
        self.tags = tags;
        self
    }

    pub fn touch(&mut self) {
        self.timestamps.touch();
    }
}

/// Snapshot of branch state captured at the time a repository was last
/// refreshed. Not an independent aggregate — owned by `Repository`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryBranches {
    pub repository_id: RepositoryId,
    pub branches: Vec<BranchInfo>,
}

/// Recent commit history captured for a repository, bounded by whatever
/// limit the caller requested from the `GitProvider`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryCommits {
    pub repository_id: RepositoryId,
    pub commits: Vec<CommitInfo>,
}

/// A filter over the repository collection, used by `getByFilter`.
#[derive(Debug, Clone, Default)]
pub struct RepositoryFilter {
    pub tag: Option<String>,
    pub owner: Option<String>,
}

impl RepositoryFilter {
    fn matches(&self, repository: &Repository) -> bool {
        if let Some(tag) = &self.tag {
            if !repository.tags.iter().any(|t| t.as_str() == tag) {
                return false;
            }
        }
        if let Some(owner) = &self.owner {
            if &repository.owner != owner {
                return false;
            }
        }
        true
    }
}

/// Owns the `Repository` aggregate: add/update/lookup/delete, keyed by both
/// `RepositoryId` and canonical URL so `addRepository` can detect
/// duplicates per §8 Scenario B.
#[async_trait]
pub trait RepositoryStore: Send + Sync {
    async fn add(&self, repository: Repository) -> Result<()>;

    async fn update(&self, repository: Repository) -> Result<()>;

    async fn get_by_id(&self, id: &RepositoryId) -> Result<Repository>;

    async fn get_by_url(&self, url: &str) -> Result<Option<Repository>>;

    async fn get_all(&self) -> Result<Vec<Repository>>;

    async fn get_by_filter(&self, filter: &RepositoryFilter) -> Result<Vec<Repository>>;

    async fn exists(&self, url: &str) -> Result<bool>;

    async fn delete(&self, id: &RepositoryId) -> Result<bool>;
}

#[derive(Default)]
pub struct InMemoryRepositoryStore {
    by_id: DashMap<RepositoryId, Repository>,
    id_by_url: DashMap<String, RepositoryId>,
}

impl InMemoryRepositoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RepositoryStore for InMemoryRepositoryStore {
    async fn add(&self, repository: Repository) -> Result<()> {
        let url = repository.url.as_str().to_string();
        if self.id_by_url.contains_key(&url) {
            return Err(ArchieError::already_exists(format!(
                "repository already added: {url}"
            )));
        }
        self.id_by_url.insert(url, repository.id);
        self.by_id.insert(repository.id, repository);
        Ok(())
    }

    async fn update(&self, repository: Repository) -> Result<()> {
        if !self.by_id.contains_key(&repository.id) {
            return Err(ArchieError::not_found(format!(
                "repository not found: {}",
                repository.id
            )));
        }
        self.by_id.insert(repository.id, repository);
        Ok(())
    }

    async fn get_by_id(&self, id: &RepositoryId) -> Result<Repository> {
        self.by_id
            .get(id)
            .map(|entry| entry.clone())
            .ok_or_else(|| ArchieError::not_found(format!("repository not found: {id}")))
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<Repository>> {
        Ok(match self.id_by_url.get(url) {
            Some(id) => self.by_id.get(id.value()).map(|entry| entry.clone()),
            None => None,
        })
    }

    async fn get_all(&self) -> Result<Vec<Repository>> {
        Ok(self.by_id.iter().map(|entry| entry.clone()).collect())
    }

    async fn get_by_filter(&self, filter: &RepositoryFilter) -> Result<Vec<Repository>> {
        Ok(self
            .by_id
            .iter()
            .filter(|entry| filter.matches(&entry))
            .map(|entry| entry.clone())
            .collect())
    }

    async fn exists(&self, url: &str) -> Result<bool> {
        Ok(self.id_by_url.contains_key(url))
    }

    async fn delete(&self, id: &RepositoryId) -> Result<bool> {
        match self.by_id.remove(id) {
            Some((_, repository)) => {
                self.id_by_url.remove(repository.url.as_str());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_new_parses_url_into_owner_and_name() {
        let repo = Repository::new("https://github.com/acme/widgets", "main").unwrap();
        assert_eq!(repo.owner, "acme");
        assert_eq!(repo.name, "widgets");
        assert_eq!(repo.full_name(), "acme/widgets");
    }

    #[tokio::test]
    async fn adding_duplicate_url_is_already_exists() {
        let store = InMemoryRepositoryStore::new();
        let repo = Repository::new("https://github.com/acme/widgets", "main").unwrap();
        store.add(repo.clone()).await.unwrap();

        let duplicate = Repository::new("https://github.com/acme/widgets", "main").unwrap();
        let err = store.add(duplicate).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn get_by_id_of_missing_repository_is_not_found() {
        let store = InMemoryRepositoryStore::new();
        let err = store.get_by_id(&RepositoryId::new()).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn delete_removes_both_indexes() {
        let store = InMemoryRepositoryStore::new();
        let repo = Repository::new("https://github.com/acme/widgets", "main").unwrap();
        let url = repo.url.as_str().to_string();
        store.add(repo.clone()).await.unwrap();

        assert!(store.delete(&repo.id).await.unwrap());
        assert!(!store.exists(&url).await.unwrap());
        assert!(store.get_by_id(&repo.id).await.is_err());
    }
}
