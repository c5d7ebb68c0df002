// GitProvider contract — a hosted git host (GitHub-shaped). Production
// implementations talk to the GitHub REST/GraphQL API over HTTP; this
// module only defines the trait and a deterministic in-memory fixture
// used by the ingestion pipeline's own tests.

use crate::error::{ArchieError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub owner: String,
    pub name: String,
    pub default_branch: String,
    pub description: Option<String>,
    pub is_private: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    pub head_commit_sha: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub size_bytes: u64,
    pub is_binary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub author: String,
    pub message: String,
    pub committed_at: DateTime<Utc>,
}

/// Access to a hosted git repository: metadata, branches, file trees,
/// file content, and commit history. No local clone or `git2` plumbing —
/// every operation is a remote read.
#[async_trait]
pub trait GitProvider: Send + Sync {
    /// Confirm the caller's credentials can read this repository. Returns
    /// `Unauthorized` if not, `NotFound` if the repository doesn't exist.
    async fn validate_repository_access(&self, owner: &str, name: &str) -> Result<()>;

    async fn get_repository(&self, owner: &str, name: &str) -> Result<RepositoryMetadata>;

    async fn get_branches(&self, owner: &str, name: &str) -> Result<Vec<BranchInfo>>;

    /// List every file in a branch's tree along with size/binary metadata,
    /// without fetching content.
    async fn get_repository_tree_with_metadata(
        &self,
        owner: &str,
        name: &str,
        branch: &str,
    ) -> Result<Vec<FileEntry>>;

    async fn get_file_content(
        &self,
        owner: &str,
        name: &str,
        branch: &str,
        path: &str,
    ) -> Result<Vec<u8>>;

    /// Commit history for a branch, most recent first, bounded by `limit`.
    async fn get_commit_history(
        &self,
        owner: &str,
        name: &str,
        branch: &str,
        limit: usize,
    ) -> Result<Vec<CommitInfo>>;
}

/// A fully in-memory `GitProvider` used in tests and as a working default.
/// Repositories are seeded via `seed_repository`; nothing ever touches the
/// network or the filesystem.
#[derive(Default)]
pub struct InMemoryGitProvider {
    repositories: DashMap<(String, String), SeededRepository>,
}

struct SeededRepository {
    metadata: RepositoryMetadata,
    branches: Vec<BranchInfo>,
    files: Vec<FileEntry>,
    content: DashMap<String, Vec<u8>>,
    commits: Vec<CommitInfo>,
}

impl InMemoryGitProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository this provider will serve. `files` gives each
    /// file's content directly; size/binary metadata is derived from it.
    pub fn seed_repository(
        &self,
        metadata: RepositoryMetadata,
        branches: Vec<BranchInfo>,
        files: Vec<(String, Vec<u8>)>,
        commits: Vec<CommitInfo>,
    ) {
        let content = DashMap::new();
        let mut entries = Vec::with_capacity(files.len());
        for (path, bytes) in files {
            let is_binary = bytes.iter().take(8000).any(|&b| b == 0);
            entries.push(FileEntry {
                path: path.clone(),
                size_bytes: bytes.len() as u64,
                is_binary,
            });
            content.insert(path, bytes);
        }

        let key = (metadata.owner.clone(), metadata.name.clone());
        self.repositories.insert(
            key,
            SeededRepository {
                metadata,
                branches,
                files: entries,
                content,
                commits,
            },
        );
    }

    fn lookup(&self, owner: &str, name: &str) -> Result<dashmap::mapref::one::Ref<'_, (String, String), SeededRepository>> {
        self.repositories
            .get(&(owner.to_string(), name.to_string()))
            .ok_or_else(|| ArchieError::not_found(format!("repository {owner}/{name} not found")))
    }
}

#[async_trait]
impl GitProvider for InMemoryGitProvider {
    async fn validate_repository_access(&self, owner: &str, name: &str) -> Result<()> {
        let repo = self.lookup(owner, name)?;
        if repo.metadata.is_private {
            return Err(ArchieError::unauthorized(format!(
                "no access to private repository {owner}/{name}"
            )));
        }
        Ok(())
    }

    async fn get_repository(&self, owner: &str, name: &str) -> Result<RepositoryMetadata> {
        Ok(self.lookup(owner, name)?.metadata.clone())
    }

    async fn get_branches(&self, owner: &str, name: &str) -> Result<Vec<BranchInfo>> {
        Ok(self.lookup(owner, name)?.branches.clone())
    }

    async fn get_repository_tree_with_metadata(
        &self,
        owner: &str,
        name: &str,
        _branch: &str,
    ) -> Result<Vec<FileEntry>> {
        Ok(self.lookup(owner, name)?.files.clone())
    }

    async fn get_file_content(
        &self,
        owner: &str,
        name: &str,
        _branch: &str,
        path: &str,
    ) -> Result<Vec<u8>> {
        let repo = self.lookup(owner, name)?;
        repo.content
            .get(path)
            .map(|entry| entry.clone())
            .ok_or_else(|| ArchieError::not_found(format!("file not found: {path}")))
    }

    async fn get_commit_history(
        &self,
        owner: &str,
        name: &str,
        _branch: &str,
        limit: usize,
    ) -> Result<Vec<CommitInfo>> {
        let repo = self.lookup(owner, name)?;
        Ok(repo.commits.iter().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_provider() -> InMemoryGitProvider {
        let provider = InMemoryGitProvider::new();
        provider.seed_repository(
            RepositoryMetadata {
                owner: "acme".into(),
                name: "widgets".into(),
                default_branch: "main".into(),
                description: None,
                is_private: false,
            },
            vec![BranchInfo {
                name: "main".into(),
                head_commit_sha: "abc123".into(),
            }],
            vec![("src/lib.rs".into(), b"fn main() {}".to_vec())],
            vec![CommitInfo {
                sha: "abc123".into(),
                author: "a".into(),
                message: "init".into(),
                committed_at: Utc::now(),
            }],
        );
        provider
    }

    #[tokio::test]
    async fn unknown_repository_is_not_found() {
        let provider = InMemoryGitProvider::new();
        let err = provider.get_repository("acme", "widgets").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn seeded_repository_round_trips_content() {
        let provider = sample_provider();
        let content = provider
            .get_file_content("acme", "widgets", "main", "src/lib.rs")
            .await
            .unwrap();
        assert_eq!(content, b"fn main() {}");
    }
}
