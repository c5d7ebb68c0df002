// IngestionPipeline — turns a repository's file tree into searchable
// Documents: list files, filter exclusions, fetch content, chunk, embed in
// bounded-concurrency batches with retry/backoff, and upsert into the
// SearchIndex. One job runs at a time per repository.
//
// `index_repository` itself never blocks on the crawl/chunk/embed/upsert
// work: it stakes a claim on the per-repository lock, flips the repository
// to `InProgress`/`Analyzing`, spawns the job, and returns. The spawned
// task holds the lock for the job's real duration; `get_indexing_status` is
// the only way to observe what it eventually does.

use crate::contracts::embedder::Embedder;
use crate::contracts::git_provider::GitProvider;
use crate::contracts::search_index::SearchIndex;
use crate::error::{ArchieError, Result};
use crate::event_bus::{DomainEvent, EventBus};
use crate::observability::{log_operation, Operation, OperationContext};
use crate::pure::{calculate_backoff_duration, chunk_text};
use crate::repository::{Repository, RepositoryStatus, RepositoryStore};
use crate::search::{Document, IndexStatus};
use crate::types::{RepositoryId, ValidatedPath};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};

/// Design-target resource bounds and chunking parameters for the pipeline.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Substrings matched against a file's path; any match excludes it.
    pub exclude_patterns: Vec<String>,
    pub max_file_bytes: u64,
    pub chunk_max_tokens: usize,
    pub chunk_overlap: usize,
    pub embedder_concurrency: usize,
    pub content_fetch_concurrency: usize,
    pub upsert_batch_size: usize,
    pub job_time_budget: Duration,
    pub max_retry_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: vec![
                "/node_modules/".to_string(),
                "/target/".to_string(),
                "/.git/".to_string(),
                "/dist/".to_string(),
            ],
            max_file_bytes: 2_000_000,
            chunk_max_tokens: 800,
            chunk_overlap: 100,
            embedder_concurrency: 8,
            content_fetch_concurrency: 16,
            upsert_batch_size: 50,
            job_time_budget: Duration::from_secs(30 * 60),
            max_retry_attempts: 3,
            retry_base_delay: Duration::from_millis(200),
            retry_max_delay: Duration::from_secs(5),
        }
    }
}

pub struct IngestionPipeline {
    repository_store: Arc<dyn RepositoryStore>,
    git_provider: Arc<dyn GitProvider>,
    embedder: Arc<dyn Embedder>,
    search_index: Arc<dyn SearchIndex>,
    event_bus: Arc<dyn EventBus>,
    config: IngestionConfig,
    repository_locks: DashMap<RepositoryId, Arc<Mutex<()>>>,
}

impl IngestionPipeline {
    pub fn new(
        repository_store: Arc<dyn RepositoryStore>,
        git_provider: Arc<dyn GitProvider>,
        embedder: Arc<dyn Embedder>,
        search_index: Arc<dyn SearchIndex>,
        event_bus: Arc<dyn EventBus>,
        config: IngestionConfig,
    ) -> Self {
        Self {
            repository_store,
            git_provider,
            embedder,
            search_index,
            event_bus,
            config,
            repository_locks: DashMap::new(),
        }
    }

    fn repository_lock(&self, repository_id: RepositoryId) -> Arc<Mutex<()>> {
        self.repository_locks
            .entry(repository_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Triggers a reindex of a repository and returns promptly, independent
    /// of caller cancellation: the crawl/chunk/embed/upsert pipeline runs on
    /// its own task under the pipeline's time budget. Idempotent when
    /// `force` is false and the repository is already fully indexed. If a
    /// job for this repository is already in flight, this reports its
    /// current status rather than starting a second one.
    pub async fn index_repository(&self, repository_id: RepositoryId, force: bool) -> Result<IndexStatus> {
        let mut repository = self.repository_store.get_by_id(&repository_id).await?;
        if !force && matches!(repository.index_status, IndexStatus::Completed { .. }) {
            return Ok(repository.index_status);
        }

        let lock = self.repository_lock(repository_id);
        let guard = match Arc::clone(&lock).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                // A job for this repository is already running; report its
                // current status instead of queuing or blocking.
                return Ok(self.repository_store.get_by_id(&repository_id).await?.index_status);
            }
        };

        repository.index_status = IndexStatus::InProgress {
            documents_indexed: 0,
            total_documents: 0,
        };
        repository.status = RepositoryStatus::Analyzing;
        repository.touch();
        self.repository_store.update(repository.clone()).await?;
        let _ = self
            .event_bus
            .publish(DomainEvent::RepositoryAnalysisStarted { repository_id })
            .await;

        let repository_store = Arc::clone(&self.repository_store);
        let git_provider = Arc::clone(&self.git_provider);
        let embedder = Arc::clone(&self.embedder);
        let search_index = Arc::clone(&self.search_index);
        let event_bus = Arc::clone(&self.event_bus);
        let config = self.config.clone();
        let job_repository = repository.clone();

        tokio::spawn(async move {
            let _guard = guard;
            run_background_job(
                repository_store,
                git_provider,
                embedder,
                search_index,
                event_bus,
                config,
                job_repository,
            )
            .await;
        });

        Ok(repository.index_status)
    }

    pub async fn get_indexing_status(&self, repository_id: RepositoryId) -> Result<IndexStatus> {
        Ok(self.repository_store.get_by_id(&repository_id).await?.index_status)
    }

    pub async fn remove_repository_from_index(&self, repository_id: RepositoryId) -> Result<usize> {
        let removed = self.search_index.delete_repository(&repository_id).await?;
        let mut repository = self.repository_store.get_by_id(&repository_id).await?;
        repository.index_status = IndexStatus::Pending;
        repository.status = RepositoryStatus::Connected;
        repository.touch();
        self.repository_store.update(repository).await?;
        Ok(removed)
    }

    /// Incremental refresh. The reference store doesn't currently track a
    /// last-indexed commit hash on `Repository`, so this reduces to the
    /// same idempotent entry point as a full index: a no-op when already
    /// `Completed`, a full reindex otherwise. See DESIGN.md.
    pub async fn refresh_repository_index(&self, repository_id: RepositoryId) -> Result<IndexStatus> {
        self.index_repository(repository_id, false).await
    }
}

/// Runs the crawl/chunk/embed/upsert job to completion and persists the
/// terminal `IndexStatus`/`RepositoryStatus` it lands on. Owns no borrow
/// back into `IngestionPipeline` so it can live inside a `tokio::spawn`'d,
/// `'static` task.
async fn run_background_job(
    repository_store: Arc<dyn RepositoryStore>,
    git_provider: Arc<dyn GitProvider>,
    embedder: Arc<dyn Embedder>,
    search_index: Arc<dyn SearchIndex>,
    event_bus: Arc<dyn EventBus>,
    config: IngestionConfig,
    repository: Repository,
) {
    let repository_id = repository.id;
    let ctx = OperationContext::new("ingestion.index_repository");
    let result = run_indexing_job(&repository_store, &git_provider, &embedder, &search_index, &config, &repository).await;

    let mut repository = match repository_store.get_by_id(&repository_id).await {
        Ok(repository) => repository,
        Err(_) => return,
    };

    match result {
        Ok((documents_indexed, total_documents)) => {
            repository.index_status = IndexStatus::Completed {
                documents_indexed,
                total_documents,
            };
            repository.status = RepositoryStatus::Ready;
            repository.touch();
            if repository_store.update(repository).await.is_err() {
                return;
            }
            log_operation(
                &ctx,
                &Operation::IngestionCompleted {
                    repository_id: repository_id.as_uuid(),
                    documents_indexed,
                },
                &Ok(()),
            );
            let _ = event_bus
                .publish(DomainEvent::RepositoryAnalysisCompleted {
                    repository_id,
                    documents_indexed,
                })
                .await;
        }
        Err(e) => {
            repository.index_status = IndexStatus::Failed {
                error_message: e.to_string(),
            };
            repository.status = RepositoryStatus::Error;
            repository.touch();
            if repository_store.update(repository).await.is_err() {
                return;
            }
            log_operation(
                &ctx,
                &Operation::IngestionFailed {
                    repository_id: repository_id.as_uuid(),
                    reason: e.to_string(),
                },
                &Err(anyhow::anyhow!(e.to_string())),
            );
            let _ = event_bus
                .publish(DomainEvent::RepositoryAnalysisFailed {
                    repository_id,
                    reason: e.to_string(),
                })
                .await;
        }
    }
}

/// Returns `(documents_indexed, total_documents)`. `total_documents` is set
/// once the full chunk list is known, after crawling and chunking every
/// eligible file — the worked example in §8 Scenario C reports it as a
/// chunk count (82), not the raw file count the tree listing produces.
async fn run_indexing_job(
    repository_store: &Arc<dyn RepositoryStore>,
    git_provider: &Arc<dyn GitProvider>,
    embedder: &Arc<dyn Embedder>,
    search_index: &Arc<dyn SearchIndex>,
    config: &IngestionConfig,
    repository: &Repository,
) -> Result<(usize, usize)> {
    let deadline = Instant::now() + config.job_time_budget;
    let content_permits = Arc::new(Semaphore::new(config.content_fetch_concurrency));
    let embed_permits = Arc::new(Semaphore::new(config.embedder_concurrency));

    let files = git_provider
        .get_repository_tree_with_metadata(&repository.owner, &repository.name, &repository.default_branch)
        .await?;

    let mut pending_chunks: Vec<(String, String)> = Vec::new();

    for file in files {
        if Instant::now() >= deadline {
            return Err(ArchieError::timeout("ingestion job exceeded its time budget"));
        }
        if file.is_binary || file.size_bytes > config.max_file_bytes {
            continue;
        }
        if config.exclude_patterns.iter().any(|p| file.path.contains(p.as_str())) {
            continue;
        }

        let _permit = content_permits.acquire().await.expect("semaphore not closed");
        let bytes = fetch_with_retry(git_provider, config, &repository.owner, &repository.name, &repository.default_branch, &file.path).await?;
        drop(_permit);

        let chunks = chunk_text(&bytes, config.chunk_max_tokens, config.chunk_overlap)?;
        for chunk in chunks {
            pending_chunks.push((file.path.clone(), chunk.text));
        }
    }

    let total_documents = pending_chunks.len();

    let mut documents_indexed = 0;
    for batch in pending_chunks.chunks(config.upsert_batch_size) {
        if Instant::now() >= deadline {
            return Err(ArchieError::timeout("ingestion job exceeded its time budget"));
        }

        let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
        let _permit = embed_permits.acquire().await.expect("semaphore not closed");
        let embeddings = embed_with_retry(embedder, config, &texts).await;
        drop(_permit);

        for (index, (path, text)) in batch.iter().enumerate() {
            let validated_path = ValidatedPath::new(path)?;
            let mut document = Document::new(repository.id, validated_path, index, text.clone());
            if let Ok(vectors) = &embeddings {
                if let Some(vector) = vectors.get(index) {
                    document = document.with_embedding(vector.clone());
                }
            }
            search_index.upsert_document(document).await?;
            documents_indexed += 1;
        }

        // Surface interim progress so a concurrent getIndexingStatus call
        // sees monotonically non-decreasing counts while the job runs.
        if let Ok(mut repository) = repository_store.get_by_id(&repository.id).await {
            repository.index_status = IndexStatus::InProgress {
                documents_indexed,
                total_documents,
            };
            repository.touch();
            let _ = repository_store.update(repository).await;
        }
    }

    Ok((documents_indexed, total_documents))
}

async fn fetch_with_retry(
    git_provider: &Arc<dyn GitProvider>,
    config: &IngestionConfig,
    owner: &str,
    name: &str,
    branch: &str,
    path: &str,
) -> Result<Vec<u8>> {
    let mut attempt = 0;
    loop {
        match git_provider.get_file_content(owner, name, branch, path).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) if e.is_retriable() && attempt < config.max_retry_attempts => {
                let delay = calculate_backoff_duration(attempt, config.retry_base_delay, config.retry_max_delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Embeds a batch with bounded retry. A permanent (non-retriable) failure
/// is not propagated — the caller falls back to a text-only document
/// rather than losing the chunk entirely.
async fn embed_with_retry(embedder: &Arc<dyn Embedder>, config: &IngestionConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let mut attempt = 0;
    loop {
        match embedder.embed_batch(texts).await {
            Ok(vectors) => return Ok(vectors),
            Err(e) if e.is_retriable() && attempt < config.max_retry_attempts => {
                let delay = calculate_backoff_duration(attempt, config.retry_base_delay, config.retry_max_delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::embedder::InMemoryEmbedder;
    use crate::contracts::git_provider::{BranchInfo, InMemoryGitProvider, RepositoryMetadata};
    use crate::contracts::search_index::InMemorySearchIndex;
    use crate::event_bus::InProcessEventBus;
    use crate::repository::InMemoryRepositoryStore;

    async fn seeded_pipeline() -> (IngestionPipeline, RepositoryId) {
        let repository_store = Arc::new(InMemoryRepositoryStore::new());
        let git_provider = Arc::new(InMemoryGitProvider::new());
        let embedder = Arc::new(InMemoryEmbedder::new());
        let search_index = Arc::new(InMemorySearchIndex::new());
        let event_bus = Arc::new(InProcessEventBus::default());

        let repository = Repository::new("https://github.com/acme/widgets", "main").unwrap();
        let repository_id = repository.id;
        repository_store.add(repository).await.unwrap();

        git_provider.seed_repository(
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
            vec![
                ("a.txt".into(), vec![b'x'; 1024]),
                ("b.txt".into(), vec![b'y'; 1024]),
                ("c.txt".into(), vec![b'z'; 50 * 1024]),
            ],
            vec![],
        );

        let pipeline = IngestionPipeline::new(
            repository_store,
            git_provider,
            embedder,
            search_index,
            event_bus,
            IngestionConfig::default(),
        );

        (pipeline, repository_id)
    }

    async fn wait_for_completion(pipeline: &IngestionPipeline, repository_id: RepositoryId) -> IndexStatus {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let status = pipeline.get_indexing_status(repository_id).await.unwrap();
            if status.is_terminal() {
                return status;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("indexing did not reach a terminal status within the test timeout");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn index_repository_returns_in_progress_immediately() {
        let (pipeline, repository_id) = seeded_pipeline().await;
        let status = pipeline.index_repository(repository_id, false).await.unwrap();
        assert!(matches!(status, IndexStatus::InProgress { .. }));
    }

    #[tokio::test]
    async fn index_repository_indexes_every_chunk() {
        let (pipeline, repository_id) = seeded_pipeline().await;
        pipeline.index_repository(repository_id, false).await.unwrap();
        let status = wait_for_completion(&pipeline, repository_id).await;
        assert!(matches!(
            status,
            IndexStatus::Completed { documents_indexed, total_documents } if documents_indexed > 0 && documents_indexed == total_documents
        ));
    }

    #[tokio::test]
    async fn indexing_is_idempotent_without_force() {
        let (pipeline, repository_id) = seeded_pipeline().await;
        pipeline.index_repository(repository_id, false).await.unwrap();
        let first = wait_for_completion(&pipeline, repository_id).await;
        let second = pipeline.index_repository(repository_id, false).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn force_reindex_recomputes_status() {
        let (pipeline, repository_id) = seeded_pipeline().await;
        pipeline.index_repository(repository_id, false).await.unwrap();
        wait_for_completion(&pipeline, repository_id).await;

        pipeline.index_repository(repository_id, true).await.unwrap();
        let forced = wait_for_completion(&pipeline, repository_id).await;
        assert!(matches!(forced, IndexStatus::Completed { .. }));
    }

    #[tokio::test]
    async fn remove_repository_from_index_clears_documents() {
        let (pipeline, repository_id) = seeded_pipeline().await;
        pipeline.index_repository(repository_id, false).await.unwrap();
        wait_for_completion(&pipeline, repository_id).await;

        let removed = pipeline.remove_repository_from_index(repository_id).await.unwrap();
        assert!(removed > 0);
        let status = pipeline.get_indexing_status(repository_id).await.unwrap();
        assert_eq!(status, IndexStatus::Pending);
    }
}
