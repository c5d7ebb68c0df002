// Scheduler — runs ingestion jobs on their own task, decoupled from the
// request that triggered them, so `indexRepository` returns as soon as the
// job is enqueued rather than blocking on a multi-minute crawl. Caller
// cancellation never reaches a running job; only the job's own time
// budget (enforced inside `IngestionPipeline`) and the scheduler's
// concurrency cap apply.

use crate::error::{ArchieError, Result};
use crate::ingestion::IngestionPipeline;
use crate::observability::{log_operation, Operation, OperationContext};
use crate::search::IndexStatus;
use crate::types::RepositoryId;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub max_concurrent_jobs: usize,
    pub job_time_budget: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            job_time_budget: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    Queued,
    Running,
}

/// Owns the lifetime of background ingestion jobs. `IngestionPipeline`
/// already serializes per-repository access; `Scheduler` adds the
/// fire-and-forget task spawn plus a process-wide concurrency cap so a
/// burst of `enqueue_indexing` calls can't start unbounded tokio tasks.
pub struct Scheduler {
    pipeline: Arc<IngestionPipeline>,
    permits: Arc<Semaphore>,
    jobs: Arc<DashMap<RepositoryId, JobState>>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(pipeline: Arc<IngestionPipeline>, config: SchedulerConfig) -> Self {
        Self {
            pipeline,
            permits: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
            jobs: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Enqueues a background indexing job and returns immediately. If a
    /// job for this repository is already queued or running, this is a
    /// no-op — the caller should poll `job_state`/`IngestionPipeline::get_indexing_status`
    /// instead of enqueueing a duplicate.
    pub fn enqueue_indexing(&self, repository_id: RepositoryId, force: bool) -> Result<()> {
        if self.jobs.contains_key(&repository_id) {
            return Ok(());
        }
        self.jobs.insert(repository_id, JobState::Queued);

        let pipeline = Arc::clone(&self.pipeline);
        let permits = Arc::clone(&self.permits);
        let jobs = Arc::clone(&self.jobs);
        let time_budget = self.config.job_time_budget;

        tokio::spawn(async move {
            let permit = permits.acquire_owned().await.expect("semaphore not closed");
            jobs.insert(repository_id, JobState::Running);

            let ctx = OperationContext::new("scheduler.run_job");
            // `index_repository` itself returns as soon as the job is
            // spawned; wait here for it to reach a terminal status so this
            // task's own lifetime still tracks the job's real duration.
            let outcome = tokio::time::timeout(time_budget, async {
                pipeline.index_repository(repository_id, force).await?;
                poll_until_terminal(&pipeline, repository_id).await
            })
            .await;

            match &outcome {
                Ok(Ok(IndexStatus::Completed { .. })) => {
                    log_operation(&ctx, &Operation::SchedulerJobStarted { repository_id: repository_id.as_uuid() }, &Ok(()));
                }
                _ => {
                    // Either the job returned a non-terminal/failed status
                    // or it never returned within budget. Either way this
                    // must not vanish silently — log it distinctly from a
                    // caller-facing error.
                    let reason = match &outcome {
                        Ok(Err(e)) => e.to_string(),
                        Err(_) => "job exceeded its time budget".to_string(),
                        _ => "job completed without a terminal Completed status".to_string(),
                    };
                    log_operation(
                        &ctx,
                        &Operation::SchedulerJobFailed {
                            repository_id: repository_id.as_uuid(),
                            reason,
                        },
                        &Err(anyhow::anyhow!("background ingestion job failed")),
                    );
                }
            }

            jobs.remove(&repository_id);
            drop(permit);
        });

        Ok(())
    }

    /// Whether a job for `repository_id` is currently queued or running in
    /// this scheduler. `None` means no job is in flight — callers fall
    /// back to the last persisted `IndexStatus` for historical state.
    pub fn job_state(&self, repository_id: RepositoryId) -> Option<&'static str> {
        self.jobs.get(&repository_id).map(|entry| match *entry {
            JobState::Queued => "queued",
            JobState::Running => "running",
        })
    }

    pub fn active_job_count(&self) -> usize {
        self.jobs.len()
    }
}

/// Polls `get_indexing_status` until it reports a terminal status. Callers
/// wrap this in their own timeout — it never gives up on its own.
async fn poll_until_terminal(pipeline: &Arc<IngestionPipeline>, repository_id: RepositoryId) -> Result<IndexStatus> {
    loop {
        let status = pipeline.get_indexing_status(repository_id).await?;
        if status.is_terminal() {
            return Ok(status);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Blocks until the number of in-flight jobs tracked by `scheduler` drops
/// to zero, or `timeout` elapses — used by tests and by any caller that
/// needs a synchronous view of otherwise-detached background work.
pub async fn wait_for_idle(scheduler: &Scheduler, timeout: Duration) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    while scheduler.active_job_count() > 0 {
        if tokio::time::Instant::now() >= deadline {
            return Err(ArchieError::timeout("scheduler did not reach idle within the given timeout"));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::embedder::InMemoryEmbedder;
    use crate::contracts::git_provider::{BranchInfo, InMemoryGitProvider, RepositoryMetadata};
    use crate::contracts::search_index::InMemorySearchIndex;
    use crate::event_bus::InProcessEventBus;
    use crate::ingestion::IngestionConfig;
    use crate::repository::{InMemoryRepositoryStore, Repository};

    async fn seeded_scheduler() -> (Scheduler, RepositoryId) {
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
            vec![("a.txt".into(), b"hello world".to_vec())],
            vec![],
        );

        let pipeline = Arc::new(IngestionPipeline::new(
            repository_store,
            git_provider,
            embedder,
            search_index,
            event_bus,
            IngestionConfig::default(),
        ));
        let scheduler = Scheduler::new(pipeline, SchedulerConfig::default());
        (scheduler, repository_id)
    }

    #[tokio::test]
    async fn enqueue_runs_job_to_completion_in_background() {
        let (scheduler, repository_id) = seeded_scheduler().await;
        scheduler.enqueue_indexing(repository_id, false).unwrap();
        wait_for_idle(&scheduler, Duration::from_secs(5)).await.unwrap();
        assert_eq!(scheduler.job_state(repository_id), None);
    }

    #[tokio::test]
    async fn duplicate_enqueue_while_running_is_a_no_op() {
        let (scheduler, repository_id) = seeded_scheduler().await;
        scheduler.enqueue_indexing(repository_id, false).unwrap();
        scheduler.enqueue_indexing(repository_id, false).unwrap();
        assert_eq!(scheduler.active_job_count(), 1);
        wait_for_idle(&scheduler, Duration::from_secs(5)).await.unwrap();
    }
}
