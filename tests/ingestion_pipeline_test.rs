//! Integration tests for the repository ingestion pipeline, end to end
//! over the in-memory reference implementations of every collaborator
//! contract. No mocking framework: real `IngestionPipeline` driving real
//! (in-memory) `RepositoryStore`/`GitProvider`/`Embedder`/`SearchIndex`.

use anyhow::Result;
use archie::{
    DomainEvent, InMemoryEmbedder, InMemoryGitProvider, InMemoryRepositoryStore,
    InMemorySearchIndex, IndexStatus, InProcessEventBus, IngestionConfig, IngestionPipeline,
    Repository, RepositoryMetadata, SearchIndex, SearchQuery,
};
use archie::contracts::git_provider::BranchInfo;
use std::sync::Arc;
use std::time::Duration;

async fn wait_for_completion(pipeline: &IngestionPipeline, repository_id: archie::RepositoryId) -> IndexStatus {
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

struct Harness {
    pipeline: IngestionPipeline,
    repository_id: archie::RepositoryId,
    search_index: Arc<InMemorySearchIndex>,
    event_bus: Arc<InProcessEventBus>,
}

async fn build_harness() -> Result<Harness> {
    let repository_store = Arc::new(InMemoryRepositoryStore::new());
    let git_provider = Arc::new(InMemoryGitProvider::new());
    let embedder = Arc::new(InMemoryEmbedder::new());
    let search_index = Arc::new(InMemorySearchIndex::new());
    let event_bus = Arc::new(InProcessEventBus::default());

    let repository = Repository::new("https://github.com/acme/widgets", "main")?;
    let repository_id = repository.id;
    repository_store.add(repository).await?;

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
            (
                "src/lib.rs".into(),
                b"pub fn widget_factory() -> Widget { Widget::new() }".to_vec(),
            ),
            (
                "src/widget.rs".into(),
                b"pub struct Widget; impl Widget { pub fn new() -> Self { Widget } }".to_vec(),
            ),
            ("README.md".into(), b"# Widgets\n\nA small crate.".to_vec()),
        ],
        vec![],
    );

    let pipeline = IngestionPipeline::new(
        repository_store,
        git_provider,
        embedder,
        Arc::clone(&search_index) as Arc<dyn SearchIndex>,
        Arc::clone(&event_bus) as Arc<dyn archie::EventBus>,
        IngestionConfig::default(),
    );

    Ok(Harness {
        pipeline,
        repository_id,
        search_index,
        event_bus,
    })
}

#[tokio::test]
async fn indexes_every_file_and_makes_it_searchable() -> Result<()> {
    let harness = build_harness().await?;

    harness.pipeline.index_repository(harness.repository_id, false).await?;
    let status = wait_for_completion(&harness.pipeline, harness.repository_id).await;
    assert!(matches!(status, IndexStatus::Completed { documents_indexed, .. } if documents_indexed >= 3));

    let query = SearchQuery::new("widget", vec![harness.repository_id])?;
    let results = harness.search_index.search(&query).await?;
    assert!(results.total_matched > 0, "expected at least one hit for 'widget'");
    assert!(results.hits.iter().any(|hit| hit.path.contains("widget.rs")));

    Ok(())
}

#[tokio::test]
async fn reindexing_without_force_is_a_no_op() -> Result<()> {
    let harness = build_harness().await?;

    harness.pipeline.index_repository(harness.repository_id, false).await?;
    wait_for_completion(&harness.pipeline, harness.repository_id).await;
    let first_count = harness.search_index.document_count(&harness.repository_id).await?;

    let status = harness.pipeline.index_repository(harness.repository_id, false).await?;
    assert!(matches!(status, IndexStatus::Completed { .. }));
    let second_count = harness.search_index.document_count(&harness.repository_id).await?;

    assert_eq!(first_count, second_count);
    Ok(())
}

#[tokio::test]
async fn force_reindex_recomputes_the_index() -> Result<()> {
    let harness = build_harness().await?;

    harness.pipeline.index_repository(harness.repository_id, false).await?;
    wait_for_completion(&harness.pipeline, harness.repository_id).await;

    harness.pipeline.index_repository(harness.repository_id, true).await?;
    let status = wait_for_completion(&harness.pipeline, harness.repository_id).await;

    assert!(matches!(status, IndexStatus::Completed { documents_indexed, .. } if documents_indexed > 0));
    Ok(())
}

#[tokio::test]
async fn remove_repository_clears_its_documents() -> Result<()> {
    let harness = build_harness().await?;

    harness.pipeline.index_repository(harness.repository_id, false).await?;
    wait_for_completion(&harness.pipeline, harness.repository_id).await;
    assert!(harness.search_index.document_count(&harness.repository_id).await? > 0);

    harness.pipeline.remove_repository_from_index(harness.repository_id).await?;
    assert_eq!(harness.search_index.document_count(&harness.repository_id).await?, 0);

    Ok(())
}

#[tokio::test]
async fn completed_ingestion_publishes_lifecycle_events() -> Result<()> {
    let harness = build_harness().await?;
    let mut subscriber = harness.event_bus.subscribe();

    harness.pipeline.index_repository(harness.repository_id, false).await?;

    let mut saw_started = false;
    let mut saw_completed = false;
    for _ in 0..8 {
        match tokio::time::timeout(std::time::Duration::from_millis(200), subscriber.recv()).await {
            Ok(Ok(DomainEvent::RepositoryAnalysisStarted { repository_id })) if repository_id == harness.repository_id => {
                saw_started = true;
            }
            Ok(Ok(DomainEvent::RepositoryAnalysisCompleted { repository_id, .. })) if repository_id == harness.repository_id => {
                saw_completed = true;
            }
            Ok(Ok(_)) => continue,
            _ => break,
        }
    }

    assert!(saw_started, "expected a RepositoryAnalysisStarted event");
    assert!(saw_completed, "expected a RepositoryAnalysisCompleted event");
    Ok(())
}
