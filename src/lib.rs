// Archie - ingests source repositories, builds searchable and semantic
// representations, constructs a knowledge graph, and serves conversational
// code Q&A over the result.
// Root library module

pub mod builders;
pub mod contracts;
pub mod conversation;
pub mod error;
pub mod event_bus;
pub mod graph;
pub mod ingestion;
pub mod knowledge_graph;
pub mod observability;
pub mod parsing;
pub mod path_utils;
pub mod pure;
pub mod query_engine;
pub mod repository;
pub mod scheduler;
pub mod search;
pub mod types;
pub mod validation;

// Re-export the crate-wide error type
pub use error::{ArchieError, ErrorKind, Result};

// Re-export observability
pub use observability::{
    init_logging, init_logging_with_level, log_operation, record_metric, with_trace_id, MetricType,
    Operation, OperationContext,
};

// Re-export validated value types
pub use types::{
    EntityId, GraphId, NonEmptyText, NonZeroSize, PatternId, RelationshipId, TimestampPair,
    ValidatedLimit, ValidatedPath, ValidatedTag, ValidatedTimestamp, ValidatedUrl,
};
pub use types::{ConversationId, DocumentId, MessageId, RepositoryId, UserId};

// Re-export builders
pub use builders::{CodeEntityBuilder, DocumentBuilder, RepositoryBuilder};

// Re-export the repository aggregate and store
pub use repository::{
    InMemoryRepositoryStore, Repository, RepositoryBranches, RepositoryCommits, RepositoryFilter,
    RepositoryStatus, RepositoryStore,
};

// Re-export the search aggregate and contract
pub use contracts::{InMemorySearchIndex, SearchHit, SearchIndex, SearchQuery, SearchResults};
pub use search::{Document, IndexStatus};

// Re-export the knowledge graph aggregate and store
pub use graph::{
    AntiPattern, ArchitecturalPattern, CodeEntity, CodeRelationship, EntityKind, GraphStore,
    PatternSeverity, PetgraphGraphStore, RelationshipKind, RelationshipQueryConfig,
};
pub use knowledge_graph::{AnalysisDepth, KnowledgeGraph, KnowledgeGraphBuilder, KnowledgeGraphConfig};

// Re-export ingestion
pub use ingestion::{IngestionConfig, IngestionPipeline};

// Re-export the conversation aggregate and store
pub use conversation::{
    Conversation, ConversationContext, ConversationMessage, ConversationStatus, ConversationStore,
    InMemoryConversationStore, MessageRole,
};

// Re-export the query engine
pub use query_engine::{QueryEngine, QueryRequest, QueryResponse};

// Re-export external collaborator contracts
pub use contracts::{
    CommitInfo, CompletionRequest, CompletionResponse, Embedder, FileEntry, GitProvider,
    InMemoryEmbedder, InMemoryGitProvider, InMemoryLlm, IntentClassification, Llm, QueryIntent,
    RepositoryMetadata,
};
pub use event_bus::{DomainEvent, EventBus, InProcessEventBus};

// Re-export the background job scheduler
pub use scheduler::{Scheduler, SchedulerConfig};

// Re-export path utilities
pub use path_utils::{normalize_file_entry, normalize_path_relative, paths_equivalent};
