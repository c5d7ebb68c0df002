// KnowledgeGraphBuilder — constructs/updates/deletes knowledge graphs over
// one or more repositories and runs pattern/anti-pattern detection over
// the result. Reads file trees/content straight from GitProvider, the same
// way IngestionPipeline does, rather than depending on already-chunked
// search documents (see DESIGN.md for that open-question call).

pub mod extractor;

pub use extractor::{AnalysisDepth, RelationshipHint};

use crate::contracts::GitProvider;
use crate::error::{ArchieError, Result};
use crate::graph::patterns::PatternRegistry;
use crate::graph::{AntiPattern, ArchitecturalPattern, CodeEntity, CodeRelationship, GraphStore, RelationshipQueryConfig};
use crate::observability::{log_operation, Operation, OperationContext};
use crate::parsing::{CodeParser, SupportedLanguage};
use crate::repository::RepositoryStore;
use crate::types::{EntityId, GraphId, RepositoryId};
use dashmap::DashMap;
use extractor::extract_from_file;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct KnowledgeGraphConfig {
    pub languages: Vec<SupportedLanguage>,
    pub max_file_bytes: u64,
}

impl Default for KnowledgeGraphConfig {
    fn default() -> Self {
        Self {
            languages: vec![
                SupportedLanguage::Rust,
                SupportedLanguage::Python,
                SupportedLanguage::JavaScript,
                SupportedLanguage::TypeScript,
            ],
            max_file_bytes: 1_000_000,
        }
    }
}

/// A built knowledge graph snapshot: which repositories it covers and how
/// many entities/relationships it produced. The graph data itself lives in
/// `GraphStore`; this is a handle plus summary counts.
#[derive(Debug, Clone)]
pub struct KnowledgeGraph {
    pub id: GraphId,
    pub repository_ids: Vec<RepositoryId>,
    pub entity_count: usize,
    pub relationship_count: usize,
}

/// Builds and maintains knowledge graphs on top of a `GraphStore`. One
/// builder can track many independently-built graphs, each keyed by the
/// `GraphId` handed back from `build_knowledge_graph`.
pub struct KnowledgeGraphBuilder {
    repository_store: Arc<dyn RepositoryStore>,
    git_provider: Arc<dyn GitProvider>,
    graph_store: Arc<dyn GraphStore>,
    patterns: PatternRegistry,
    config: KnowledgeGraphConfig,
    graphs: DashMap<GraphId, Vec<RepositoryId>>,
    parser: Mutex<CodeParser>,
}

impl KnowledgeGraphBuilder {
    pub fn new(
        repository_store: Arc<dyn RepositoryStore>,
        git_provider: Arc<dyn GitProvider>,
        graph_store: Arc<dyn GraphStore>,
        config: KnowledgeGraphConfig,
    ) -> Result<Self> {
        let parser =
            CodeParser::new().map_err(|e| ArchieError::internal(format!("failed to initialize code parser: {e}")))?;
        Ok(Self {
            repository_store,
            git_provider,
            graph_store,
            patterns: PatternRegistry::with_defaults(),
            config,
            graphs: DashMap::new(),
            parser: Mutex::new(parser),
        })
    }

    /// Extract and persist entities/relationships for `repository_ids`,
    /// replacing whatever each repository previously had in `GraphStore` so
    /// the rebuild is atomic at the per-repository level.
    pub async fn build_knowledge_graph(
        &self,
        repository_ids: Vec<RepositoryId>,
        depth: AnalysisDepth,
    ) -> Result<KnowledgeGraph> {
        let graph_id = GraphId::new();
        let (entity_count, relationship_count) = self.rebuild(&repository_ids, depth).await?;
        self.graphs.insert(graph_id, repository_ids.clone());

        Ok(KnowledgeGraph {
            id: graph_id,
            repository_ids,
            entity_count,
            relationship_count,
        })
    }

    /// Re-run extraction for exactly the repositories a previously built
    /// graph covered, keeping the same `GraphId`.
    pub async fn update_knowledge_graph(&self, graph_id: GraphId, depth: AnalysisDepth) -> Result<KnowledgeGraph> {
        let repository_ids = self
            .graphs
            .get(&graph_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| ArchieError::not_found(format!("knowledge graph not found: {graph_id}")))?;

        let (entity_count, relationship_count) = self.rebuild(&repository_ids, depth).await?;

        Ok(KnowledgeGraph {
            id: graph_id,
            repository_ids,
            entity_count,
            relationship_count,
        })
    }

    /// Drop every entity/relationship for the graph's repositories and
    /// forget the graph handle itself.
    pub async fn delete_knowledge_graph(&self, graph_id: GraphId) -> Result<bool> {
        let Some((_, repository_ids)) = self.graphs.remove(&graph_id) else {
            return Ok(false);
        };
        for repository_id in repository_ids {
            self.graph_store.remove_repository(&repository_id).await?;
        }
        Ok(true)
    }

    pub async fn detect_architectural_patterns(&self, repository_id: RepositoryId) -> Result<Vec<ArchitecturalPattern>> {
        let entities = self.graph_store.get_entities_by_repository(&repository_id).await?;
        let relationships = self.graph_store.get_relationships_by_repository(&repository_id).await?;
        let patterns = self.patterns.detect_patterns(repository_id, &entities, &relationships);
        for pattern in &patterns {
            self.graph_store.add_pattern(pattern.clone()).await?;
        }
        Ok(patterns)
    }

    pub async fn detect_anti_patterns(&self, repository_id: RepositoryId) -> Result<Vec<AntiPattern>> {
        let entities = self.graph_store.get_entities_by_repository(&repository_id).await?;
        let relationships = self.graph_store.get_relationships_by_repository(&repository_id).await?;
        let anti_patterns = self.patterns.detect_anti_patterns(repository_id, &entities, &relationships);
        for anti_pattern in &anti_patterns {
            self.graph_store.add_anti_pattern(anti_pattern.clone()).await?;
        }
        Ok(anti_patterns)
    }

    /// Bounded BFS path lookup, delegated straight to `GraphStore`.
    pub async fn find_relationship_path(
        &self,
        source: &EntityId,
        target: &EntityId,
        config: RelationshipQueryConfig,
    ) -> Result<Option<Vec<EntityId>>> {
        self.graph_store.find_relationship_path(source, target, config).await
    }

    async fn rebuild(&self, repository_ids: &[RepositoryId], depth: AnalysisDepth) -> Result<(usize, usize)> {
        let mut entity_count = 0;
        let mut relationship_count = 0;

        for &repository_id in repository_ids {
            let (entities, relationships) = self.extract_repository(repository_id, depth).await?;
            self.graph_store.remove_repository(&repository_id).await?;

            entity_count += entities.len();
            for entity in entities {
                self.graph_store.add_entity(entity).await?;
            }
            relationship_count += relationships.len();
            for relationship in relationships {
                self.graph_store.add_relationship(relationship).await?;
            }

            let ctx = OperationContext::new("knowledge_graph.build");
            log_operation(
                &ctx,
                &Operation::GraphBuildCompleted {
                    repository_id: repository_id.as_uuid(),
                    entity_count,
                    relationship_count,
                },
                &Ok(()),
            );
        }

        Ok((entity_count, relationship_count))
    }

    async fn extract_repository(
        &self,
        repository_id: RepositoryId,
        depth: AnalysisDepth,
    ) -> Result<(Vec<CodeEntity>, Vec<CodeRelationship>)> {
        let repository = self.repository_store.get_by_id(&repository_id).await?;
        let files = self
            .git_provider
            .get_repository_tree_with_metadata(&repository.owner, &repository.name, &repository.default_branch)
            .await?;

        let mut all_entities = Vec::new();
        let mut all_hints: Vec<RelationshipHint> = Vec::new();

        for file in files {
            if file.is_binary || file.size_bytes > self.config.max_file_bytes {
                continue;
            }
            let Some(extension) = file.path.rsplit('.').next() else {
                continue;
            };
            let Some(language) = SupportedLanguage::from_extension(extension) else {
                continue;
            };
            if !self.config.languages.contains(&language) {
                continue;
            }

            let content = self
                .git_provider
                .get_file_content(&repository.owner, &repository.name, &repository.default_branch, &file.path)
                .await?;
            let text = String::from_utf8_lossy(&content);

            let (entities, hints) = {
                let mut parser = self.parser.lock().await;
                extract_from_file(&mut parser, repository_id, &file.path, language, &text, depth)?
            };

            all_entities.extend(entities);
            all_hints.extend(hints);
        }

        // Relationship hints reference their endpoints by fully-qualified
        // name rather than EntityId, since a target may belong to a file
        // that hadn't been parsed yet when the hint was produced. Hints
        // whose target never resolves (e.g. an import of an external crate
        // with no corresponding entity in this repository) are dropped.
        let fqn_to_id: HashMap<&str, EntityId> = all_entities
            .iter()
            .map(|e| (e.fully_qualified_name.as_str(), e.id.clone()))
            .collect();

        let relationships = all_hints
            .into_iter()
            .filter_map(|hint| {
                let source = fqn_to_id.get(hint.source_fqn.as_str())?.clone();
                let target = fqn_to_id.get(hint.target_fqn.as_str())?.clone();
                Some(CodeRelationship::with_evidence(
                    repository_id,
                    source,
                    target,
                    hint.kind,
                    hint.weight,
                    hint.confidence,
                ))
            })
            .collect();

        Ok((all_entities, relationships))
    }
}
