// CodeEntity / CodeRelationship / ArchitecturalPattern aggregate and the
// GraphStore that owns it. Backed by petgraph so relationship traversal
// (findRelationshipPath) is a bounded BFS rather than a recursive walk
// over an adjacency map we'd have to hand-roll.

pub mod patterns;

use crate::error::{ArchieError, Result};
use crate::types::{EntityId, PatternId, RelationshipId, RepositoryId};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    File,
    Module,
    Namespace,
    Class,
    Struct,
    Interface,
    Enum,
    Function,
    Method,
    Field,
    Property,
    Variable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEntity {
    pub id: EntityId,
    pub repository_id: RepositoryId,
    pub name: String,
    pub fully_qualified_name: String,
    pub kind: EntityKind,
    /// Heuristic structural complexity, ≥ 0. Never negative.
    pub complexity_score: f32,
    pub language: String,
    pub file_path: String,
    pub line_start: u32,
    pub line_end: u32,
}

impl CodeEntity {
    pub fn new(
        repository_id: RepositoryId,
        name: impl Into<String>,
        fully_qualified_name: impl Into<String>,
        kind: EntityKind,
        file_path: impl Into<String>,
        line_start: u32,
        line_end: u32,
    ) -> Self {
        Self::with_complexity(
            repository_id,
            name,
            fully_qualified_name,
            kind,
            "unknown",
            file_path,
            line_start,
            line_end,
            0.0,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_complexity(
        repository_id: RepositoryId,
        name: impl Into<String>,
        fully_qualified_name: impl Into<String>,
        kind: EntityKind,
        language: impl Into<String>,
        file_path: impl Into<String>,
        line_start: u32,
        line_end: u32,
        complexity_score: f32,
    ) -> Self {
        let fully_qualified_name = fully_qualified_name.into();
        let kind_label = format!("{kind:?}");
        Self {
            id: EntityId::derive(repository_id, &fully_qualified_name, &kind_label),
            repository_id,
            name: name.into(),
            fully_qualified_name,
            kind,
            complexity_score: complexity_score.max(0.0),
            language: language.into(),
            file_path: file_path.into(),
            line_start,
            line_end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipKind {
    Calls,
    Uses,
    Inherits,
    Implements,
    DependsOn,
    Contains,
    References,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeRelationship {
    pub id: RelationshipId,
    pub repository_id: RepositoryId,
    pub source: EntityId,
    pub target: EntityId,
    pub kind: RelationshipKind,
    /// Frequency-normalized strength in [0, 1].
    pub weight: f32,
    /// 1.0 for symbol-resolved evidence, lower for name-match heuristics.
    pub confidence: f32,
}

impl CodeRelationship {
    pub fn new(repository_id: RepositoryId, source: EntityId, target: EntityId, kind: RelationshipKind) -> Self {
        Self::with_evidence(repository_id, source, target, kind, 1.0, 1.0)
    }

    pub fn with_evidence(
        repository_id: RepositoryId,
        source: EntityId,
        target: EntityId,
        kind: RelationshipKind,
        weight: f32,
        confidence: f32,
    ) -> Self {
        Self {
            id: RelationshipId::new(),
            repository_id,
            source,
            target,
            kind,
            weight: weight.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Derived: inheritance/implementation edges are always load-bearing to
    /// the architecture; everything else counts only above a weight floor.
    pub fn is_architectural(&self) -> bool {
        matches!(self.kind, RelationshipKind::Inherits | RelationshipKind::Implements) || self.weight >= 0.7
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitecturalPattern {
    pub id: PatternId,
    pub repository_id: RepositoryId,
    pub name: String,
    pub description: String,
    pub entities: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntiPattern {
    pub id: PatternId,
    pub repository_id: RepositoryId,
    pub name: String,
    pub description: String,
    pub severity: PatternSeverity,
    pub entities: Vec<EntityId>,
}

/// Bounds on `findRelationshipPath`'s BFS so it stays total over an
/// adversarially large or cyclic graph.
#[derive(Debug, Clone, Copy)]
pub struct RelationshipQueryConfig {
    pub max_depth: usize,
    pub max_visited_nodes: usize,
}

impl Default for RelationshipQueryConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_visited_nodes: 10_000,
        }
    }
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn add_entity(&self, entity: CodeEntity) -> Result<()>;

    async fn add_relationship(&self, relationship: CodeRelationship) -> Result<()>;

    async fn get_entity(&self, id: &EntityId) -> Result<CodeEntity>;

    async fn get_entities_by_repository(&self, repository_id: &RepositoryId) -> Result<Vec<CodeEntity>>;

    async fn get_relationships_by_repository(&self, repository_id: &RepositoryId) -> Result<Vec<CodeRelationship>>;

    async fn remove_repository(&self, repository_id: &RepositoryId) -> Result<usize>;

    /// Bounded BFS from `source` to `target`, returning the first shortest
    /// path found (by relationship-hop count) or `None` if unreachable
    /// within `config`'s bounds.
    async fn find_relationship_path(
        &self,
        source: &EntityId,
        target: &EntityId,
        config: RelationshipQueryConfig,
    ) -> Result<Option<Vec<EntityId>>>;

    async fn add_pattern(&self, pattern: ArchitecturalPattern) -> Result<()>;

    async fn add_anti_pattern(&self, anti_pattern: AntiPattern) -> Result<()>;

    async fn get_patterns(&self, repository_id: &RepositoryId) -> Result<Vec<ArchitecturalPattern>>;

    async fn get_anti_patterns(&self, repository_id: &RepositoryId) -> Result<Vec<AntiPattern>>;
}

#[derive(Default)]
pub struct PetgraphGraphStore {
    inner: RwLock<GraphInner>,
    patterns: DashMap<RepositoryId, Vec<ArchitecturalPattern>>,
    anti_patterns: DashMap<RepositoryId, Vec<AntiPattern>>,
}

#[derive(Default)]
struct GraphInner {
    graph: DiGraph<EntityId, RelationshipKind>,
    node_index: HashMap<EntityId, NodeIndex>,
    entities: HashMap<EntityId, CodeEntity>,
    by_repository: HashMap<RepositoryId, HashSet<EntityId>>,
    relationships: HashMap<RelationshipId, CodeRelationship>,
    relationships_by_repository: HashMap<RepositoryId, HashSet<RelationshipId>>,
}

impl GraphInner {
    fn ensure_node(&mut self, id: EntityId) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(id.clone());
        self.node_index.insert(id, idx);
        idx
    }
}

impl PetgraphGraphStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphStore for PetgraphGraphStore {
    async fn add_entity(&self, entity: CodeEntity) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ensure_node(entity.id.clone());
        inner
            .by_repository
            .entry(entity.repository_id)
            .or_default()
            .insert(entity.id.clone());
        inner.entities.insert(entity.id.clone(), entity);
        Ok(())
    }

    async fn add_relationship(&self, relationship: CodeRelationship) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.entities.contains_key(&relationship.source) {
            return Err(ArchieError::invalid_state(format!(
                "relationship source entity not found: {}",
                relationship.source
            )));
        }
        if !inner.entities.contains_key(&relationship.target) {
            return Err(ArchieError::invalid_state(format!(
                "relationship target entity not found: {}",
                relationship.target
            )));
        }
        let source = inner.ensure_node(relationship.source.clone());
        let target = inner.ensure_node(relationship.target.clone());
        inner.graph.add_edge(source, target, relationship.kind);
        inner
            .relationships_by_repository
            .entry(relationship.repository_id)
            .or_default()
            .insert(relationship.id);
        inner.relationships.insert(relationship.id, relationship);
        Ok(())
    }

    async fn get_entity(&self, id: &EntityId) -> Result<CodeEntity> {
        self.inner
            .read()
            .entities
            .get(id)
            .cloned()
            .ok_or_else(|| ArchieError::not_found(format!("entity not found: {id}")))
    }

    async fn get_entities_by_repository(&self, repository_id: &RepositoryId) -> Result<Vec<CodeEntity>> {
        let inner = self.inner.read();
        Ok(inner
            .by_repository
            .get(repository_id)
            .into_iter()
            .flatten()
            .filter_map(|id| inner.entities.get(id).cloned())
            .collect())
    }

    async fn get_relationships_by_repository(&self, repository_id: &RepositoryId) -> Result<Vec<CodeRelationship>> {
        let inner = self.inner.read();
        Ok(inner
            .relationships_by_repository
            .get(repository_id)
            .into_iter()
            .flatten()
            .filter_map(|id| inner.relationships.get(id).cloned())
            .collect())
    }

    async fn remove_repository(&self, repository_id: &RepositoryId) -> Result<usize> {
        let mut inner = self.inner.write();
        let Some(ids) = inner.by_repository.remove(repository_id) else {
            return Ok(0);
        };
        for id in &ids {
            inner.entities.remove(id);
            if let Some(idx) = inner.node_index.remove(id) {
                inner.graph.remove_node(idx);
            }
        }
        // `remove_node` swap-removes the last node into the freed slot, so
        // every remaining NodeIndex past the removed one may now be stale.
        // Rebuild the index from the graph's current node weights rather
        // than trust what was recorded before the removals above.
        inner.node_index = inner
            .graph
            .node_indices()
            .map(|idx| (inner.graph[idx].clone(), idx))
            .collect();
        if let Some(relationship_ids) = inner.relationships_by_repository.remove(repository_id) {
            for id in relationship_ids {
                inner.relationships.remove(&id);
            }
        }
        self.patterns.remove(repository_id);
        self.anti_patterns.remove(repository_id);
        Ok(ids.len())
    }

    async fn find_relationship_path(
        &self,
        source: &EntityId,
        target: &EntityId,
        config: RelationshipQueryConfig,
    ) -> Result<Option<Vec<EntityId>>> {
        let inner = self.inner.read();
        let (Some(&start), Some(&goal)) = (inner.node_index.get(source), inner.node_index.get(target)) else {
            return Ok(None);
        };

        if start == goal {
            return Ok(Some(vec![source.clone()]));
        }

        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back((start, vec![start]));
        visited.insert(start);

        while let Some((node, path)) = queue.pop_front() {
            if visited.len() > config.max_visited_nodes {
                break;
            }
            if path.len() > config.max_depth {
                continue;
            }
            for edge in inner.graph.edges(node) {
                let next = edge.target();
                if next == goal {
                    let mut full_path = path.clone();
                    full_path.push(next);
                    let entity_path = full_path
                        .into_iter()
                        .map(|idx| inner.graph[idx].clone())
                        .collect();
                    return Ok(Some(entity_path));
                }
                if visited.insert(next) && path.len() < config.max_depth {
                    let mut next_path = path.clone();
                    next_path.push(next);
                    queue.push_back((next, next_path));
                }
            }
        }

        Ok(None)
    }

    async fn add_pattern(&self, pattern: ArchitecturalPattern) -> Result<()> {
        self.patterns.entry(pattern.repository_id).or_default().push(pattern);
        Ok(())
    }

    async fn add_anti_pattern(&self, anti_pattern: AntiPattern) -> Result<()> {
        self.anti_patterns
            .entry(anti_pattern.repository_id)
            .or_default()
            .push(anti_pattern);
        Ok(())
    }

    async fn get_patterns(&self, repository_id: &RepositoryId) -> Result<Vec<ArchitecturalPattern>> {
        Ok(self
            .patterns
            .get(repository_id)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }

    async fn get_anti_patterns(&self, repository_id: &RepositoryId) -> Result<Vec<AntiPattern>> {
        Ok(self
            .anti_patterns
            .get(repository_id)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }
}
