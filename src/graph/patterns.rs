// Pluggable detectors for architectural patterns and anti-patterns.
// KnowledgeGraphBuilder::detectArchitecturalPatterns/detectAntiPatterns run
// every registered matcher over a repository's entities/relationships and
// collect what fires.

use super::{AntiPattern, ArchitecturalPattern, CodeEntity, CodeRelationship, PatternSeverity};
use crate::types::{PatternId, RepositoryId};
use std::collections::HashMap;

pub trait PatternMatcher: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(
        &self,
        repository_id: RepositoryId,
        entities: &[CodeEntity],
        relationships: &[CodeRelationship],
    ) -> Vec<ArchitecturalPattern>;
}

pub trait AntiPatternMatcher: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(
        &self,
        repository_id: RepositoryId,
        entities: &[CodeEntity],
        relationships: &[CodeRelationship],
    ) -> Vec<AntiPattern>;
}

/// Flags a layered architecture when entity names suggest the familiar
/// controller/service/repository split.
pub struct LayeredArchitectureMatcher;

impl PatternMatcher for LayeredArchitectureMatcher {
    fn name(&self) -> &'static str {
        "layered_architecture"
    }

    fn detect(
        &self,
        repository_id: RepositoryId,
        entities: &[CodeEntity],
        _relationships: &[CodeRelationship],
    ) -> Vec<ArchitecturalPattern> {
        const LAYER_MARKERS: &[&str] = &["controller", "service", "repository", "handler"];

        let matches: Vec<_> = entities
            .iter()
            .filter(|e| {
                let lowered = e.fully_qualified_name.to_lowercase();
                LAYER_MARKERS.iter().any(|marker| lowered.contains(marker))
            })
            .collect();

        if matches.len() < 2 {
            return Vec::new();
        }

        vec![ArchitecturalPattern {
            id: PatternId::new(),
            repository_id,
            name: "Layered Architecture".into(),
            description: "controller/service/repository-shaped module names detected".into(),
            entities: matches.into_iter().map(|e| e.id.clone()).collect(),
        }]
    }
}

/// Flags an entity with an unusually high fan-out of outgoing relationships
/// as a god-object anti-pattern.
pub struct GodObjectMatcher {
    pub fan_out_threshold: usize,
}

impl Default for GodObjectMatcher {
    fn default() -> Self {
        Self { fan_out_threshold: 20 }
    }
}

impl AntiPatternMatcher for GodObjectMatcher {
    fn name(&self) -> &'static str {
        "god_object"
    }

    fn detect(
        &self,
        repository_id: RepositoryId,
        _entities: &[CodeEntity],
        relationships: &[CodeRelationship],
    ) -> Vec<AntiPattern> {
        let mut fan_out: HashMap<_, usize> = HashMap::new();
        for relationship in relationships {
            *fan_out.entry(relationship.source.clone()).or_insert(0) += 1;
        }

        fan_out
            .into_iter()
            .filter(|(_, count)| *count > self.fan_out_threshold)
            .map(|(entity_id, count)| AntiPattern {
                id: PatternId::new(),
                repository_id,
                name: "God Object".into(),
                description: format!("entity has {count} outgoing relationships, exceeding the fan-out threshold"),
                severity: PatternSeverity::Warning,
                entities: vec![entity_id],
            })
            .collect()
    }
}

/// Runs every registered matcher over a repository's graph slice.
#[derive(Default)]
pub struct PatternRegistry {
    pattern_matchers: Vec<Box<dyn PatternMatcher>>,
    anti_pattern_matchers: Vec<Box<dyn AntiPatternMatcher>>,
}

impl PatternRegistry {
    pub fn with_defaults() -> Self {
        Self {
            pattern_matchers: vec![Box::new(LayeredArchitectureMatcher)],
            anti_pattern_matchers: vec![Box::new(GodObjectMatcher::default())],
        }
    }

    pub fn register_pattern(&mut self, matcher: Box<dyn PatternMatcher>) {
        self.pattern_matchers.push(matcher);
    }

    pub fn register_anti_pattern(&mut self, matcher: Box<dyn AntiPatternMatcher>) {
        self.anti_pattern_matchers.push(matcher);
    }

    pub fn detect_patterns(
        &self,
        repository_id: RepositoryId,
        entities: &[CodeEntity],
        relationships: &[CodeRelationship],
    ) -> Vec<ArchitecturalPattern> {
        self.pattern_matchers
            .iter()
            .flat_map(|matcher| matcher.detect(repository_id, entities, relationships))
            .collect()
    }

    pub fn detect_anti_patterns(
        &self,
        repository_id: RepositoryId,
        entities: &[CodeEntity],
        relationships: &[CodeRelationship],
    ) -> Vec<AntiPattern> {
        self.anti_pattern_matchers
            .iter()
            .flat_map(|matcher| matcher.detect(repository_id, entities, relationships))
            .collect()
    }
}
