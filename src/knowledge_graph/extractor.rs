// Tree-sitter-backed entity/relationship extraction consumed by
// `KnowledgeGraphBuilder`. Surface/Standard/Deep control how much of a
// file's symbol tree becomes entities and how relationships are inferred.

use crate::error::{ArchieError, Result};
use crate::graph::{CodeEntity, EntityKind, RelationshipKind};
use crate::parsing::{CodeParser, ParsedSymbol, SupportedLanguage, SymbolType};
use crate::types::RepositoryId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisDepth {
    /// Top-level declarations only.
    Surface,
    /// Adds member-level symbols and first-order references (imports).
    Standard,
    /// Adds heuristic transitive call relationships within a file.
    Deep,
}

impl Default for AnalysisDepth {
    fn default() -> Self {
        AnalysisDepth::Standard
    }
}

/// A relationship discovered during extraction, still addressed by the
/// textual names of its endpoints. `KnowledgeGraphBuilder` resolves these
/// to `EntityId`s once every file in the batch has been extracted, since a
/// relationship's target may live in a file that hasn't been parsed yet.
#[derive(Debug, Clone)]
pub struct RelationshipHint {
    pub source_fqn: String,
    pub target_fqn: String,
    pub kind: RelationshipKind,
    pub weight: f32,
    pub confidence: f32,
}

fn entity_kind_for(symbol_type: &SymbolType) -> Option<EntityKind> {
    match symbol_type {
        SymbolType::Function => Some(EntityKind::Function),
        SymbolType::Method => Some(EntityKind::Method),
        SymbolType::Class => Some(EntityKind::Class),
        SymbolType::Struct => Some(EntityKind::Struct),
        SymbolType::Interface => Some(EntityKind::Interface),
        SymbolType::Enum => Some(EntityKind::Enum),
        SymbolType::Variable => Some(EntityKind::Variable),
        SymbolType::Constant => Some(EntityKind::Field),
        SymbolType::Module => Some(EntityKind::Module),
        SymbolType::Import | SymbolType::Comment | SymbolType::Other(_) => None,
    }
}

/// Whether `depth` admits a symbol of this type: Surface keeps only
/// module-level declarations; Standard and Deep keep everything but
/// comments (imports become `DependsOn` hints rather than entities).
fn admits(depth: AnalysisDepth, symbol_type: &SymbolType) -> bool {
    match depth {
        AnalysisDepth::Surface => matches!(
            symbol_type,
            SymbolType::Function
                | SymbolType::Class
                | SymbolType::Struct
                | SymbolType::Interface
                | SymbolType::Enum
                | SymbolType::Module
        ),
        AnalysisDepth::Standard | AnalysisDepth::Deep => !matches!(symbol_type, SymbolType::Comment),
    }
}

/// Parse one file's content and produce the entities/relationship hints it
/// contributes to the knowledge graph. Every file becomes a `File` entity;
/// its declarations become child entities linked to it by `Contains`.
pub fn extract_from_file(
    parser: &mut CodeParser,
    repository_id: RepositoryId,
    file_path: &str,
    language: SupportedLanguage,
    content: &str,
    depth: AnalysisDepth,
) -> Result<(Vec<CodeEntity>, Vec<RelationshipHint>)> {
    let parsed = parser
        .parse_content(content, language)
        .map_err(|e| ArchieError::internal(format!("failed to parse {file_path}: {e}")))?;

    let mut entities = Vec::new();
    let mut hints = Vec::new();

    let module_fqn = file_path.to_string();
    entities.push(CodeEntity::with_complexity(
        repository_id,
        file_path,
        module_fqn.clone(),
        EntityKind::File,
        language.name(),
        file_path,
        1,
        content.lines().count() as u32,
        0.0,
    ));

    for symbol in &parsed.symbols {
        if !admits(depth, &symbol.symbol_type) {
            continue;
        }

        if matches!(symbol.symbol_type, SymbolType::Import) {
            hints.push(RelationshipHint {
                source_fqn: module_fqn.clone(),
                target_fqn: symbol.name.clone(),
                kind: RelationshipKind::DependsOn,
                weight: 0.5,
                confidence: 0.6,
            });
            continue;
        }

        let Some(kind) = entity_kind_for(&symbol.symbol_type) else {
            continue;
        };

        let fqn = format!("{file_path}::{}", symbol.name);
        let complexity = (symbol.end_line.saturating_sub(symbol.start_line) + 1) as f32;
        entities.push(CodeEntity::with_complexity(
            repository_id,
            symbol.name.clone(),
            fqn.clone(),
            kind,
            language.name(),
            file_path,
            symbol.start_line as u32,
            symbol.end_line as u32,
            complexity,
        ));

        hints.push(RelationshipHint {
            source_fqn: module_fqn.clone(),
            target_fqn: fqn,
            kind: RelationshipKind::Contains,
            weight: 1.0,
            confidence: 1.0,
        });
    }

    if matches!(depth, AnalysisDepth::Deep) {
        hints.extend(infer_call_hints(&parsed.symbols, file_path));
    }

    Ok((entities, hints))
}

/// Deep analysis only: a crude heuristic linking a function/method to any
/// other callable in the same file whose name appears as a call in its
/// body text. Name-match evidence, so confidence is capped well below 1.0.
fn infer_call_hints(symbols: &[ParsedSymbol], file_path: &str) -> Vec<RelationshipHint> {
    let mut hints = Vec::new();
    let callable: Vec<&ParsedSymbol> = symbols
        .iter()
        .filter(|s| matches!(s.symbol_type, SymbolType::Function | SymbolType::Method))
        .collect();

    for caller in &callable {
        for callee in &callable {
            if std::ptr::eq(*caller, *callee) {
                continue;
            }
            if caller.text.contains(&format!("{}(", callee.name)) {
                hints.push(RelationshipHint {
                    source_fqn: format!("{file_path}::{}", caller.name),
                    target_fqn: format!("{file_path}::{}", callee.name),
                    kind: RelationshipKind::Calls,
                    weight: 0.6,
                    confidence: 0.5,
                });
            }
        }
    }
    hints
}
