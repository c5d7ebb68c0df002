// Embedder contract — turns text chunks into dense vectors for semantic
// search. Production implementations call out to a hosted embedding model;
// the in-memory reference here is deterministic so tests don't depend on a
// network call or a model's actual output.

use crate::error::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

pub const EMBEDDING_DIMENSIONS: usize = 32;

/// Produces embedding vectors for batches of text. Implementations are
/// expected to internally bound their own concurrency; callers additionally
/// gate calls behind `IngestionConfig::embedder_concurrency` permits.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimensions(&self) -> usize;
}

/// A deterministic embedder: each text is hashed into a fixed-size vector.
/// Not semantically meaningful, but stable — identical input always yields
/// the identical vector, which is what the pipeline's tests need.
pub struct InMemoryEmbedder {
    dimensions: usize,
}

impl InMemoryEmbedder {
    pub fn new() -> Self {
        Self {
            dimensions: EMBEDDING_DIMENSIONS,
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let digest = hasher.finalize();

        (0..self.dimensions)
            .map(|i| {
                let byte = digest[i % digest.len()];
                (byte as f32 / 255.0) * 2.0 - 1.0
            })
            .collect()
    }
}

impl Default for InMemoryEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for InMemoryEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Cosine similarity between two equal-length vectors. Returns 0.0 for a
/// zero-length or zero-norm vector rather than dividing by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
