// Deterministic content chunker used by the ingestion pipeline before
// embedding (step 5 of the indexing algorithm). Word-count is used as a
// cheap, dependency-free proxy for token count.

use crate::error::{ArchieError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    pub index: usize,
    pub text: String,
    pub start_word: usize,
    pub end_word: usize,
}

/// Split `bytes` into overlapping chunks of at most `max_tokens` words,
/// with `overlap` words repeated between consecutive chunks.
///
/// Deterministic: identical `(bytes, max_tokens, overlap)` always yields
/// the identical sequence of chunks — no wall-clock, no randomness, no
/// shared state.
pub fn chunk_text(bytes: &[u8], max_tokens: usize, overlap: usize) -> Result<Vec<TextChunk>> {
    if max_tokens == 0 {
        return Err(ArchieError::invalid_input("max_tokens must be greater than zero"));
    }
    if overlap >= max_tokens {
        return Err(ArchieError::invalid_input("overlap must be smaller than max_tokens"));
    }

    let text = String::from_utf8_lossy(bytes);

    let word_spans: Vec<(usize, usize)> = {
        let mut spans = Vec::new();
        let mut word_start: Option<usize> = None;
        for (byte_index, ch) in text.char_indices() {
            if ch.is_whitespace() {
                if let Some(start) = word_start.take() {
                    spans.push((start, byte_index));
                }
            } else if word_start.is_none() {
                word_start = Some(byte_index);
            }
        }
        if let Some(start) = word_start {
            spans.push((start, text.len()));
        }
        spans
    };

    if word_spans.is_empty() {
        return Ok(Vec::new());
    }

    let step = max_tokens - overlap;
    let mut chunks = Vec::new();
    let mut start_word = 0;
    let mut index = 0;

    while start_word < word_spans.len() {
        let end_word = (start_word + max_tokens).min(word_spans.len());
        let byte_start = word_spans[start_word].0;
        let byte_end = word_spans[end_word - 1].1;

        chunks.push(TextChunk {
            index,
            text: text[byte_start..byte_end].to_string(),
            start_word,
            end_word,
        });

        index += 1;
        if end_word == word_spans.len() {
            break;
        }
        start_word += step;
    }

    Ok(chunks)
}
