//! Text chunking strategies.
//!
//! A [`TextChunker`] splits raw document text into ordered, positioned,
//! metadata-carrying [`Chunk`]s. Every implementation guarantees:
//!
//! - chunks cover the source text without fabricating content,
//! - chunks below [`MIN_CHUNK_WORDS`] words are dropped,
//! - positions are reassigned sequentially after filtering so they stay
//!   contiguous from 0.
//!
//! Chunking never fails for well-formed UTF-8 text; empty input yields an
//! empty sequence.

mod argument;
mod fixed;
mod paragraph;

pub use argument::ArgumentChunker;
pub use fixed::FixedWindowChunker;
pub use paragraph::ParagraphChunker;

use crate::config::ChunkingConfig;
use crate::models::{Chunk, ChunkMetadata};

/// Chunks shorter than this many words are dropped after splitting.
pub const MIN_CHUNK_WORDS: usize = 20;

/// Splits text into ordered chunks. The returned sequence is finite and
/// fully materialized; calling `chunk` again with identical input yields an
/// identical sequence.
pub trait TextChunker: Send + Sync {
    fn chunk(&self, text: &str, metadata: &ChunkMetadata) -> Vec<Chunk>;
}

/// Build the chunker named by the configuration's `strategy`.
pub fn chunker_for(config: &ChunkingConfig) -> Box<dyn TextChunker> {
    match config.strategy.as_str() {
        "fixed" => Box::new(FixedWindowChunker::new(
            config.chunk_size,
            config.chunk_overlap,
        )),
        "argument" => Box::new(ArgumentChunker::new(
            config.chunk_size,
            config.chunk_overlap,
        )),
        _ => Box::new(ParagraphChunker::new(config.chunk_size)),
    }
}

/// Byte spans of whitespace-separated words in `text`.
pub(crate) fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

pub(crate) fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Drop chunks under the minimum word count and renumber the survivors.
pub(crate) fn finalize(mut chunks: Vec<Chunk>) -> Vec<Chunk> {
    chunks.retain(|c| count_words(&c.text) >= MIN_CHUNK_WORDS);
    for (i, c) in chunks.iter_mut().enumerate() {
        c.position = i;
    }
    chunks
}
