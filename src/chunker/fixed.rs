//! Fixed-window chunker: a sliding word-count window with configurable
//! overlap. Stride = window − overlap; the final window shrinks to cover
//! the remaining words rather than running past the end of the text.

use crate::models::{Chunk, ChunkMetadata};

use super::{finalize, word_spans, TextChunker};

pub struct FixedWindowChunker {
    chunk_size: usize,
    overlap: usize,
}

impl FixedWindowChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            overlap,
        }
    }

    fn stride(&self) -> usize {
        self.chunk_size.saturating_sub(self.overlap).max(1)
    }
}

impl TextChunker for FixedWindowChunker {
    fn chunk(&self, text: &str, metadata: &ChunkMetadata) -> Vec<Chunk> {
        let spans = word_spans(text);
        if spans.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(spans.len());
            let (byte_start, _) = spans[start];
            let (_, byte_end) = spans[end - 1];
            chunks.push(Chunk {
                position: chunks.len(),
                text: text[byte_start..byte_end].to_string(),
                start_offset: byte_start,
                end_offset: byte_end,
                metadata: metadata.clone(),
            });
            if end == spans.len() {
                break;
            }
            start += self.stride();
        }

        finalize(chunks)
    }
}
