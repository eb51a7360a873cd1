//! Paragraph-bounded chunker.
//!
//! Splits on blank-line boundaries to preserve semantic coherence, merges
//! short paragraphs up to `max_words`, and splits oversized paragraphs on
//! sentence boundaries.

use crate::models::{Chunk, ChunkMetadata};

use super::{count_words, finalize, word_spans, TextChunker};

pub struct ParagraphChunker {
    max_words: usize,
}

impl ParagraphChunker {
    pub fn new(max_words: usize) -> Self {
        Self {
            max_words: max_words.max(1),
        }
    }

    /// Chunk a slice of the source, reporting offsets relative to `base`.
    /// Used directly and by the argument-aware chunker for delegated
    /// sections.
    pub(crate) fn chunk_at(
        &self,
        text: &str,
        base: usize,
        metadata: &ChunkMetadata,
    ) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        // Merge buffer: span of accumulated paragraphs plus joined text.
        let mut buf_text = String::new();
        let mut buf_span: Option<(usize, usize)> = None;
        let mut buf_words = 0usize;

        let mut flush =
            |chunks: &mut Vec<Chunk>, buf_text: &mut String, buf_span: &mut Option<(usize, usize)>, buf_words: &mut usize| {
                if let Some((start, end)) = buf_span.take() {
                    chunks.push(Chunk {
                        position: chunks.len(),
                        text: std::mem::take(buf_text),
                        start_offset: base + start,
                        end_offset: base + end,
                        metadata: metadata.clone(),
                    });
                    *buf_words = 0;
                }
            };

        for (para_start, para_end) in paragraph_spans(text) {
            let para = &text[para_start..para_end];
            let words = count_words(para);

            if words > self.max_words {
                // Oversized paragraph: flush the buffer, then split the
                // paragraph by sentence boundaries.
                flush(&mut chunks, &mut buf_text, &mut buf_span, &mut buf_words);
                for (piece_start, piece_end) in
                    sentence_pieces(para, self.max_words)
                {
                    chunks.push(Chunk {
                        position: chunks.len(),
                        text: para[piece_start..piece_end].to_string(),
                        start_offset: base + para_start + piece_start,
                        end_offset: base + para_start + piece_end,
                        metadata: metadata.clone(),
                    });
                }
                continue;
            }

            if buf_words + words > self.max_words && buf_span.is_some() {
                flush(&mut chunks, &mut buf_text, &mut buf_span, &mut buf_words);
            }

            match buf_span {
                Some((start, _)) => {
                    buf_text.push_str("\n\n");
                    buf_text.push_str(para);
                    buf_span = Some((start, para_end));
                }
                None => {
                    buf_text.push_str(para);
                    buf_span = Some((para_start, para_end));
                }
            }
            buf_words += words;
        }

        flush(&mut chunks, &mut buf_text, &mut buf_span, &mut buf_words);
        chunks
    }
}

impl TextChunker for ParagraphChunker {
    fn chunk(&self, text: &str, metadata: &ChunkMetadata) -> Vec<Chunk> {
        finalize(self.chunk_at(text, 0, metadata))
    }
}

/// Byte spans of non-empty paragraphs, split on blank-line boundaries.
pub(crate) fn paragraph_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut offset = 0;
    for part in text.split("\n\n") {
        let trimmed = part.trim();
        if !trimmed.is_empty() {
            let lead = part.len() - part.trim_start().len();
            let start = offset + lead;
            spans.push((start, start + trimmed.len()));
        }
        offset += part.len() + 2;
    }
    spans
}

/// Byte spans of sentences within `text`, ending at `.`, `!`, or `?`
/// followed by whitespace (or end of text).
pub(crate) fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') {
            let at_boundary = match chars.peek() {
                Some(&(_, next)) => next.is_whitespace(),
                None => true,
            };
            if at_boundary {
                let end = i + ch.len_utf8();
                if let Some(span) = trim_span(text, start, end) {
                    spans.push(span);
                }
                start = end;
            }
        }
    }

    if let Some(span) = trim_span(text, start, text.len()) {
        spans.push(span);
    }
    spans
}

/// Group sentences into pieces of at most `max_words` words. A single
/// sentence longer than the budget is hard-split by word windows.
fn sentence_pieces(text: &str, max_words: usize) -> Vec<(usize, usize)> {
    let mut pieces = Vec::new();
    let mut piece: Option<(usize, usize)> = None;
    let mut piece_words = 0usize;

    for (s_start, s_end) in sentence_spans(text) {
        let words = count_words(&text[s_start..s_end]);

        if words > max_words {
            if let Some(span) = piece.take() {
                pieces.push(span);
                piece_words = 0;
            }
            // Hard split: non-overlapping word windows.
            let sentence = &text[s_start..s_end];
            let spans = word_spans(sentence);
            let mut i = 0;
            while i < spans.len() {
                let end = (i + max_words).min(spans.len());
                pieces.push((s_start + spans[i].0, s_start + spans[end - 1].1));
                i = end;
            }
            continue;
        }

        match piece {
            Some((start, _)) if piece_words + words <= max_words => {
                piece = Some((start, s_end));
                piece_words += words;
            }
            Some(span) => {
                pieces.push(span);
                piece = Some((s_start, s_end));
                piece_words = words;
            }
            None => {
                piece = Some((s_start, s_end));
                piece_words = words;
            }
        }
    }

    if let Some(span) = piece {
        pieces.push(span);
    }
    pieces
}

fn trim_span(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let slice = &text[start..end];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lead = slice.len() - slice.trim_start().len();
    Some((start + lead, start + lead + trimmed.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::MIN_CHUNK_WORDS;

    fn sentence(i: usize, words: usize) -> String {
        let mut s = format!("Sentence {i} begins here");
        for w in 0..words.saturating_sub(4) {
            s.push_str(&format!(" filler{w}"));
        }
        s.push('.');
        s
    }

    fn paragraph(id: usize, sentences: usize, words_each: usize) -> String {
        (0..sentences)
            .map(|i| sentence(id * 100 + i, words_each))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunker = ParagraphChunker::new(300);
        assert!(chunker.chunk("", &ChunkMetadata::default()).is_empty());
        assert!(chunker.chunk("\n\n\n\n", &ChunkMetadata::default()).is_empty());
    }

    #[test]
    fn short_paragraphs_merge_into_one_chunk() {
        let text = format!(
            "{}\n\n{}\n\n{}",
            paragraph(1, 2, 10),
            paragraph(2, 2, 10),
            paragraph(3, 2, 10)
        );
        let chunker = ParagraphChunker::new(300);
        let chunks = chunker.chunk(&text, &ChunkMetadata::default());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("Sentence 100"));
        assert!(chunks[0].text.contains("Sentence 300"));
    }

    #[test]
    fn merge_respects_max_words() {
        let text = format!(
            "{}\n\n{}\n\n{}\n\n{}",
            paragraph(1, 3, 10),
            paragraph(2, 3, 10),
            paragraph(3, 3, 10),
            paragraph(4, 3, 10)
        );
        // Each paragraph is ~30 words; two fit in a 60-word budget.
        let chunker = ParagraphChunker::new(60);
        let chunks = chunker.chunk(&text, &ChunkMetadata::default());
        assert_eq!(chunks.len(), 2);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.position, i);
        }
    }

    #[test]
    fn oversized_paragraph_splits_on_sentences() {
        let text = paragraph(1, 10, 25); // ~250 words in one paragraph
        let chunker = ParagraphChunker::new(60);
        let chunks = chunker.chunk(&text, &ChunkMetadata::default());
        assert!(chunks.len() > 1);
        // Sentence-boundary splits: every chunk ends with a period.
        for c in &chunks {
            assert!(c.text.ends_with('.'), "chunk not sentence-aligned: {:?}", c.text);
        }
    }

    #[test]
    fn merged_chunk_offsets_cover_source_span() {
        let text = format!("{}\n\n{}", paragraph(1, 2, 15), paragraph(2, 2, 15));
        let chunker = ParagraphChunker::new(300);
        let chunks = chunker.chunk(&text, &ChunkMetadata::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].end_offset, text.len());
    }

    #[test]
    fn below_minimum_word_count_is_dropped() {
        let text = "Just a few words here."; // < MIN_CHUNK_WORDS
        assert!(count_words(text) < MIN_CHUNK_WORDS);
        let chunker = ParagraphChunker::new(300);
        assert!(chunker.chunk(text, &ChunkMetadata::default()).is_empty());
    }

    #[test]
    fn sentence_spans_split_on_terminators() {
        let text = "One two. Three four! Five six? Seven";
        let spans = sentence_spans(text);
        let sentences: Vec<&str> = spans.iter().map(|&(s, e)| &text[s..e]).collect();
        assert_eq!(sentences, vec!["One two.", "Three four!", "Five six?", "Seven"]);
    }

    #[test]
    fn abbreviation_mid_word_does_not_split() {
        let text = "Version 1.5 shipped. Done";
        let spans = sentence_spans(text);
        let sentences: Vec<&str> = spans.iter().map(|&(s, e)| &text[s..e]).collect();
        assert_eq!(sentences, vec!["Version 1.5 shipped.", "Done"]);
    }

    #[test]
    fn rechunking_is_idempotent() {
        let text = format!("{}\n\n{}", paragraph(1, 8, 20), paragraph(2, 8, 20));
        let chunker = ParagraphChunker::new(80);
        let a = chunker.chunk(&text, &ChunkMetadata::default());
        let b = chunker.chunk(&text, &ChunkMetadata::default());
        assert_eq!(a, b);
    }
}
