//! Argument-aware chunker for discursive texts.
//!
//! Partitions the text by structural markers (numbered or roman-numeral
//! section headings). Within a section, passages carrying discourse markers
//! (therefore / thus / however / for example) are kept intact up to the
//! word budget, or split on conclusion markers so a premise stays with its
//! conclusion; sections without discourse markers fall back to
//! paragraph-bounded chunking.
//!
//! After assembly, a bounded overlap excerpt from each neighbor is injected
//! into adjacent chunk text (half the overlap budget per side for interior
//! chunks, the full budget at the ends). The stored chunk text is therefore
//! not a verbatim substring of the source; `start_offset`/`end_offset`
//! still describe the core span.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::{Chunk, ChunkMetadata};

use super::paragraph::{sentence_spans, ParagraphChunker};
use super::{count_words, finalize, word_spans, TextChunker};

pub struct ArgumentChunker {
    max_words: usize,
    overlap_words: usize,
    paragraph: ParagraphChunker,
}

fn section_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*(?:\d+|[IVXLCDM]+)[.)][ \t]+\S").expect("static regex")
    })
}

fn discourse_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:therefore|thus|however|for example)\b").expect("static regex")
    })
}

fn conclusion_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:therefore|thus|hence)\b").expect("static regex"))
}

impl ArgumentChunker {
    pub fn new(max_words: usize, overlap_words: usize) -> Self {
        Self {
            max_words: max_words.max(1),
            overlap_words,
            paragraph: ParagraphChunker::new(max_words.max(1)),
        }
    }

    /// Split the text at structural section markers. Returns (label, span)
    /// pairs; a text without markers is one unlabeled section.
    fn sections<'t>(&self, text: &'t str) -> Vec<(Option<String>, usize, usize)> {
        let starts: Vec<usize> = section_marker_re().find_iter(text).map(|m| m.start()).collect();
        if starts.is_empty() {
            return vec![(None, 0, text.len())];
        }

        let mut sections = Vec::new();
        if starts[0] > 0 {
            sections.push((None, 0, starts[0]));
        }
        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            let label = text[start..end]
                .split_whitespace()
                .next()
                .map(|s| s.trim_end_matches(['.', ')']).to_string());
            sections.push((label, start, end));
        }
        sections
    }

    /// Chunk one section that carries discourse markers: keep it intact if
    /// it fits the budget, otherwise cut after sentences containing a
    /// conclusion marker (or when the budget runs out).
    fn chunk_argumentative(
        &self,
        text: &str,
        base: usize,
        metadata: &ChunkMetadata,
    ) -> Vec<Chunk> {
        if count_words(text) <= self.max_words {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Vec::new();
            }
            let lead = text.len() - text.trim_start().len();
            return vec![Chunk {
                position: 0,
                text: trimmed.to_string(),
                start_offset: base + lead,
                end_offset: base + lead + trimmed.len(),
                metadata: metadata.clone(),
            }];
        }

        let mut chunks = Vec::new();
        let mut group: Option<(usize, usize)> = None;
        let mut group_words = 0usize;

        let mut emit = |chunks: &mut Vec<Chunk>, span: (usize, usize)| {
            chunks.push(Chunk {
                position: chunks.len(),
                text: text[span.0..span.1].to_string(),
                start_offset: base + span.0,
                end_offset: base + span.1,
                metadata: metadata.clone(),
            });
        };

        for (s_start, s_end) in sentence_spans(text) {
            let sentence = &text[s_start..s_end];
            let words = count_words(sentence);

            if group_words > 0 && group_words + words > self.max_words {
                if let Some(span) = group.take() {
                    emit(&mut chunks, span);
                }
                group_words = 0;
            }

            group = match group {
                Some((start, _)) => Some((start, s_end)),
                None => Some((s_start, s_end)),
            };
            group_words += words;

            // A conclusion closes the premise group.
            if conclusion_marker_re().is_match(sentence) {
                if let Some(span) = group.take() {
                    emit(&mut chunks, span);
                }
                group_words = 0;
            }
        }

        if let Some(span) = group {
            emit(&mut chunks, span);
        }
        chunks
    }

    /// Inject neighbor overlap into each chunk's text. Interior chunks get
    /// half the budget from each side; the first and last chunks get the
    /// full budget from their single neighbor.
    fn inject_overlap(&self, chunks: &mut [Chunk]) {
        if self.overlap_words == 0 || chunks.len() < 2 {
            return;
        }
        let originals: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let last = chunks.len() - 1;

        for (i, chunk) in chunks.iter_mut().enumerate() {
            let prefix_budget = if i == 0 {
                0
            } else if i == last {
                self.overlap_words
            } else {
                self.overlap_words / 2
            };
            let suffix_budget = if i == last {
                0
            } else if i == 0 {
                self.overlap_words
            } else {
                self.overlap_words / 2
            };

            let mut text = String::new();
            if prefix_budget > 0 {
                let tail = tail_words(&originals[i - 1], prefix_budget);
                if !tail.is_empty() {
                    text.push_str(tail);
                    text.push(' ');
                }
            }
            text.push_str(&originals[i]);
            if suffix_budget > 0 {
                let head = head_words(&originals[i + 1], suffix_budget);
                if !head.is_empty() {
                    text.push(' ');
                    text.push_str(head);
                }
            }
            chunk.text = text;
        }
    }
}

impl TextChunker for ArgumentChunker {
    fn chunk(&self, text: &str, metadata: &ChunkMetadata) -> Vec<Chunk> {
        let mut assembled = Vec::new();

        for (label, start, end) in self.sections(text) {
            let section = &text[start..end];
            let mut section_meta = metadata.clone();
            section_meta.section = label;

            let mut chunks = if discourse_marker_re().is_match(section) {
                self.chunk_argumentative(section, start, &section_meta)
            } else {
                self.paragraph.chunk_at(section, start, &section_meta)
            };
            assembled.append(&mut chunks);
        }

        let mut chunks = finalize(assembled);
        self.inject_overlap(&mut chunks);
        chunks
    }
}

fn head_words(text: &str, n: usize) -> &str {
    let spans = word_spans(text);
    if spans.is_empty() || n == 0 {
        return "";
    }
    let end = spans[(n - 1).min(spans.len() - 1)].1;
    &text[spans[0].0..end]
}

fn tail_words(text: &str, n: usize) -> &str {
    let spans = word_spans(text);
    if spans.is_empty() || n == 0 {
        return "";
    }
    let start = spans[spans.len().saturating_sub(n)].0;
    &text[start..spans[spans.len() - 1].1]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filler_sentence(tag: &str, words: usize) -> String {
        let mut s = format!("The {tag} point stands on its own");
        for w in 0..words.saturating_sub(7) {
            s.push_str(&format!(" filler{w}"));
        }
        s.push('.');
        s
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunker = ArgumentChunker::new(200, 20);
        assert!(chunker.chunk("", &ChunkMetadata::default()).is_empty());
    }

    #[test]
    fn sections_detected_from_numbered_headings() {
        let text = format!(
            "1. {}\n\n2. {}",
            filler_sentence("first", 30),
            filler_sentence("second", 30)
        );
        let chunker = ArgumentChunker::new(200, 0);
        let chunks = chunker.chunk(&text, &ChunkMetadata::default());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.section.as_deref(), Some("1"));
        assert_eq!(chunks[1].metadata.section.as_deref(), Some("2"));
    }

    #[test]
    fn roman_numeral_headings_partition_sections() {
        let text = format!(
            "II. {}\n\nIII. {}",
            filler_sentence("second", 30),
            filler_sentence("third", 30)
        );
        let chunker = ArgumentChunker::new(200, 0);
        let chunks = chunker.chunk(&text, &ChunkMetadata::default());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.section.as_deref(), Some("II"));
    }

    #[test]
    fn discourse_passage_kept_intact_within_budget() {
        let text = format!(
            "{} However, the objection fails. {}",
            filler_sentence("first", 25),
            filler_sentence("second", 25)
        );
        let chunker = ArgumentChunker::new(200, 0);
        let chunks = chunker.chunk(&text, &ChunkMetadata::default());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("However"));
    }

    #[test]
    fn conclusion_marker_closes_a_group() {
        let premise_a = filler_sentence("first", 30);
        let premise_b = filler_sentence("second", 30);
        let conclusion = "Therefore the argument holds in every relevant case we examined.";
        let follow_on = filler_sentence("third", 40);
        let text = format!("{premise_a} {premise_b} {conclusion} {follow_on}");

        // Budget below total so the passage cannot stay intact.
        let chunker = ArgumentChunker::new(80, 0);
        let chunks = chunker.chunk(&text, &ChunkMetadata::default());
        assert_eq!(chunks.len(), 2);
        // Premises and their conclusion stay together.
        assert!(chunks[0].text.contains("Therefore the argument holds"));
        assert!(chunks[1].text.contains("third point"));
    }

    #[test]
    fn plain_sections_delegate_to_paragraph_chunking() {
        let text = format!(
            "{}\n\n{}",
            filler_sentence("first", 30),
            filler_sentence("second", 30)
        );
        let chunker = ArgumentChunker::new(40, 0);
        let chunks = chunker.chunk(&text, &ChunkMetadata::default());
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn overlap_injection_adds_neighbor_context() {
        let a = filler_sentence("alpha", 40);
        let b = filler_sentence("beta", 40);
        let c = filler_sentence("gamma", 40);
        let text = format!("{a}\n\n{b}\n\n{c}");
        let chunker = ArgumentChunker::new(45, 10);
        let chunks = chunker.chunk(&text, &ChunkMetadata::default());
        assert_eq!(chunks.len(), 3);

        // First chunk: full overlap from its following neighbor.
        assert!(chunks[0].text.contains("The beta point"));
        // Interior chunk: half overlap (5 words) from the previous tail.
        assert!(chunks[1].text.starts_with("filler28"));
        // Stored text is no longer a verbatim substring of the source.
        assert!(!text.contains(&chunks[0].text));
        // Offsets still describe the core span.
        assert!(chunks[0].text.contains(&text[chunks[0].start_offset..chunks[0].end_offset]));
    }

    #[test]
    fn rechunking_is_idempotent() {
        let text = format!(
            "1. {} Therefore it follows. {}\n\n2. {}",
            filler_sentence("first", 40),
            filler_sentence("second", 40),
            filler_sentence("third", 40)
        );
        let chunker = ArgumentChunker::new(60, 10);
        let a = chunker.chunk(&text, &ChunkMetadata::default());
        let b = chunker.chunk(&text, &ChunkMetadata::default());
        assert_eq!(a, b);
    }
}
