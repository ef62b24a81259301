//! Overlapping, separator-aware text chunker.
//!
//! Splits a [`Document`] into [`Chunk`]s of at most `target_size`
//! characters, where each chunk after the first re-includes the final
//! `overlap` characters of its predecessor.
//!
//! # Algorithm
//!
//! 1. Canonicalize the document with
//!    [`normalize_paragraphs`](crate::normalize::normalize_paragraphs), which
//!    keeps `\n\n` paragraph breaks.
//! 2. Starting at offset 0, look at the window `[start, start + target_size]`.
//!    If the rest of the text fits, emit it and stop.
//! 3. Otherwise pick the cut point: the furthest position in the window that
//!    falls right after a separator, trying separators from coarsest to
//!    finest (paragraph break, sentence end, whitespace, any character).
//!    Only cut points beyond `start + overlap` are eligible, so every step
//!    makes progress.
//! 4. Emit `[start, cut)` and continue from `cut - overlap`.
//!
//! Offsets and sizes are measured in characters, not bytes.
//!
//! # Example
//!
//! ```rust
//! use deskhand_core::chunk::{chunk_document, ChunkOptions};
//! use deskhand_core::models::Document;
//!
//! let doc = Document::new("faq", "Hello world.\n\nSecond paragraph.");
//! let chunks = chunk_document(&doc, &ChunkOptions::default());
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].id, 0);
//! ```

use crate::models::{Chunk, Document};
use crate::normalize::normalize_paragraphs;

pub const DEFAULT_TARGET_SIZE: usize = 1000;
pub const DEFAULT_OVERLAP: usize = 200;

/// Chunk sizing parameters, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    /// Maximum characters per chunk.
    pub target_size: usize,
    /// Characters shared between consecutive chunks. Clamped below `target_size`.
    pub overlap: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_TARGET_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

/// Boundaries the chunker may cut at, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Separator {
    Paragraph,
    Sentence,
    Whitespace,
    Character,
}

const SEPARATORS: [Separator; 4] = [
    Separator::Paragraph,
    Separator::Sentence,
    Separator::Whitespace,
    Separator::Character,
];

impl Separator {
    /// Whether a cut at `pos` (exclusive end) lands right after this separator.
    fn ends_at(self, chars: &[char], pos: usize) -> bool {
        match self {
            Separator::Paragraph => pos >= 2 && chars[pos - 1] == '\n' && chars[pos - 2] == '\n',
            Separator::Sentence => {
                pos >= 2 && chars[pos - 1].is_whitespace() && matches!(chars[pos - 2], '.' | '!' | '?')
            }
            Separator::Whitespace => pos >= 1 && chars[pos - 1].is_whitespace(),
            Separator::Character => true,
        }
    }
}

/// Canonicalize a document and split it into overlapping chunks.
///
/// Returns an empty vector when the document has no text left after
/// normalization.
pub fn chunk_document(document: &Document, options: &ChunkOptions) -> Vec<Chunk> {
    let canonical = normalize_paragraphs(&document.text);
    chunk_text(&canonical, options)
}

/// Split already-canonical text into overlapping chunks.
///
/// # Guarantees
///
/// - Chunk ids are contiguous: `0, 1, 2, …, N-1`.
/// - Every chunk holds at most `target_size` characters.
/// - For `i > 0`, chunk `i` starts with the last `overlap` characters of
///   chunk `i - 1`.
/// - The chunks cover the whole text: the first starts at offset 0, the
///   last ends at the final character, and no two share a start offset.
pub fn chunk_text(text: &str, options: &ChunkOptions) -> Vec<Chunk> {
    let target = options.target_size.max(1);
    let overlap = options.overlap.min(target - 1);
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    let mut chunks = Vec::new();
    if total == 0 {
        return chunks;
    }

    let mut start = 0;
    loop {
        let end = if total - start <= target {
            total
        } else {
            cut_point(&chars, start, target, overlap)
        };

        chunks.push(Chunk {
            id: chunks.len() as u32,
            text: chars[start..end].iter().collect(),
            source_offset: start,
        });

        if end == total {
            break;
        }
        start = end - overlap;
    }

    chunks
}

/// Furthest eligible cut in `(start + overlap, start + target]`, coarsest separator first.
fn cut_point(chars: &[char], start: usize, target: usize, overlap: usize) -> usize {
    let limit = start + target;
    let floor = start + overlap;
    for sep in SEPARATORS {
        if let Some(pos) = (floor + 1..=limit).rev().find(|&p| sep.ends_at(chars, p)) {
            return pos;
        }
    }
    limit
}
