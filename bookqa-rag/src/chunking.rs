//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! splits each page into overlapping windows of at most `chunk_size`
//! characters. Window ends are placed on the coarsest structural boundary
//! available (paragraph → sentence → word) and only fall back to a hard
//! character cut when a window holds no boundary at all.
//!
//! Lengths and offsets are counted in `char`s, not bytes.

use crate::document::{Chunk, ChunkMetadata, SourceDocument};
use crate::error::{RagError, Result};

/// Boundary separators, coarsest first. A window end is placed right after
/// the last separator of the first level that has one inside the window.
const SEPARATORS: &[&[&str]] = &[&["\n\n"], &[". ", "! ", "? ", ".\n", "\n"], &[" ", "\t"]];

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks, in page order.
    ///
    /// Blank pages produce no chunks. Output is deterministic for a given
    /// document and chunker configuration.
    fn chunk(&self, document: &SourceDocument) -> Vec<Chunk>;
}

/// A span of page text produced by [`RecursiveChunker::split_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    /// Character offset of the span within the split text.
    pub offset: usize,
    /// The span text.
    pub text: String,
}

/// Splits page text hierarchically with a guaranteed overlap between
/// consecutive chunks of the same page.
///
/// Chunk IDs are generated as `{source_id}_{chunk_index}` with a
/// document-wide index.
///
/// # Example
///
/// ```rust,ignore
/// use bookqa_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(1000, 200)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] unless `chunk_size > 0` and
    /// `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Maximum chunk length in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Minimum number of characters shared by consecutive chunks of a page.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split a single text into overlapping spans.
    pub fn split_text(&self, text: &str) -> Vec<TextSpan> {
        let chars: Vec<char> = text.chars().collect();
        split_spans(&chars, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .map(|(start, end)| TextSpan { offset: start, text: chars[start..end].iter().collect() })
            .collect()
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &SourceDocument) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in &document.pages {
            for span in self.split_text(&page.text) {
                let chunk_index = chunks.len();
                chunks.push(Chunk {
                    id: format!("{}_{chunk_index}", document.id),
                    text: span.text,
                    metadata: ChunkMetadata {
                        source_id: document.id.clone(),
                        page_number: page.number,
                        offset: span.offset,
                    },
                });
            }
        }
        chunks
    }
}

/// Chunk a document with the given parameters.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] if the parameters are invalid.
pub fn chunk_document(
    document: &SourceDocument,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>> {
    Ok(RecursiveChunker::new(chunk_size, chunk_overlap)?.chunk(document))
}

/// Compute `[start, end)` char ranges covering every non-whitespace char of
/// `chars`.
///
/// Each range is at most `size` long. Consecutive ranges share at least
/// `overlap` characters and every range ends strictly after the previous one.
fn split_spans(chars: &[char], size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let n = chars.len();
    let mut spans = Vec::new();
    let mut start = skip_whitespace(chars, 0);
    let mut prev_end = 0;

    while start < n {
        let limit = start + size;
        if limit >= n {
            let end = trim_end(chars, start, n);
            if end > start {
                spans.push((start, end));
            }
            break;
        }

        let floor = (start + overlap).max(prev_end);
        let end = find_break(chars, start, limit, floor);
        spans.push((start, end));

        if trim_end(chars, end, n) == end {
            // Only whitespace left on the page.
            break;
        }
        prev_end = end;
        start = next_start(chars, start, end, overlap);
    }

    spans
}

/// Find the trimmed end of a window `[start, limit)` that lies strictly after
/// `floor`, preferring the coarsest separator level.
fn find_break(chars: &[char], start: usize, limit: usize, floor: usize) -> usize {
    for level in SEPARATORS {
        for pos in (floor + 1..=limit).rev() {
            let ends_with_separator = level.iter().any(|sep| ends_with_at(chars, start, pos, sep));
            if !ends_with_separator {
                continue;
            }
            let end = trim_end(chars, start, pos);
            if end > floor {
                return end;
            }
        }
    }
    limit
}

/// Start of the chunk following `[start, end)`.
///
/// Steps back `overlap` characters from `end` and then snaps backwards to the
/// beginning of a word, staying strictly after `start`.
fn next_start(chars: &[char], start: usize, end: usize, overlap: usize) -> usize {
    if overlap == 0 {
        return skip_whitespace(chars, end);
    }
    let target = end - overlap;
    (start + 1..=target).rev().find(|&i| is_word_start(chars, i)).unwrap_or(target)
}

/// Whether `chars[..pos]` ends with `sep`, with the separator starting at or
/// after `start`.
fn ends_with_at(chars: &[char], start: usize, pos: usize, sep: &str) -> bool {
    let sep_len = sep.chars().count();
    if pos < start + sep_len {
        return false;
    }
    chars[pos - sep_len..pos].iter().copied().eq(sep.chars())
}

fn is_word_start(chars: &[char], i: usize) -> bool {
    !chars[i].is_whitespace() && (i == 0 || chars[i - 1].is_whitespace())
}

fn skip_whitespace(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

fn trim_end(chars: &[char], start: usize, mut end: usize) -> usize {
    while end > start && chars[end - 1].is_whitespace() {
        end -= 1;
    }
    end
}
