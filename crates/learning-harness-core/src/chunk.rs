//! Recursive character text splitter.
//!
//! Splits document text into [`IndexedChunk`]s no longer than `chunk_size`
//! characters, with up to `chunk_overlap` characters repeated between
//! consecutive chunks of the same document.
//!
//! # Algorithm
//!
//! 1. Pick the first separator (blank line, newline, space, single
//!    character) that occurs in the text and split on it.
//! 2. Pieces that fit are merged greedily, joined by the separator, until
//!    adding the next piece would exceed `chunk_size`.
//! 3. When a chunk is flushed, the trailing pieces totalling at most
//!    `chunk_overlap` characters are carried into the next chunk.
//! 4. Pieces that are themselves too long are split again with the next,
//!    finer separator.
//!
//! Lengths are counted in `char`s, so multi-byte text never splits inside
//! a code point.
//!
//! # Example
//!
//! ```rust
//! use learning_harness_core::chunk::split_text;
//!
//! let chunks = split_text("Hello world.\n\nSecond paragraph.", 1000, 100);
//! assert_eq!(chunks.len(), 1);
//! ```

use std::collections::VecDeque;

use crate::models::{IndexedChunk, SourceDocument};

/// Default maximum chunk length, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between consecutive chunks, in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Split a document into chunks that carry its `source_id` and `category`.
///
/// Documents with blank text produce no chunks.
pub fn chunk_document(
    doc: &SourceDocument,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<IndexedChunk> {
    split_text(&doc.text, chunk_size, chunk_overlap)
        .into_iter()
        .map(|text| IndexedChunk {
            text,
            source_id: doc.source_id.clone(),
            category: doc.category,
        })
        .collect()
}

/// Split `text` into trimmed, non-empty chunks of at most `chunk_size`
/// characters.
///
/// `chunk_overlap` is capped below `chunk_size`. A `chunk_size` of zero
/// yields no chunks.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if chunk_size == 0 || text.trim().is_empty() {
        return Vec::new();
    }
    let overlap = chunk_overlap.min(chunk_size - 1);
    split_recursive(text, &SEPARATORS, chunk_size, overlap)
}

fn split_recursive(text: &str, separators: &[&str], size: usize, overlap: usize) -> Vec<String> {
    let (idx, sep) = separators
        .iter()
        .enumerate()
        .find(|(_, s)| s.is_empty() || text.contains(**s))
        .map(|(i, s)| (i, *s))
        .unwrap_or((separators.len().saturating_sub(1), ""));
    let finer = &separators[(idx + 1).min(separators.len())..];

    let pieces: Vec<&str> = if sep.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split(sep).filter(|p| !p.is_empty()).collect()
    };

    let mut chunks = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for piece in pieces {
        if char_len(piece) <= size {
            pending.push(piece);
            continue;
        }
        if !pending.is_empty() {
            chunks.extend(merge_pieces(&pending, sep, size, overlap));
            pending.clear();
        }
        if finer.is_empty() {
            chunks.push(piece.trim().to_string());
        } else {
            chunks.extend(split_recursive(piece, finer, size, overlap));
        }
    }

    if !pending.is_empty() {
        chunks.extend(merge_pieces(&pending, sep, size, overlap));
    }

    chunks
}

/// Greedily merge small pieces into chunks, carrying an overlap window.
fn merge_pieces(pieces: &[&str], sep: &str, size: usize, overlap: usize) -> Vec<String> {
    let sep_len = char_len(sep);
    let mut out = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for &piece in pieces {
        let len = char_len(piece);
        let join = if window.is_empty() { 0 } else { sep_len };

        if total + join + len > size && !window.is_empty() {
            push_joined(&mut out, &window, sep);

            while let Some(front) = window.front().copied() {
                let next_join = sep_len;
                if total <= overlap && total + next_join + len <= size {
                    break;
                }
                window.pop_front();
                total -= char_len(front);
                if !window.is_empty() {
                    total -= sep_len;
                }
            }
        }

        if !window.is_empty() {
            total += sep_len;
        }
        total += len;
        window.push_back(piece);
    }

    if !window.is_empty() {
        push_joined(&mut out, &window, sep);
    }

    out
}

fn push_joined(out: &mut Vec<String>, window: &VecDeque<&str>, sep: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(sep);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
