//! Recursive separator splitter with overlapping merge.
//!
//! Splitting strategy:
//! 1. Cut the text at the first separator (in priority order) that occurs in it,
//!    keeping the separator at the start of the following piece
//! 2. Pieces shorter than the budget are buffered for merging
//! 3. Pieces at or over the budget are split again with the remaining separators
//! 4. Buffered pieces are merged greedily up to the budget; each emitted chunk
//!    hands its tail (up to `chunk_overlap` characters) to the next one
//!
//! All lengths are measured in characters.

use std::collections::VecDeque;

use super::ChunkOptions;

/// A chunk of text and the byte offset where it starts in the text it was
/// split from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub offset: usize,
    pub text: String,
}

/// Recursive splitter bound to one separator list.
#[derive(Debug, Clone, Copy)]
pub struct RecursiveSplitter<'a> {
    options: ChunkOptions,
    separators: &'a [&'a str],
}

impl<'a> RecursiveSplitter<'a> {
    pub fn new(options: ChunkOptions, separators: &'a [&'a str]) -> Self {
        Self {
            options,
            separators,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.options.chunk_size
    }

    /// Split `text` with the full separator list. Offsets are relative to `text`.
    pub fn split_text(&self, text: &str) -> Vec<Span> {
        self.split_with(text, 0, self.separators)
    }

    fn split_with(&self, text: &str, base: usize, separators: &[&str]) -> Vec<Span> {
        let (separator, remaining) = pick_separator(text, separators);
        let pieces = split_keep_separator(text, separator);

        let mut chunks = Vec::new();
        let mut good: Vec<(usize, &str)> = Vec::new();

        for (at, piece) in pieces {
            let offset = base + at;
            if char_len(piece) < self.options.chunk_size {
                good.push((offset, piece));
                continue;
            }

            if !good.is_empty() {
                chunks.extend(self.merge(&good));
                good.clear();
            }
            if remaining.is_empty() {
                chunks.extend(trimmed(offset, piece));
            } else {
                chunks.extend(self.split_with(piece, offset, remaining));
            }
        }

        if !good.is_empty() {
            chunks.extend(self.merge(&good));
        }

        chunks
    }

    /// Merge small, contiguous pieces (each tagged with its byte offset) into
    /// chunks of at most `chunk_size` characters, carrying up to
    /// `chunk_overlap` characters into the next chunk.
    pub fn merge(&self, pieces: &[(usize, &str)]) -> Vec<Span> {
        let ChunkOptions {
            chunk_size,
            chunk_overlap,
        } = self.options;

        let mut chunks = Vec::new();
        let mut current: VecDeque<(usize, &str)> = VecDeque::new();
        let mut total = 0usize;

        for &(offset, piece) in pieces {
            let len = char_len(piece);

            if total + len > chunk_size && !current.is_empty() {
                if total > chunk_size {
                    tracing::debug!("Created a chunk of {total} chars, over the {chunk_size} budget");
                }
                chunks.extend(join(&current));
                // Drop from the front until what is left fits as overlap
                while total > chunk_overlap || (total + len > chunk_size && total > 0) {
                    match current.pop_front() {
                        Some((_, front)) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            current.push_back((offset, piece));
            total += len;
        }

        chunks.extend(join(&current));
        chunks
    }
}

/// Pick the first separator present in `text`. The empty separator always
/// matches and ends the recursion.
fn pick_separator<'s>(text: &str, separators: &'s [&'s str]) -> (&'s str, &'s [&'s str]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            return ("", &[]);
        }
        if text.contains(sep) {
            return (sep, &separators[i + 1..]);
        }
    }
    (separators.last().copied().unwrap_or(""), &[])
}

/// Split on `separator`, attaching each separator occurrence to the start of
/// the piece that follows it. Empty pieces are dropped. Each piece comes with
/// its byte offset in `text`.
fn split_keep_separator<'t>(text: &'t str, separator: &str) -> Vec<(usize, &'t str)> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| (i, &text[i..i + c.len_utf8()]))
            .collect();
    }

    let mut pieces = Vec::new();
    let mut last = 0usize;
    for (idx, _) in text.match_indices(separator) {
        if idx > last {
            pieces.push((last, &text[last..idx]));
        }
        last = idx;
    }
    if last < text.len() {
        pieces.push((last, &text[last..]));
    }
    pieces
}

fn join(pieces: &VecDeque<(usize, &str)>) -> Option<Span> {
    let (offset, _) = *pieces.front()?;
    let joined: String = pieces.iter().map(|&(_, p)| p).collect();
    trimmed(offset, &joined)
}

/// Trim `text`, shifting `offset` past any leading whitespace.
fn trimmed(offset: usize, text: &str) -> Option<Span> {
    let start = text.trim_start();
    let t = start.trim_end();
    if t.is_empty() {
        None
    } else {
        Some(Span {
            offset: offset + (text.len() - start.len()),
            text: t.to_string(),
        })
    }
}

pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}
