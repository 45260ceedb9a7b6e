//! AST-aware splitting using tree-sitter.
//!
//! The document is first cut at the start of every top-level syntax node, so
//! definitions stay whole where they fit. A piece over the budget is cut again
//! at its node's children; leaves and gaps over the budget go to the separator
//! splitter. The flattened pieces are then merged with overlap in one pass.
//!
//! Falls back (returns `None`) when:
//! - File exceeds MAX_FILE_SIZE (500 KB)
//! - Parse produces >30% error nodes
//! - Language has no grammar

use super::recursive::{char_len, RecursiveSplitter, Span};
use super::Language;

/// Files larger than this skip AST parsing entirely.
const MAX_FILE_SIZE: usize = 500 * 1024; // 500 KB

/// If more than this fraction of AST nodes are error nodes, fall back.
const ERROR_THRESHOLD: f64 = 0.30;

/// Split `content` along syntax boundaries. Returns None if the language is
/// unsupported or AST parsing should be skipped. Span offsets are byte
/// offsets into `content`.
pub fn split_with_ast(
    content: &str,
    language: Language,
    splitter: &RecursiveSplitter<'_>,
) -> Option<Vec<Span>> {
    if content.len() > MAX_FILE_SIZE {
        return None;
    }

    let mut parser = tree_sitter::Parser::new();
    let ts_language = language.tree_sitter_language()?;
    parser.set_language(&ts_language).ok()?;

    let tree = parser.parse(content, None)?;
    let root = tree.root_node();

    let (total, errors) = count_nodes(root);
    if total > 0 && (errors as f64 / total as f64) > ERROR_THRESHOLD {
        tracing::warn!(
            "AST error rate {:.0}% exceeds threshold, falling back to separator splitting",
            (errors as f64 / total as f64) * 100.0
        );
        return None;
    }

    if root.child_count() == 0 {
        return None;
    }

    let mut pieces = Vec::new();
    collect_pieces(content, root, 0, content.len(), splitter, &mut pieces);

    let mut chunks = Vec::new();
    let mut good: Vec<(usize, &str)> = Vec::new();
    for piece in pieces {
        match piece {
            Piece::Text(offset, text) => good.push((offset, text)),
            Piece::Chunk(chunk) => {
                if !good.is_empty() {
                    chunks.extend(splitter.merge(&good));
                    good.clear();
                }
                chunks.push(chunk);
            }
        }
    }
    if !good.is_empty() {
        chunks.extend(splitter.merge(&good));
    }

    Some(chunks)
}

/// A unit handed to the merge step.
enum Piece<'a> {
    /// Under budget, at a byte offset; merged with its neighbours
    Text(usize, &'a str),
    /// Already split by separators; emitted as-is
    Chunk(Span),
}

/// Cut the byte span `[start, end)` owned by `node` at the start of each of
/// its children, descending into children whose piece is over budget.
fn collect_pieces<'a>(
    content: &'a str,
    node: tree_sitter::Node,
    start: usize,
    end: usize,
    splitter: &RecursiveSplitter<'_>,
    pieces: &mut Vec<Piece<'a>>,
) {
    let mut cursor = node.walk();
    let children: Vec<tree_sitter::Node> = node
        .children(&mut cursor)
        .filter(|c| c.start_byte() >= start && c.start_byte() < end)
        .collect();

    // Cut points paired with the child that starts there (None for a leading gap)
    let mut bounds: Vec<(usize, Option<tree_sitter::Node>)> = vec![(start, None)];
    for child in children {
        let child_start = child.start_byte();
        if let Some(last) = bounds.last_mut() {
            if last.0 == child_start {
                // Siblings sharing a cut: keep the widest owner
                let wider = last.1.map_or(true, |n| child.end_byte() > n.end_byte());
                if wider {
                    last.1 = Some(child);
                }
                continue;
            }
        }
        bounds.push((child_start, Some(child)));
    }

    for (i, &(piece_start, owner)) in bounds.iter().enumerate() {
        let piece_end = bounds.get(i + 1).map(|b| b.0).unwrap_or(end);
        let Some(piece) = content.get(piece_start..piece_end) else {
            continue;
        };
        if piece.is_empty() {
            continue;
        }

        if char_len(piece) < splitter.chunk_size() {
            pieces.push(Piece::Text(piece_start, piece));
            continue;
        }

        match owner {
            Some(child) if child.child_count() > 0 => {
                collect_pieces(content, child, piece_start, piece_end, splitter, pieces);
            }
            _ => pieces.extend(splitter.split_text(piece).into_iter().map(|span| {
                Piece::Chunk(Span {
                    offset: piece_start + span.offset,
                    text: span.text,
                })
            })),
        }
    }
}

/// Count total nodes and error nodes in a tree.
fn count_nodes(node: tree_sitter::Node) -> (usize, usize) {
    let mut total = 1usize;
    let mut errors = if node.is_error() { 1usize } else { 0 };

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let (t, e) = count_nodes(child);
        total += t;
        errors += e;
    }

    (total, errors)
}
