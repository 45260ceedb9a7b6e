//! Document chunking: AST-aware for languages with a grammar, recursive
//! separator splitting for the rest. Chunks overlap so context that straddles
//! a boundary survives in at least one of them.

pub mod ast;
pub mod recursive;

use crate::models::{Chunk, Document};
use recursive::RecursiveSplitter;

/// Maximum characters per chunk.
pub const CHUNK_SIZE: usize = 1000;

/// Characters carried over from one chunk into the next.
pub const CHUNK_OVERLAP: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            chunk_overlap: CHUNK_OVERLAP,
        }
    }
}

/// Languages with dedicated split boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Java,
    Cpp,
    Go,
    Ruby,
    Rust,
    PlainText,
}

impl Language {
    /// Map a file extension (with or without the leading dot) to a language.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "py" => Some(Language::Python),
            "js" | "jsx" => Some(Language::JavaScript),
            "ts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "java" => Some(Language::Java),
            "cpp" | "cc" | "c" | "h" | "hpp" => Some(Language::Cpp),
            "go" => Some(Language::Go),
            "rb" => Some(Language::Ruby),
            "rs" => Some(Language::Rust),
            _ => None,
        }
    }

    /// The language of the first extension, in caller order, that has one.
    /// Defaults to plain text.
    pub fn from_extensions(extensions: &[String]) -> Self {
        extensions
            .iter()
            .find_map(|ext| Self::from_extension(ext))
            .unwrap_or(Language::PlainText)
    }

    /// Return the tree-sitter Language for this variant, or None if unsupported.
    pub fn tree_sitter_language(&self) -> Option<tree_sitter::Language> {
        match self {
            Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            Language::Java => Some(tree_sitter_java::LANGUAGE.into()),
            Language::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
            Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
            Language::Ruby => Some(tree_sitter_ruby::LANGUAGE.into()),
            Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Language::PlainText => None,
        }
    }

    /// Separators in priority order, definition keywords first.
    pub fn separators(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &["\nclass ", "\ndef ", "\n\tdef ", "\n\n", "\n", " ", ""],
            Language::JavaScript => &[
                "\nfunction ", "\nconst ", "\nlet ", "\nvar ", "\nclass ", "\nif ", "\nfor ",
                "\nwhile ", "\nswitch ", "\ncase ", "\ndefault ", "\n\n", "\n", " ", "",
            ],
            Language::TypeScript | Language::Tsx => &[
                "\nenum ", "\ninterface ", "\nnamespace ", "\ntype ", "\nclass ", "\nfunction ",
                "\nconst ", "\nlet ", "\nvar ", "\nif ", "\nfor ", "\nwhile ", "\nswitch ",
                "\ncase ", "\ndefault ", "\n\n", "\n", " ", "",
            ],
            Language::Java => &[
                "\nclass ", "\npublic ", "\nprotected ", "\nprivate ", "\nstatic ", "\nif ",
                "\nfor ", "\nwhile ", "\nswitch ", "\ncase ", "\n\n", "\n", " ", "",
            ],
            Language::Cpp => &[
                "\nclass ", "\nvoid ", "\nint ", "\nfloat ", "\ndouble ", "\nif ", "\nfor ",
                "\nwhile ", "\nswitch ", "\ncase ", "\n\n", "\n", " ", "",
            ],
            Language::Go => &[
                "\nfunc ", "\nvar ", "\nconst ", "\ntype ", "\nif ", "\nfor ", "\nswitch ",
                "\ncase ", "\n\n", "\n", " ", "",
            ],
            Language::Ruby => &[
                "\ndef ", "\nclass ", "\nif ", "\nunless ", "\nwhile ", "\nfor ", "\ndo ",
                "\nbegin ", "\nrescue ", "\n\n", "\n", " ", "",
            ],
            Language::Rust => &[
                "\nfn ", "\nconst ", "\nlet ", "\nif ", "\nwhile ", "\nfor ", "\nloop ",
                "\nmatch ", "\n\n", "\n", " ", "",
            ],
            Language::PlainText => &["\n\n", "\n", " ", ""],
        }
    }
}

/// Split one document into chunks. Blank documents produce none.
pub fn chunk_document(doc: &Document, language: Language, options: ChunkOptions) -> Vec<Chunk> {
    if doc.content.trim().is_empty() {
        return Vec::new();
    }

    let splitter = RecursiveSplitter::new(options, language.separators());
    let spans = ast::split_with_ast(&doc.content, language, &splitter)
        .unwrap_or_else(|| splitter.split_text(&doc.content));

    spans
        .into_iter()
        .enumerate()
        .map(|(i, span)| {
            let start_line = line_at(&doc.content, span.offset);
            let end_line = start_line + span.text.matches('\n').count();
            Chunk {
                source: doc.path.clone(),
                chunk_index: i,
                content: span.text,
                start_line,
                end_line,
            }
        })
        .collect()
}

/// Chunk every document with the same language hint, preserving order.
pub fn chunk_documents(docs: &[Document], language: Language, options: ChunkOptions) -> Vec<Chunk> {
    docs.iter()
        .flat_map(|doc| chunk_document(doc, language, options))
        .collect()
}

/// 1-based line number of byte `offset` in `content`.
fn line_at(content: &str, offset: usize) -> usize {
    content
        .get(..offset)
        .map_or(1, |before| before.matches('\n').count() + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(path: &str, content: &str) -> Document {
        Document {
            path: path.to_string(),
            content: content.to_string(),
        }
    }

    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_language_from_extension() {
        assert_eq!(Language::from_extension(".py"), Some(Language::Python));
        assert_eq!(Language::from_extension("jsx"), Some(Language::JavaScript));
        assert_eq!(Language::from_extension(".tsx"), Some(Language::Tsx));
        assert_eq!(Language::from_extension(".c"), Some(Language::Cpp));
        assert_eq!(Language::from_extension(".md"), None);
    }

    #[test]
    fn test_language_first_configured_extension_wins() {
        assert_eq!(
            Language::from_extensions(&exts(&[".md", ".go", ".py"])),
            Language::Go
        );
        assert_eq!(
            Language::from_extensions(&exts(&[".py", ".go"])),
            Language::Python
        );
    }

    #[test]
    fn test_language_defaults_to_plain_text() {
        assert_eq!(Language::from_extensions(&exts(&[".md", ".txt"])), Language::PlainText);
        assert_eq!(Language::from_extensions(&[]), Language::PlainText);
    }

    #[test]
    fn test_blank_document_has_no_chunks() {
        let chunks = chunk_document(&doc("a.py", "  \n "), Language::Python, ChunkOptions::default());
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_short_document_single_chunk() {
        let chunks = chunk_document(&doc("a.py", "x = 1"), Language::Python, ChunkOptions::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source, "a.py");
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 1);
    }

    #[test]
    fn test_line_numbers_track_position() {
        let content: String = (0..200).map(|i| format!("line number {i}\n")).collect();
        let options = ChunkOptions {
            chunk_size: 300,
            chunk_overlap: 50,
        };
        let chunks = chunk_document(&doc("notes.txt", &content), Language::PlainText, options);
        assert!(chunks.len() > 3);
        assert_eq!(chunks[0].start_line, 1);
        for pair in chunks.windows(2) {
            assert!(pair[1].start_line > pair[0].start_line);
            assert!(pair[1].start_line <= pair[0].end_line + 1);
        }
        let last = chunks.last().unwrap();
        assert_eq!(last.end_line, 200);
    }

    #[test]
    fn test_line_numbers_with_repeated_text() {
        let block = "def handler(request):\n    return respond(request)\n\n";
        let content = block.repeat(60);
        let options = ChunkOptions {
            chunk_size: 200,
            chunk_overlap: 60,
        };
        let chunks = chunk_document(&doc("h.py", &content), Language::Python, options);
        assert!(chunks.len() > 5);

        let lines: Vec<&str> = content.lines().collect();
        for pair in chunks.windows(2) {
            assert!(pair[1].start_line > pair[0].start_line);
        }
        for chunk in &chunks {
            let span = lines[chunk.start_line - 1..chunk.end_line].join("\n");
            assert_eq!(span, chunk.content);
        }
        assert_eq!(chunks.last().unwrap().end_line, lines.len() - 1);
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let content: String = (0..80)
            .map(|i| format!("def f{i}():\n    return {i}\n\n"))
            .collect();
        let docs = vec![doc("m.py", &content), doc("n.py", &content)];
        let a = chunk_documents(&docs, Language::Python, ChunkOptions::default());
        let b = chunk_documents(&docs, Language::Python, ChunkOptions::default());
        assert_eq!(a, b);
        assert!(a.iter().all(|c| c.content.chars().count() <= CHUNK_SIZE));
    }

    #[test]
    fn test_chunk_indices_restart_per_document() {
        let docs = vec![doc("a.py", "a = 1"), doc("b.py", "b = 2")];
        let chunks = chunk_documents(&docs, Language::Python, ChunkOptions::default());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[1].chunk_index, 0);
        assert_eq!(chunks[1].source, "b.py");
    }

    #[test]
    fn test_unsupported_language_uses_separators() {
        let content = "para one\n\npara two\n";
        let chunks = chunk_document(&doc("r.md", content), Language::PlainText, ChunkOptions::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "para one\n\npara two");
    }
}
