//! Source positions
//!
//! Tree-sitter reports byte columns; language servers count UTF-16 code units.
//! Everything stored on a node uses the LSP convention so a definition range can
//! be handed to a server unchanged.

use serde::{Deserialize, Serialize};

/// Zero-based line and UTF-16 column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

impl From<lsp_types::Position> for Position {
    fn from(p: lsp_types::Position) -> Self {
        Self::new(p.line, p.character)
    }
}

impl From<Position> for lsp_types::Position {
    fn from(p: Position) -> Self {
        lsp_types::Position::new(p.line, p.character)
    }
}

/// Half-open span `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRange {
    pub start: Position,
    pub end: Position,
}

impl SourceRange {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// True when `pos` lies inside the span. The end is inclusive so a cursor
    /// sitting right after the last token still counts.
    pub fn contains(&self, pos: Position) -> bool {
        self.start <= pos && pos <= self.end
    }
}

/// Byte offsets of line starts, used to translate between tree-sitter points
/// and LSP positions.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { source, line_starts }
    }

    fn line_text(&self, row: usize) -> &'a str {
        let Some(&start) = self.line_starts.get(row) else {
            return "";
        };
        let end = self
            .line_starts
            .get(row + 1)
            .map(|e| e - 1)
            .unwrap_or(self.source.len());
        self.source.get(start..end).unwrap_or("")
    }

    /// Tree-sitter point (byte column) to LSP position (UTF-16 column)
    pub fn position(&self, point: tree_sitter::Point) -> Position {
        let line = self.line_text(point.row);
        let byte_col = point.column.min(line.len());
        let prefix = line.get(..byte_col).unwrap_or(line);
        let character = prefix.encode_utf16().count() as u32;
        Position::new(point.row as u32, character)
    }

    /// LSP position back to a tree-sitter point. Columns past the end of the line
    /// clamp to the line end.
    pub fn point(&self, pos: Position) -> tree_sitter::Point {
        let line = self.line_text(pos.line as usize);
        let mut units = 0u32;
        let mut column = line.len();
        for (byte, ch) in line.char_indices() {
            if units >= pos.character {
                column = byte;
                break;
            }
            units += ch.len_utf16() as u32;
        }
        tree_sitter::Point::new(pos.line as usize, column)
    }

    /// Span of a syntax node in LSP coordinates
    pub fn range(&self, node: &tree_sitter::Node<'_>) -> SourceRange {
        SourceRange::new(
            self.position(node.start_position()),
            self.position(node.end_position()),
        )
    }
}
