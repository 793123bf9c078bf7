use std::sync::Arc;

use q_core::{NodeId, NodeKind, ParseError, Span, SyntaxTree, TokenKind};
use ropey::Rope;
use tower_lsp::lsp_types::{Position, Range};

/// Source text together with its syntax tree. Both are produced from the same
/// string in one step and are never updated independently.
#[derive(Debug, Clone)]
pub struct ParsedSource {
    pub source: Arc<str>,
    pub rope: Rope,
    pub tree: Arc<SyntaxTree>,
    pub errors: Vec<ParseError>,
}

impl ParsedSource {
    pub fn new(text: &str) -> Self {
        let parsed = q_core::parse(text);
        Self {
            source: Arc::from(text),
            rope: Rope::from_str(text),
            tree: Arc::new(parsed.tree),
            errors: parsed.errors,
        }
    }

    pub fn text(&self) -> &str {
        &self.source
    }

    pub fn node_text(&self, node: NodeId) -> &str {
        self.tree.text(node, &self.source)
    }

    /// Byte offset to an LSP position (UTF-16 columns).
    pub fn offset_to_position(&self, offset: usize) -> Position {
        let offset = offset.min(self.rope.len_bytes());
        let ch = self.rope.byte_to_char(offset);
        let line = self.rope.char_to_line(ch);
        let line_start = self.rope.line_to_char(line);
        let column = self.rope.char_to_utf16_cu(ch) - self.rope.char_to_utf16_cu(line_start);
        Position::new(line as u32, column as u32)
    }

    /// LSP position to a byte offset, clamped to the end of the addressed line.
    pub fn position_to_offset(&self, pos: Position) -> usize {
        let line = pos.line as usize;
        if line >= self.rope.len_lines() {
            return self.rope.len_bytes();
        }
        let line_start = self.rope.line_to_char(line);
        let slice = self.rope.line(line);
        let mut line_len = slice.len_chars();
        while line_len > 0 && matches!(slice.char(line_len - 1), '\n' | '\r') {
            line_len -= 1;
        }
        let start_cu = self.rope.char_to_utf16_cu(line_start);
        let end_cu = self.rope.char_to_utf16_cu(line_start + line_len);
        let target = (start_cu + pos.character as usize).min(end_cu);
        let ch = self.rope.utf16_cu_to_char(target);
        self.rope.char_to_byte(ch)
    }

    pub fn span_to_range(&self, span: Span) -> Range {
        Range::new(self.offset_to_position(span.start), self.offset_to_position(span.end))
    }

    pub fn node_range(&self, node: NodeId) -> Range {
        self.span_to_range(self.tree.span(node))
    }

    pub fn node_at_position(&self, pos: Position) -> NodeId {
        self.tree.node_at_offset(self.position_to_offset(pos))
    }

    /// Leaf token under `offset`. When the cursor sits right after a word and
    /// before punctuation (`f|[`), the word wins.
    pub fn leaf_at_offset(&self, offset: usize) -> Option<NodeId> {
        let hit = self.tree.node_at_offset(offset);
        let is_word = |n: NodeId| {
            matches!(
                self.tree.kind(n),
                NodeKind::Token(TokenKind::GlobalIdentifier | TokenKind::LocalIdentifier | TokenKind::Symbol)
            )
        };
        if is_word(hit) {
            return Some(hit);
        }
        if offset > 0 {
            let before = self.tree.node_at_offset(offset - 1);
            if is_word(before) && self.tree.span(before).end == offset {
                return Some(before);
            }
        }
        self.tree.kind(hit).is_leaf().then_some(hit)
    }

    /// Moves `offset` back over blanks so a cursor after `f[1; ` still lands in the call.
    pub fn skip_back_blanks(&self, offset: usize) -> usize {
        let bytes = self.source.as_bytes();
        let mut at = offset.min(bytes.len());
        while at > 0 && matches!(bytes[at - 1], b' ' | b'\t') {
            at -= 1;
        }
        at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_columns_round_trip() {
        let parsed = ParsedSource::new("s:\"é😀\";a:1\nb:2");
        // `a` sits after a two-byte and a four-byte character.
        let a_offset = parsed.text().find("a:").unwrap();
        let pos = parsed.offset_to_position(a_offset);
        assert_eq!(pos, Position::new(0, 8));
        assert_eq!(parsed.position_to_offset(pos), a_offset);
        assert_eq!(parsed.offset_to_position(parsed.text().len()), Position::new(1, 3));
    }

    #[test]
    fn positions_clamp_to_line_end() {
        let parsed = ParsedSource::new("ab\ncd");
        assert_eq!(parsed.position_to_offset(Position::new(0, 40)), 2);
        assert_eq!(parsed.position_to_offset(Position::new(9, 0)), 5);
    }

    #[test]
    fn leaf_prefers_the_word_before_punctuation() {
        let parsed = ParsedSource::new("f[1]");
        let leaf = parsed.leaf_at_offset(1).unwrap();
        assert_eq!(parsed.node_text(leaf), "f");
    }
}
