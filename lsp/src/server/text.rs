use ropey::Rope;
use tower_lsp::lsp_types::{Position, TextDocumentContentChangeEvent};

// LSP UTF-16 position to a rope char index, clamped to the end of the line.
pub(crate) fn position_to_char_idx(text: &Rope, pos: Position) -> usize {
    let line_idx = pos.line as usize;
    if line_idx >= text.len_lines() {
        return text.len_chars();
    }
    let line_start = text.line_to_char(line_idx);
    let line = text.line(line_idx);
    let mut line_len = line.len_chars();
    while line_len > 0 && matches!(line.char(line_len - 1), '\n' | '\r') {
        line_len -= 1;
    }

    if let Some(s) = line.as_str() {
        if s.is_ascii() {
            return line_start + (pos.character as usize).min(line_len);
        }
    }

    let target = pos.character as usize;
    let mut seen_utf16 = 0usize;
    let mut chars = 0usize;
    for ch in line.chars().take(line_len) {
        let width = ch.len_utf16();
        if seen_utf16 + width > target {
            break;
        }
        seen_utf16 += width;
        chars += 1;
    }
    line_start + chars
}

/// Applies one content change. A change without a range replaces the buffer.
pub(crate) fn apply_change(text: &mut Rope, change: &TextDocumentContentChangeEvent) {
    let Some(range) = &change.range else {
        *text = Rope::from_str(&change.text);
        return;
    };
    let a = position_to_char_idx(text, range.start);
    let b = position_to_char_idx(text, range.end);
    let (start, end) = if a <= b { (a, b) } else { (b, a) };
    if start != end {
        text.remove(start..end);
    }
    if !change.text.is_empty() {
        text.insert(start, &change.text);
    }
}
