use std::fmt;

use serde::Serialize;

use crate::token::{ParseError, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    LParen,           // (
    RParen,           // )
    LBracket,         // [
    RBracket,         // ]
    LBrace,           // {
    RBrace,           // }
    Semicolon,        // ;
    Colon,            // :
    DoubleColon,      // ::
    Newline,          // line break followed by a column-0 line
    GlobalIdentifier, // .ns.name
    LocalIdentifier,  // name
    Symbol,           // `sym
    Number,           // 42 1.5e3 2024.01.01 12:30
    String,           // "text"
    Operator,         // + , ! @ each/over/scan adverbs
    SystemCommand,    // \d .ns
}

impl TokenKind {
    pub fn is_closer(self) -> bool {
        matches!(self, TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            TokenKind::DoubleColon => "::",
            TokenKind::Newline => "newline",
            TokenKind::GlobalIdentifier => "global identifier",
            TokenKind::LocalIdentifier => "identifier",
            TokenKind::Symbol => "symbol",
            TokenKind::Number => "number",
            TokenKind::String => "string",
            TokenKind::Operator => "operator",
            TokenKind::SystemCommand => "system command",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn text<'s>(&self, src: &'s str) -> &'s str {
        &src[self.span.start..self.span.end]
    }
}

/// Output of a lexing pass. Lexing never aborts; problems land in `errors`.
#[derive(Debug, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub errors: Vec<ParseError>,
}

const ASCII_SPACE: u8 = 1 << 0;
const ASCII_DIGIT: u8 = 1 << 1;
const ASCII_ALPHA: u8 = 1 << 2;
const ASCII_IDENT_CONT: u8 = 1 << 3;
const ASCII_OPERATOR: u8 = 1 << 4;

const fn build_ascii_class() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let c = i as u8;
        if matches!(c, b' ' | b'\t' | b'\r' | 0x0B | 0x0C) {
            table[i] |= ASCII_SPACE;
        }
        if c >= b'0' && c <= b'9' {
            table[i] |= ASCII_DIGIT | ASCII_IDENT_CONT;
        }
        if (c >= b'a' && c <= b'z') || (c >= b'A' && c <= b'Z') {
            table[i] |= ASCII_ALPHA | ASCII_IDENT_CONT;
        }
        if c == b'_' {
            table[i] |= ASCII_IDENT_CONT | ASCII_OPERATOR;
        }
        if matches!(
            c,
            b'+' | b'-'
                | b'*'
                | b'%'
                | b'&'
                | b'|'
                | b'^'
                | b'='
                | b'<'
                | b'>'
                | b'~'
                | b','
                | b'#'
                | b'$'
                | b'!'
                | b'@'
                | b'?'
                | b'\''
                | b'\\'
                | b'/'
                | b'.'
        ) {
            table[i] |= ASCII_OPERATOR;
        }
        i += 1;
    }
    table
}

const ASCII_CLASS: [u8; 256] = build_ascii_class();

#[inline]
fn has(c: u8, flag: u8) -> bool {
    ASCII_CLASS[c as usize] & flag != 0
}

#[inline]
fn is_adverb(c: u8) -> bool {
    matches!(c, b'\'' | b'/' | b'\\')
}

pub struct Tokenizer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    idx: usize,
    tokens: Vec<Token>,
    errors: Vec<ParseError>,
}

impl<'a> Tokenizer<'a> {
    pub fn tokenize(src: &'a str) -> Lexed {
        let mut t = Tokenizer {
            src,
            bytes: src.as_bytes(),
            idx: 0,
            tokens: Vec::with_capacity(src.len() / 3),
            errors: Vec::new(),
        };
        t.run();
        Lexed {
            tokens: t.tokens,
            errors: t.errors,
        }
    }

    fn eof(&self) -> bool {
        self.idx >= self.bytes.len()
    }

    fn peek_at(&self, i: usize) -> Option<u8> {
        self.bytes.get(i).copied()
    }

    fn at_line_start(&self) -> bool {
        self.idx == 0 || self.bytes[self.idx - 1] == b'\n'
    }

    fn line_end(&self, from: usize) -> usize {
        self.bytes[from..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| from + p)
            .unwrap_or(self.bytes.len())
    }

    /// Line content starting at `from` with trailing whitespace trimmed.
    fn line_text(&self, from: usize) -> &'a str {
        self.src[from..self.line_end(from)].trim_end()
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start, self.idx),
        });
    }

    fn run(&mut self) {
        while !self.eof() {
            if self.at_line_start() && self.line_start_construct() {
                continue;
            }
            if self.eof() {
                break;
            }

            let c = self.bytes[self.idx];
            let start = self.idx;
            match c {
                b'\n' => {
                    self.idx += 1;
                    self.maybe_push_newline(start);
                }
                _ if has(c, ASCII_SPACE) => self.idx += 1,
                b'/' if start > 0 && has(self.bytes[start - 1], ASCII_SPACE) => {
                    // Trailing comment: ` / text`
                    self.idx = self.line_end(start);
                }
                b'"' => self.lex_string(),
                b'`' => self.lex_symbol(),
                b'(' => self.single(TokenKind::LParen),
                b')' => self.single(TokenKind::RParen),
                b'[' => self.single(TokenKind::LBracket),
                b']' => self.single(TokenKind::RBracket),
                b'{' => self.single(TokenKind::LBrace),
                b'}' => self.single(TokenKind::RBrace),
                b';' => self.single(TokenKind::Semicolon),
                b':' => {
                    if self.peek_at(start + 1) == Some(b':') {
                        self.idx += 2;
                        self.push(TokenKind::DoubleColon, start);
                    } else {
                        self.single(TokenKind::Colon);
                    }
                }
                _ if has(c, ASCII_DIGIT) => self.lex_number(),
                b'.' if self.peek_at(start + 1).is_some_and(|n| has(n, ASCII_ALPHA)) => {
                    self.idx += 1;
                    self.lex_name_segments();
                    self.push(TokenKind::GlobalIdentifier, start);
                }
                b'.' if self.peek_at(start + 1).is_some_and(|n| has(n, ASCII_DIGIT)) => self.lex_number(),
                _ if has(c, ASCII_ALPHA) => {
                    self.lex_name_segments();
                    self.push(TokenKind::LocalIdentifier, start);
                }
                _ if has(c, ASCII_OPERATOR) => self.lex_operator(),
                _ => {
                    let width = self.src[start..].chars().next().map(char::len_utf8).unwrap_or(1);
                    self.idx += width;
                    self.errors.push(ParseError::new(
                        format!("Unexpected character '{}'", &self.src[start..self.idx]),
                        Span::new(start, self.idx),
                    ));
                }
            }
        }
    }

    /// Handles constructs only recognised at column 0. Returns true when input was consumed.
    fn line_start_construct(&mut self) -> bool {
        let line = self.line_text(self.idx);
        if line == "/" {
            self.skip_block_comment();
            return true;
        }
        if line == "\\" {
            // A lone backslash ends the script; everything after it is commentary.
            self.idx = self.bytes.len();
            return true;
        }
        match self.bytes[self.idx] {
            b'/' => {
                self.idx = self.line_end(self.idx);
                true
            }
            b'\\' if self.peek_at(self.idx + 1).is_some_and(|n| !has(n, ASCII_SPACE) && n != b'\n') => {
                let start = self.idx;
                self.idx = start + self.line_text(start).len();
                self.push(TokenKind::SystemCommand, start);
                true
            }
            _ => false,
        }
    }

    /// An unterminated block comment runs to end of input, same as q itself.
    fn skip_block_comment(&mut self) {
        self.idx = (self.line_end(self.idx) + 1).min(self.bytes.len());
        while !self.eof() {
            let closes = self.line_text(self.idx) == "\\";
            self.idx = (self.line_end(self.idx) + 1).min(self.bytes.len());
            if closes {
                return;
            }
        }
    }

    /// Emit a statement separator when the next meaningful line starts at column 0.
    fn maybe_push_newline(&mut self, at: usize) {
        let mut probe = self.idx;
        while probe < self.bytes.len() {
            let line = self.line_text(probe);
            let first = self.bytes[probe];
            if line.is_empty() || first == b'/' {
                probe = self.line_end(probe) + 1;
                continue;
            }
            if has(first, ASCII_SPACE) {
                return;
            }
            break;
        }
        if probe >= self.bytes.len() {
            return;
        }
        let redundant = self
            .tokens
            .last()
            .map(|t| t.kind == TokenKind::Newline)
            .unwrap_or(true);
        if !redundant {
            self.tokens.push(Token {
                kind: TokenKind::Newline,
                span: Span::new(at, at + 1),
            });
        }
    }

    fn single(&mut self, kind: TokenKind) {
        let start = self.idx;
        self.idx += 1;
        self.push(kind, start);
    }

    fn lex_name_segments(&mut self) {
        // First segment; the caller guarantees an alphabetic start.
        while self.peek_at(self.idx).is_some_and(|c| has(c, ASCII_IDENT_CONT)) {
            self.idx += 1;
        }
        while self.peek_at(self.idx) == Some(b'.') && self.peek_at(self.idx + 1).is_some_and(|c| has(c, ASCII_IDENT_CONT))
        {
            self.idx += 1;
            while self.peek_at(self.idx).is_some_and(|c| has(c, ASCII_IDENT_CONT)) {
                self.idx += 1;
            }
        }
    }

    fn lex_number(&mut self) {
        let start = self.idx;
        self.idx += 1;
        while let Some(c) = self.peek_at(self.idx) {
            let time_sep = c == b':' && self.peek_at(self.idx + 1).is_some_and(|n| has(n, ASCII_DIGIT));
            if has(c, ASCII_DIGIT) || has(c, ASCII_ALPHA) || c == b'.' || time_sep {
                self.idx += 1;
            } else {
                break;
            }
        }
        self.push(TokenKind::Number, start);
    }

    fn lex_string(&mut self) {
        let start = self.idx;
        self.idx += 1;
        while let Some(c) = self.peek_at(self.idx) {
            match c {
                b'\\' => self.idx = (self.idx + 2).min(self.bytes.len()),
                b'"' => {
                    self.idx += 1;
                    self.push(TokenKind::String, start);
                    return;
                }
                _ => self.idx += 1,
            }
        }
        self.push(TokenKind::String, start);
        self.errors
            .push(ParseError::new("String not closed", Span::new(start, self.idx)));
    }

    fn lex_symbol(&mut self) {
        let start = self.idx;
        self.idx += 1;
        let handle = self.peek_at(self.idx) == Some(b':');
        while let Some(c) = self.peek_at(self.idx) {
            let ok = has(c, ASCII_IDENT_CONT) || c == b'.' || (handle && matches!(c, b':' | b'/' | b'-'));
            if !ok {
                break;
            }
            self.idx += 1;
        }
        self.push(TokenKind::Symbol, start);
    }

    fn lex_operator(&mut self) {
        let start = self.idx;
        let first = self.bytes[start];
        self.idx += 1;
        if matches!(first, b'<' | b'>') && matches!(self.peek_at(self.idx), Some(b'=') | Some(b'>')) {
            self.idx += 1;
        }
        let mut last = first;
        while let Some(c) = self.peek_at(self.idx) {
            if !is_adverb(c) {
                break;
            }
            last = c;
            self.idx += 1;
        }
        if is_adverb(last) && self.peek_at(self.idx) == Some(b':') && self.peek_at(self.idx + 1) != Some(b':') {
            self.idx += 1;
        }
        self.push(TokenKind::Operator, start);
    }
}
