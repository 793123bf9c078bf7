//! Error-recovering parser for q source.
//!
//! q evaluates right to left without operator precedence, so the tree keeps
//! expressions as flat term sequences. Only the shapes that matter for code
//! intelligence get their own nodes: assignments, lambdas, calls with their
//! argument slots, and bracketed collections.

use crate::token::{ParseError, Span, Token, TokenKind, Tokenizer};
use crate::tree::{NodeKind, SyntaxTree, TreeBuilder};

#[cfg(test)]
mod parser_test;

#[derive(Debug)]
pub struct Parse {
    pub tree: SyntaxTree,
    pub errors: Vec<ParseError>,
}

/// Parses `src` into a tree. Never fails: malformed input still produces a
/// best-effort tree and the problems are listed in `errors`.
pub fn parse(src: &str) -> Parse {
    let lexed = Tokenizer::tokenize(src);
    let mut parser = Parser {
        src,
        tokens: lexed.tokens,
        pos: 0,
        builder: TreeBuilder::new(src.len()),
        errors: lexed.errors,
        closers: Vec::new(),
    };
    parser.parse_program();
    let tree = parser.builder.finish();
    tracing::trace!(nodes = tree.len(), errors = parser.errors.len(), "parsed q source");
    Parse {
        tree,
        errors: parser.errors,
    }
}

fn is_qsql_keyword(word: &str) -> bool {
    matches!(word, "select" | "exec" | "update" | "delete")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    /// `name:expr` inside a table literal names a column, it declares nothing.
    Column,
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    builder: TreeBuilder,
    errors: Vec<ParseError>,
    /// Closing brackets of the constructs currently open, innermost last.
    closers: Vec<TokenKind>,
}

impl Parser<'_> {
    /// Inside brackets a line break is plain whitespace.
    fn trivia(&mut self) {
        if self.closers.is_empty() {
            return;
        }
        while self.tokens.get(self.pos).is_some_and(|t| t.kind == TokenKind::Newline) {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<Token> {
        self.trivia();
        self.tokens.get(self.pos).copied()
    }

    fn peek_kind(&mut self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn nth(&self, n: usize) -> Option<Token> {
        self.tokens.get(self.pos + n).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.peek()?;
        self.builder.token(tok.kind, tok.span);
        self.pos += 1;
        Some(tok)
    }

    fn offset(&mut self) -> usize {
        match self.peek() {
            Some(t) => t.span.start,
            None => self.tokens.last().map(|t| t.span.end).unwrap_or(0),
        }
    }

    fn at_stop(&mut self) -> bool {
        match self.peek_kind() {
            None | Some(TokenKind::Semicolon) => true,
            Some(TokenKind::Newline) => self.closers.is_empty(),
            Some(k) => k.is_closer(),
        }
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(ParseError::new(message, span));
    }

    fn parse_program(&mut self) {
        while let Some(tok) = self.peek() {
            match tok.kind {
                TokenKind::Semicolon | TokenKind::Newline => {
                    self.bump();
                }
                k if k.is_closer() => self.stray_closer(tok),
                _ => self.parse_expression(Mode::Normal),
            }
        }
    }

    fn stray_closer(&mut self, tok: Token) {
        self.builder.start_node(NodeKind::Error, tok.span.start);
        self.bump();
        self.builder.finish_node();
        self.error(format!("Unexpected '{}'", tok.kind), tok.span);
    }

    /// Deals with a closer that does not close the innermost construct.
    /// Returns true when it belongs to an enclosing construct and the caller must stop.
    fn recover_closer(&mut self, tok: Token) -> bool {
        let outer = &self.closers[..self.closers.len().saturating_sub(1)];
        if outer.contains(&tok.kind) {
            return true;
        }
        self.stray_closer(tok);
        false
    }

    fn parse_expression(&mut self, mode: Mode) {
        if self.at_stop() {
            return;
        }
        let mut mode = mode;
        let at = self.offset();
        self.builder.start_node(NodeKind::Expression, at);
        while !self.at_stop() {
            let cp = self.builder.checkpoint();
            let first = self.peek();
            let assignable = self.parse_term();
            if first.is_some_and(|t| t.kind == TokenKind::LocalIdentifier && is_qsql_keyword(t.text(self.src))) {
                // `select a:b from t` renames columns.
                mode = Mode::Column;
            }
            if assignable && self.at_assign_op() {
                let kind = match mode {
                    Mode::Normal => NodeKind::Assignment,
                    Mode::Column => NodeKind::TableColumn,
                };
                self.builder.start_node_at(cp, kind);
                self.bump_assign_op();
                self.parse_expression(mode);
                self.builder.finish_node();
                break;
            }
        }
        self.builder.finish_node();
    }

    fn at_assign_op(&mut self) -> bool {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Colon | TokenKind::DoubleColon,
                ..
            }) => true,
            Some(Token {
                kind: TokenKind::Operator,
                span,
            }) => self
                .nth(1)
                .is_some_and(|next| next.kind == TokenKind::Colon && next.span.start == span.end),
            _ => false,
        }
    }

    fn bump_assign_op(&mut self) {
        if self.peek_kind() == Some(TokenKind::Operator) {
            self.bump();
        }
        self.bump();
    }

    /// Parses one atom plus any bracket applications. Returns whether the
    /// result can be the target of an assignment.
    fn parse_term(&mut self) -> bool {
        let cp = self.builder.checkpoint();
        let Some(tok) = self.peek() else {
            return false;
        };
        // `d[k]:v` amends in place, so calls on identifiers stay assignable.
        let assignable = match tok.kind {
            TokenKind::GlobalIdentifier | TokenKind::LocalIdentifier => {
                self.bump();
                true
            }
            TokenKind::LParen => {
                self.parse_paren();
                false
            }
            TokenKind::LBrace => {
                self.parse_lambda();
                false
            }
            TokenKind::LBracket => {
                self.parse_block();
                false
            }
            _ => {
                self.bump();
                false
            }
        };

        while self.peek_kind() == Some(TokenKind::LBracket) {
            self.builder.start_node_at(cp, NodeKind::Call);
            self.parse_arguments();
            self.builder.finish_node();
        }
        assignable
    }

    /// `[a;b;...]` after a term. Every slot becomes an `Argument`, empty ones included.
    fn parse_arguments(&mut self) {
        let Some(open) = self.bump() else { return };
        self.closers.push(TokenKind::RBracket);
        self.builder.start_node(NodeKind::Argument, open.span.end);
        loop {
            self.parse_expression(Mode::Normal);
            match self.peek() {
                Some(t) if t.kind == TokenKind::Semicolon => {
                    self.builder.finish_node();
                    self.bump();
                    self.builder.start_node(NodeKind::Argument, t.span.end);
                }
                Some(t) if t.kind == TokenKind::RBracket => {
                    self.builder.finish_node();
                    self.bump();
                    break;
                }
                Some(t) if t.kind.is_closer() => {
                    if self.recover_closer(t) {
                        self.builder.finish_node();
                        self.error("Unclosed '['", open.span);
                        break;
                    }
                }
                _ => {
                    self.builder.finish_node();
                    self.error("Unclosed '['", open.span);
                    break;
                }
            }
        }
        self.closers.pop();
    }

    /// Parses `;`-separated items up to `close`. The opener has been consumed.
    /// Returns the number of separators seen.
    fn parse_items(&mut self, open: Token, close: TokenKind, mode: Mode) -> usize {
        self.closers.push(close);
        let mut separators = 0;
        loop {
            self.parse_expression(mode);
            match self.peek() {
                Some(t) if t.kind == TokenKind::Semicolon => {
                    self.bump();
                    separators += 1;
                }
                Some(t) if t.kind == close => {
                    self.bump();
                    break;
                }
                Some(t) if t.kind.is_closer() => {
                    if self.recover_closer(t) {
                        self.error(format!("Unclosed '{}'", open.kind), open.span);
                        break;
                    }
                }
                _ => {
                    self.error(format!("Unclosed '{}'", open.kind), open.span);
                    break;
                }
            }
        }
        self.closers.pop();
        separators
    }

    fn parse_paren(&mut self) {
        let cp = self.builder.checkpoint();
        let Some(open) = self.bump() else { return };
        let kind = if self.peek_kind() == Some(TokenKind::LBracket) {
            self.closers.push(TokenKind::RParen);
            let keys_open = self.bump();
            if let Some(keys_open) = keys_open {
                self.parse_items(keys_open, TokenKind::RBracket, Mode::Column);
            }
            self.closers.pop();
            self.parse_items(open, TokenKind::RParen, Mode::Column);
            NodeKind::Table
        } else if self.parse_items(open, TokenKind::RParen, Mode::Normal) > 0 {
            NodeKind::List
        } else {
            NodeKind::Parenthesized
        };
        self.builder.start_node_at(cp, kind);
        self.builder.finish_node();
    }

    fn parse_block(&mut self) {
        let cp = self.builder.checkpoint();
        let Some(open) = self.bump() else { return };
        self.parse_items(open, TokenKind::RBracket, Mode::Normal);
        self.builder.start_node_at(cp, NodeKind::Block);
        self.builder.finish_node();
    }

    /// `{[params] body}`
    fn parse_lambda(&mut self) {
        let Some(open) = self.peek() else { return };
        self.builder.start_node(NodeKind::FuncDefinition, open.span.start);
        self.bump();
        self.closers.push(TokenKind::RBrace);
        if self.peek_kind() == Some(TokenKind::LBracket) {
            self.parse_formal_parameters();
        }
        self.closers.pop();
        self.parse_items(open, TokenKind::RBrace, Mode::Normal);
        self.builder.finish_node();
    }

    fn parse_formal_parameters(&mut self) {
        let Some(open) = self.peek() else { return };
        self.builder.start_node(NodeKind::FormalParameters, open.span.start);
        self.bump();
        loop {
            match self.peek() {
                Some(t) if t.kind == TokenKind::RBracket => {
                    self.bump();
                    break;
                }
                Some(t) if matches!(t.kind, TokenKind::LocalIdentifier | TokenKind::Semicolon) => {
                    self.bump();
                }
                Some(t) if t.kind == TokenKind::RBrace || t.kind == TokenKind::RParen => {
                    self.error("Unclosed parameter list", open.span);
                    break;
                }
                Some(t) => {
                    self.error(format!("Unexpected {} in parameter list", t.kind), t.span);
                    self.bump();
                }
                None => {
                    self.error("Unclosed parameter list", open.span);
                    break;
                }
            }
        }
        self.builder.finish_node();
    }
}
