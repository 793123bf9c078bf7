//! Lexer, parser and syntax tree for the q language.

pub mod parser;
pub mod token;
pub mod tree;

pub use parser::{Parse, parse};
pub use token::{ParseError, Span, Token, TokenKind};
pub use tree::{Node, NodeId, NodeKind, SyntaxTree};
