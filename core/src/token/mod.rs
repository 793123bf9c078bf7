mod error;
mod lexer;


pub use error::{ParseError, Span};
pub use lexer::{Lexed, Token, TokenKind, Tokenizer};
