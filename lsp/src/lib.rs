//! Language server for q: the analyzer that indexes q sources and answers
//! editor queries, and the tower-lsp front end that serves it over stdio.

pub mod analyzer;
pub mod server;
