use tower_lsp::lsp_types::{Location, Position, Range, Url};

use super::extract::{self, Extraction};
use super::parse::ParsedSource;
use super::symbols::{Occurrence, OccurrenceType, Scope, Symbol};
use super::utils::{compute_content_hash, dedup_by_key};

/// Where the content of a stored document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentSource {
    Disk,
    Editor { version: i32 },
}

impl DocumentSource {
    /// Whether content from `self` may replace content from `current`. Editor
    /// buffers beat disk reads and newer buffer versions beat older ones.
    pub fn supersedes(&self, current: &DocumentSource) -> bool {
        match (self, current) {
            (DocumentSource::Disk, DocumentSource::Disk) => true,
            (DocumentSource::Disk, DocumentSource::Editor { .. }) => false,
            (DocumentSource::Editor { .. }, DocumentSource::Disk) => true,
            (DocumentSource::Editor { version: new }, DocumentSource::Editor { version: old }) => new >= old,
        }
    }
}

/// One analyzed file. Built in a single step from its text and replaced as a
/// whole, so the tree, symbols and occurrences always describe the same content.
#[derive(Debug, Clone)]
pub struct Document {
    pub uri: Url,
    pub source: DocumentSource,
    pub content_hash: u64,
    pub parsed: ParsedSource,
    pub symbols: Vec<Symbol>,
    pub occurrences: Vec<Occurrence>,
}

impl Document {
    pub fn analyze(uri: Url, text: &str, source: DocumentSource) -> Self {
        let parsed = ParsedSource::new(text);
        let Extraction { symbols, occurrences } = extract::extract(&parsed);
        tracing::debug!(
            uri = %uri,
            symbols = symbols.len(),
            occurrences = occurrences.len(),
            parse_errors = parsed.errors.len(),
            "analyzed document"
        );
        Self {
            uri,
            source,
            content_hash: compute_content_hash(text),
            parsed,
            symbols,
            occurrences,
        }
    }

    pub fn text(&self) -> &str {
        self.parsed.text()
    }

    pub fn version(&self) -> Option<i32> {
        match self.source {
            DocumentSource::Editor { version } => Some(version),
            DocumentSource::Disk => None,
        }
    }

    pub fn location(&self, range: Range) -> Location {
        Location::new(self.uri.clone(), range)
    }

    pub fn local(&self, container: &str, name: &str) -> Option<&Symbol> {
        self.symbols
            .iter()
            .find(|s| s.scope.container() == Some(container) && s.name == name)
    }

    pub fn locals<'a>(&'a self, container: &'a str) -> impl Iterator<Item = &'a Symbol> + 'a {
        self.symbols
            .iter()
            .filter(move |s| s.scope.container() == Some(container))
    }

    pub fn globals(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.symbols.iter().filter(|s| s.is_global())
    }

    /// Top-level declarations: globals and the file's own root-container names.
    pub fn top_level(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.symbols.iter().filter(|s| match &s.scope {
            Scope::Global { .. } => true,
            Scope::Local { container } => container.is_empty(),
        })
    }

    /// Distinct symbol literals in first-seen order.
    pub fn symbol_literals(&self) -> Vec<&str> {
        let literals = self
            .occurrences
            .iter()
            .filter(|o| o.kind == OccurrenceType::SymbolLiteral && o.text.len() > 1)
            .map(|o| o.text.as_str());
        dedup_by_key(literals, |s| *s)
    }

    pub fn word_at(&self, pos: Position) -> Option<Occurrence> {
        extract::word_at(&self.parsed, self.parsed.position_to_offset(pos))
    }

    /// Name of the lambda around `pos`, `""` at the top level.
    pub fn container_at(&self, pos: Position) -> String {
        let node = self.parsed.node_at_position(pos);
        extract::container_of(&self.parsed, node)
    }
}
