use std::collections::HashMap;

use tower_lsp::lsp_types::{
    DocumentHighlight, DocumentSymbol, Hover, HoverContents, LanguageString, Location, MarkedString, Position,
    Range, TextEdit, Url, WorkspaceEdit,
};

use super::builtins;
use super::document::Document;
use super::symbols::{Occurrence, OccurrenceType, Symbol, SymbolKey, SymbolKind};
use super::Analyzer;

const HOVER_LINES: usize = 8;

impl Analyzer {
    pub fn word_at(&self, uri: &Url, pos: Position) -> Option<Occurrence> {
        self.workspace.document(uri)?.word_at(pos)
    }

    /// Identity of the symbol a word refers to. Only identifiers resolve.
    pub fn resolve(&self, doc: &Document, word: &Occurrence) -> Option<SymbolKey> {
        match word.kind {
            OccurrenceType::GlobalIdentifier => Some(SymbolKey::Global(word.text.clone())),
            OccurrenceType::LocalIdentifier => Some(self.resolve_local(doc, word)),
            _ => None,
        }
    }

    /// Lambda locals first, then the file's top level, then the namespace
    /// selected with `\d`. An unbound name stays keyed to its own container.
    fn resolve_local(&self, doc: &Document, word: &Occurrence) -> SymbolKey {
        let local = |container: &str| SymbolKey::Local {
            uri: doc.uri.clone(),
            container: container.to_string(),
            name: word.text.clone(),
        };
        if doc.local(&word.container, &word.text).is_some() {
            return local(&word.container);
        }
        if !word.container.is_empty() && doc.local("", &word.text).is_some() {
            return local("");
        }
        if !word.namespace.is_empty() {
            let qualified = format!("{}.{}", word.namespace, word.text);
            if word.container.is_empty() || self.workspace.global(&qualified).is_some() {
                return SymbolKey::Global(qualified);
            }
        }
        local(&word.container)
    }

    pub fn symbol_for(&self, key: &SymbolKey) -> Option<(&Document, &Symbol)> {
        match key {
            SymbolKey::Global(name) => self.workspace.global(name),
            SymbolKey::Local { uri, container, name } => {
                let doc = self.workspace.document(uri)?;
                Some((doc, doc.local(container, name)?))
            }
        }
    }

    pub fn find_definition(&self, uri: &Url, pos: Position) -> Vec<Location> {
        let Some(doc) = self.workspace.document(uri) else {
            return Vec::new();
        };
        match doc.word_at(pos) {
            Some(word) => self.definition_of(doc, &word),
            None => Vec::new(),
        }
    }

    pub fn definition_of(&self, doc: &Document, word: &Occurrence) -> Vec<Location> {
        self.resolve(doc, word)
            .and_then(|key| self.symbol_for(&key))
            .map(|(owner, sym)| vec![owner.location(sym.selection_range)])
            .unwrap_or_default()
    }

    pub fn find_references(&self, uri: &Url, pos: Position, include_declaration: bool) -> Vec<Location> {
        let Some(doc) = self.workspace.document(uri) else {
            return Vec::new();
        };
        let Some(word) = doc.word_at(pos) else {
            return Vec::new();
        };
        let mut refs = self.references_of(doc, &word);
        if !include_declaration {
            let decl = self.definition_of(doc, &word);
            refs.retain(|loc| !decl.contains(loc));
        }
        refs
    }

    /// Every occurrence that resolves to the same symbol as `word`. Globals are
    /// searched across the workspace, locals only in their own document.
    pub fn references_of(&self, doc: &Document, word: &Occurrence) -> Vec<Location> {
        self.matching_occurrences(doc, word)
            .into_iter()
            .map(|(d, occ)| d.location(occ.range))
            .collect()
    }

    fn matching_occurrences<'a>(
        &'a self,
        doc: &'a Document,
        word: &Occurrence,
    ) -> Vec<(&'a Document, &'a Occurrence)> {
        let Some(key) = self.resolve(doc, word) else {
            return Vec::new();
        };
        let docs: Vec<&Document> = match key {
            SymbolKey::Global(_) => self.workspace.documents().collect(),
            SymbolKey::Local { .. } => vec![doc],
        };
        let mut out = Vec::new();
        for d in docs {
            for occ in &d.occurrences {
                if !occ.kind.is_identifier() || !key.name().ends_with(occ.text.as_str()) {
                    continue;
                }
                if self.resolve(d, occ).as_ref() == Some(&key) {
                    out.push((d, occ));
                }
            }
        }
        out
    }

    pub fn document_highlights(&self, uri: &Url, pos: Position) -> Vec<DocumentHighlight> {
        let Some(doc) = self.workspace.document(uri) else {
            return Vec::new();
        };
        let Some(word) = doc.word_at(pos) else {
            return Vec::new();
        };
        let ranges: Vec<Range> = if word.kind == OccurrenceType::SymbolLiteral {
            doc.occurrences
                .iter()
                .filter(|o| o.kind == OccurrenceType::SymbolLiteral && o.text == word.text)
                .map(|o| o.range)
                .collect()
        } else {
            self.references_of(doc, &word)
                .into_iter()
                .filter(|loc| loc.uri == doc.uri)
                .map(|loc| loc.range)
                .collect()
        };
        ranges
            .into_iter()
            .map(|range| DocumentHighlight { range, kind: None })
            .collect()
    }

    pub fn prepare_rename(&self, uri: &Url, pos: Position) -> Option<Range> {
        let word = self.word_at(uri, pos)?;
        word.kind.is_identifier().then_some(word.range)
    }

    /// Replaces every matching occurrence, grouped per document. A global
    /// written both as `.ns.f` and as bare `f` under `\d .ns` keeps each
    /// spelling.
    pub fn rename(&self, uri: &Url, pos: Position, new_name: &str) -> Option<WorkspaceEdit> {
        let doc = self.workspace.document(uri)?;
        let word = doc.word_at(pos)?;
        if !word.kind.is_identifier() {
            return None;
        }
        let spelling = match self.resolve(doc, &word)? {
            SymbolKey::Global(name) => Spelling::for_global(&name, new_name),
            SymbolKey::Local { .. } => Spelling::plain(new_name),
        };
        let mut changes: HashMap<Url, Vec<TextEdit>> = HashMap::new();
        for (d, occ) in self.matching_occurrences(doc, &word) {
            changes
                .entry(d.uri.clone())
                .or_default()
                .push(TextEdit::new(occ.range, spelling.for_occurrence(&occ.text).to_string()));
        }
        Some(WorkspaceEdit {
            changes: Some(changes),
            ..Default::default()
        })
    }

    /// Outline of a file: top-level declarations, with each function's
    /// parameters and locals nested under it.
    pub fn document_symbols(&self, uri: &Url) -> Vec<DocumentSymbol> {
        let Some(doc) = self.workspace.document(uri) else {
            return Vec::new();
        };
        doc.top_level()
            .map(|sym| {
                let children = (sym.kind == SymbolKind::Function)
                    .then(|| doc.locals(&sym.name).map(outline_entry).collect::<Vec<_>>());
                DocumentSymbol {
                    children: children.filter(|c| !c.is_empty()),
                    ..outline_entry(sym)
                }
            })
            .collect()
    }

    pub fn hover(&self, uri: &Url, pos: Position) -> Option<Hover> {
        let doc = self.workspace.document(uri)?;
        let word = doc.word_at(pos)?;
        let value = if let Some(builtin) = builtins::find(&word.text) {
            builtin.hover_text()
        } else if let Some((_, sym)) = self.resolve(doc, &word).and_then(|key| self.symbol_for(&key)) {
            sym.preview(HOVER_LINES)
        } else if word.kind.is_identifier() {
            self.cache.find(&word.text)?.preview(HOVER_LINES)
        } else {
            return None;
        };
        Some(Hover {
            contents: HoverContents::Scalar(MarkedString::LanguageString(LanguageString {
                language: "q".to_string(),
                value,
            })),
            range: Some(word.range),
        })
    }
}

/// Replacement text for a rename, one per way a name can be written.
struct Spelling {
    qualified: String,
    bare: String,
}

impl Spelling {
    fn plain(new_name: &str) -> Self {
        Self {
            qualified: new_name.to_string(),
            bare: new_name.to_string(),
        }
    }

    /// `old` is the global being renamed. A bare new name stays in the old
    /// namespace; a dotted one is written out in full unless it only changes
    /// the leaf.
    fn for_global(old: &str, new_name: &str) -> Self {
        let prefix = old.rfind('.').map(|i| &old[..=i]).unwrap_or("");
        if new_name.starts_with('.') {
            let bare = match new_name.strip_prefix(prefix) {
                Some(leaf) if !prefix.is_empty() && !leaf.contains('.') => leaf,
                _ => new_name,
            };
            Self {
                qualified: new_name.to_string(),
                bare: bare.to_string(),
            }
        } else {
            Self {
                qualified: format!("{}{}", prefix, new_name),
                bare: new_name.to_string(),
            }
        }
    }

    fn for_occurrence(&self, text: &str) -> &str {
        if text.starts_with('.') {
            &self.qualified
        } else {
            &self.bare
        }
    }
}

#[allow(deprecated)]
fn outline_entry(sym: &Symbol) -> DocumentSymbol {
    DocumentSymbol {
        name: sym.name.clone(),
        detail: sym.signature.as_ref().map(|s| s.label()),
        kind: sym.kind.to_lsp(),
        tags: None,
        deprecated: None,
        range: sym.range,
        selection_range: sym.selection_range,
        children: None,
    }
}
