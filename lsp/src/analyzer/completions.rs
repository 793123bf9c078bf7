use tower_lsp::lsp_types::{CompletionItem, CompletionItemKind, Position, Url};

use super::builtins;
use super::symbols::{Scope, Symbol};
use super::utils::dedup_by_key;
use super::Analyzer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Workspace,
    Server,
}

fn symbol_item(sym: &Symbol, origin: Origin) -> CompletionItem {
    let detail = match (&sym.scope, origin) {
        (_, Origin::Server) => "server".to_string(),
        (Scope::Global { .. }, Origin::Workspace) => "global".to_string(),
        (Scope::Local { container }, Origin::Workspace) if container.is_empty() => "top-level".to_string(),
        (Scope::Local { container }, Origin::Workspace) => format!("local to {}", container),
    };
    CompletionItem {
        label: sym.name.clone(),
        kind: Some(sym.kind.completion_kind()),
        detail: Some(match &sym.signature {
            Some(sig) => format!("{} {}", detail, sig.label()),
            None => detail,
        }),
        ..Default::default()
    }
}

impl Analyzer {
    /// Candidates for the word just before the cursor. A leading `.` lists
    /// global names, a leading backtick lists the file's symbol literals, and
    /// anything else lists what is in scope at the cursor. Labels are unique;
    /// the first candidate with a label wins.
    pub fn completions(&self, uri: &Url, pos: Position) -> Vec<CompletionItem> {
        let Some(doc) = self.workspace.document(uri) else {
            return Vec::new();
        };
        let back = Position::new(pos.line, pos.character.saturating_sub(1));
        let word = doc.word_at(back);
        let prefix = word.as_ref().map(|w| w.text.as_str()).unwrap_or("");

        let items: Vec<CompletionItem> = if prefix.starts_with('.') {
            let builtin = builtins::builtins().iter().filter(|b| b.is_global()).map(|b| b.completion_item());
            let server = self
                .cache
                .symbols()
                .iter()
                .filter(|s| s.name.starts_with('.'))
                .map(|s| symbol_item(s, Origin::Server));
            let workspace = self.workspace.globals().map(|(_, s)| symbol_item(s, Origin::Workspace));
            builtin.chain(server).chain(workspace).collect()
        } else if prefix.starts_with('`') {
            doc.symbol_literals()
                .into_iter()
                .map(|literal| CompletionItem {
                    label: literal.to_string(),
                    kind: Some(CompletionItemKind::ENUM),
                    ..Default::default()
                })
                .collect()
        } else {
            let container = match &word {
                Some(w) => w.container.clone(),
                None => doc.container_at(back),
            };
            let builtin = builtins::builtins().iter().filter(|b| !b.is_global()).map(|b| b.completion_item());
            let locals = doc.locals(&container).map(|s| symbol_item(s, Origin::Workspace));
            let top_level = (!container.is_empty())
                .then(|| doc.locals("").map(|s| symbol_item(s, Origin::Workspace)))
                .into_iter()
                .flatten();
            let server = self.cache.symbols().iter().map(|s| symbol_item(s, Origin::Server));
            let workspace = self.workspace.globals().map(|(_, s)| symbol_item(s, Origin::Workspace));
            builtin
                .chain(locals)
                .chain(top_level)
                .chain(server)
                .chain(workspace)
                .collect()
        };
        dedup_by_key(items, |item| item.label.clone())
    }
}
