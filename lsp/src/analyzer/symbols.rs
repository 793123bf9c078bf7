use serde::Serialize;
use tower_lsp::lsp_types::{self, CompletionItemKind, Range, Url};

/// What a declaration's right-hand side looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SymbolKind {
    Variable,
    Function,
    Table,
    Dict,
    Enum,
    Unknown,
}

impl SymbolKind {
    pub fn to_lsp(self) -> lsp_types::SymbolKind {
        match self {
            SymbolKind::Variable => lsp_types::SymbolKind::VARIABLE,
            SymbolKind::Function => lsp_types::SymbolKind::FUNCTION,
            SymbolKind::Table => lsp_types::SymbolKind::STRUCT,
            SymbolKind::Dict => lsp_types::SymbolKind::OBJECT,
            SymbolKind::Enum => lsp_types::SymbolKind::ENUM,
            SymbolKind::Unknown => lsp_types::SymbolKind::NULL,
        }
    }

    pub fn completion_kind(self) -> CompletionItemKind {
        match self {
            SymbolKind::Function => CompletionItemKind::METHOD,
            SymbolKind::Table => CompletionItemKind::STRUCT,
            SymbolKind::Enum => CompletionItemKind::ENUM,
            _ => CompletionItemKind::VARIABLE,
        }
    }

    /// Data shapes that highlight as types.
    pub fn is_type_like(self) -> bool {
        matches!(self, SymbolKind::Table | SymbolKind::Dict | SymbolKind::Enum)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Scope {
    /// Dotted names. `.a.b.c` lives in `.a.b`, `.f` in the root namespace `.`.
    Global { namespace: String },
    /// Names bound inside a lambda, or at the top level of a file (container `""`).
    Local { container: String },
}

impl Scope {
    pub fn for_global_name(name: &str) -> Scope {
        Scope::Global {
            namespace: namespace_of(name).to_string(),
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Scope::Global { .. })
    }

    pub fn container(&self) -> Option<&str> {
        match self {
            Scope::Local { container } => Some(container),
            Scope::Global { .. } => None,
        }
    }
}

/// Namespace part of a dotted name.
pub fn namespace_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => ".",
        Some(i) => &name[..i],
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub name: String,
    pub parameters: Vec<String>,
    /// Derived from `x`, `y`, `z` usage rather than an explicit `[a;b]` list.
    pub implicit: bool,
}

impl Signature {
    pub fn label(&self) -> String {
        format!("{}[{}]", self.name, self.parameters.join(";"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub scope: Scope,
    /// The whole declaration.
    pub range: Range,
    /// The declared name only.
    pub selection_range: Range,
    pub original_text: String,
    pub signature: Option<Signature>,
    pub is_parameter: bool,
}

impl Symbol {
    /// `.ns.f` -> `f`; plain names are returned as is.
    pub fn unqualified_name(&self) -> &str {
        match self.scope {
            Scope::Global { .. } => self.name.rsplit('.').next().unwrap_or(&self.name),
            Scope::Local { .. } => &self.name,
        }
    }

    pub fn is_global(&self) -> bool {
        self.scope.is_global()
    }

    /// First lines of the declaration, for hovers.
    pub fn preview(&self, max_lines: usize) -> String {
        let mut lines: Vec<&str> = self.original_text.lines().take(max_lines + 1).collect();
        let truncated = lines.len() > max_lines;
        lines.truncate(max_lines);
        let mut out = lines.join("\n");
        if truncated {
            out.push_str("\n...");
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OccurrenceType {
    GlobalIdentifier,
    LocalIdentifier,
    SymbolLiteral,
    Operator,
    Literal,
    SystemCommand,
}

impl OccurrenceType {
    pub fn is_identifier(self) -> bool {
        matches!(self, OccurrenceType::GlobalIdentifier | OccurrenceType::LocalIdentifier)
    }
}

/// A word in a document: every identifier and symbol literal is recorded at
/// extraction time, other leaves are only built on demand for cursor lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    pub text: String,
    pub kind: OccurrenceType,
    pub range: Range,
    pub container: String,
    /// Namespace selected with `\d` when the word was read, `""` for the root.
    pub namespace: String,
}

/// Identity of a symbol for reference matching. Globals are identified by
/// name alone; locals also by the document and container they live in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymbolKey {
    Global(String),
    Local { uri: Url, container: String, name: String },
}

impl SymbolKey {
    pub fn name(&self) -> &str {
        match self {
            SymbolKey::Global(name) => name,
            SymbolKey::Local { name, .. } => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_of_dotted_names() {
        assert_eq!(namespace_of(".f"), ".");
        assert_eq!(namespace_of(".a.b.c"), ".a.b");
        assert_eq!(namespace_of("plain"), ".");
    }

    #[test]
    fn preview_truncates_long_declarations() {
        let sym = Symbol {
            name: "f".into(),
            kind: SymbolKind::Function,
            scope: Scope::Local { container: String::new() },
            range: Range::default(),
            selection_range: Range::default(),
            original_text: "f:{\n a;\n b;\n c}".into(),
            signature: None,
            is_parameter: false,
        };
        assert_eq!(sym.preview(2), "f:{\n a;\n...");
        assert_eq!(sym.preview(10), "f:{\n a;\n b;\n c}");
    }
}
