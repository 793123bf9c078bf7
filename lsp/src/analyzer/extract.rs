//! Declaration and occurrence extraction.
//!
//! One pre-order walk over the tree classifies every assignment, lambda and
//! identifier leaf. Scoping follows q: names bound inside a lambda are local
//! to it, everything else lives at the top level of the file or, for dotted
//! names and names read under `\d .ns`, in the global namespace tree.

use std::collections::HashSet;

use q_core::{NodeId, NodeKind, TokenKind};

use super::parse::ParsedSource;
use super::symbols::{Occurrence, OccurrenceType, Scope, Signature, Symbol, SymbolKind};

const IMPLICIT_PARAMS: [&str; 3] = ["x", "y", "z"];

#[derive(Debug, Default, Clone)]
pub struct Extraction {
    pub symbols: Vec<Symbol>,
    pub occurrences: Vec<Occurrence>,
}

pub fn extract(parsed: &ParsedSource) -> Extraction {
    let mut ex = Extractor {
        parsed,
        out: Extraction::default(),
        seen: HashSet::new(),
        namespace: String::new(),
    };
    for node in parsed.tree.descendants(parsed.tree.root()) {
        ex.visit(node);
    }
    ex.out
}

struct Extractor<'a> {
    parsed: &'a ParsedSource,
    out: Extraction,
    seen: HashSet<(String, Scope)>,
    namespace: String,
}

impl Extractor<'_> {
    fn visit(&mut self, node: NodeId) {
        let parsed = self.parsed;
        match parsed.tree.kind(node) {
            NodeKind::Assignment => self.declare(node),
            NodeKind::FuncDefinition => self.parameters(node),
            NodeKind::Token(TokenKind::SystemCommand) => {
                if let Some(ns) = namespace_switch(parsed.node_text(node)) {
                    self.namespace = ns;
                }
            }
            NodeKind::Token(_) => {
                if let Some(occ) = self.occurrence(node) {
                    self.out.occurrences.push(occ);
                }
            }
            _ => {}
        }
    }

    fn occurrence(&self, leaf: NodeId) -> Option<Occurrence> {
        let kind = occurrence_type(self.parsed.tree.kind(leaf))?;
        if !(kind.is_identifier() || kind == OccurrenceType::SymbolLiteral) {
            return None;
        }
        Some(Occurrence {
            text: self.parsed.node_text(leaf).to_string(),
            kind,
            range: self.parsed.node_range(leaf),
            container: self.container_of(leaf),
            namespace: self.namespace.clone(),
        })
    }

    fn container_of(&self, node: NodeId) -> String {
        enclosing_lambda(self.parsed, node)
            .map(|f| lambda_name(self.parsed, f, &self.namespace))
            .unwrap_or_default()
    }

    fn push(&mut self, symbol: Symbol) {
        if self.seen.insert((symbol.name.clone(), symbol.scope.clone())) {
            self.out.symbols.push(symbol);
        }
    }

    fn declare(&mut self, assign: NodeId) {
        let parsed = self.parsed;
        let tree = &parsed.tree;
        let Some(lhs) = tree.first_named_child(assign) else {
            return;
        };
        if !tree.kind(lhs).is_identifier() {
            // `d[k]:v` amends an existing value.
            return;
        }
        let to_root = match tree.node(lhs).next_sibling.map(|op| tree.kind(op)) {
            Some(NodeKind::Token(TokenKind::Colon)) => false,
            Some(NodeKind::Token(TokenKind::DoubleColon)) => true,
            _ => return,
        };
        let rhs = tree.children(assign).filter(|c| tree.kind(*c) == NodeKind::Expression).last();

        let text = self.parsed.node_text(lhs).to_string();
        let mut container = self.container_of(assign);
        if to_root {
            container.clear();
        }
        let (name, scope) = if tree.kind(lhs) == NodeKind::Token(TokenKind::GlobalIdentifier) {
            let scope = Scope::for_global_name(&text);
            (text, scope)
        } else if container.is_empty() && !self.namespace.is_empty() {
            let name = format!("{}.{}", self.namespace, text);
            let scope = Scope::for_global_name(&name);
            (name, scope)
        } else {
            (text, Scope::Local { container })
        };

        let (kind, lambda) = self.classify(rhs);
        let signature = lambda.map(|f| {
            let (parameters, implicit) = self.parameter_names(f);
            Signature {
                name: name.clone(),
                parameters,
                implicit,
            }
        });
        self.push(Symbol {
            name,
            kind,
            scope,
            range: self.parsed.node_range(assign),
            selection_range: self.parsed.node_range(lhs),
            original_text: self.parsed.node_text(assign).to_string(),
            signature,
            is_parameter: false,
        });
    }

    /// Kind of a declaration from its right-hand side, plus the lambda node
    /// when the value is a function.
    fn classify(&self, rhs: Option<NodeId>) -> (SymbolKind, Option<NodeId>) {
        let tree = &self.parsed.tree;
        let Some(rhs) = rhs else {
            return (SymbolKind::Unknown, None);
        };
        let items: Vec<NodeId> = tree.named_children(rhs).collect();
        let is_op = |n: NodeId, op: &str| {
            tree.kind(n) == NodeKind::Token(TokenKind::Operator) && self.parsed.node_text(n) == op
        };
        match items.as_slice() {
            [] => (SymbolKind::Unknown, None),
            [only] => match tree.kind(*only) {
                NodeKind::FuncDefinition => (SymbolKind::Function, Some(*only)),
                NodeKind::Table => (SymbolKind::Table, None),
                NodeKind::Assignment => {
                    let inner = tree.children(*only).filter(|c| tree.kind(*c) == NodeKind::Expression).last();
                    self.classify(inner)
                }
                _ => (SymbolKind::Variable, None),
            },
            [first, second, ..]
                if tree.kind(*first) == NodeKind::Token(TokenKind::Symbol)
                    && self.parsed.node_text(*first).len() > 1
                    && is_op(*second, "$") =>
            {
                (SymbolKind::Enum, None)
            }
            _ => {
                let dict = items.windows(2).any(|w| {
                    matches!(
                        tree.kind(w[0]),
                        NodeKind::Token(TokenKind::Symbol) | NodeKind::List | NodeKind::Parenthesized
                    ) && is_op(w[1], "!")
                });
                if dict {
                    (SymbolKind::Dict, None)
                } else {
                    (SymbolKind::Variable, None)
                }
            }
        }
    }

    fn parameters(&mut self, func: NodeId) {
        let parsed = self.parsed;
        let tree = &parsed.tree;
        let container = lambda_name(self.parsed, func, &self.namespace);
        let explicit = tree
            .children(func)
            .find(|c| tree.kind(*c) == NodeKind::FormalParameters);
        let params: Vec<NodeId> = match explicit {
            Some(list) => tree
                .named_children(list)
                .filter(|p| tree.kind(*p) == NodeKind::Token(TokenKind::LocalIdentifier))
                .collect(),
            None => {
                let (names, _) = self.parameter_names(func);
                names
                    .iter()
                    .filter_map(|name| self.implicit_uses(func).find(|n| self.parsed.node_text(*n) == name))
                    .collect()
            }
        };
        for param in params {
            let range = self.parsed.node_range(param);
            self.push(Symbol {
                name: self.parsed.node_text(param).to_string(),
                kind: SymbolKind::Variable,
                scope: Scope::Local {
                    container: container.clone(),
                },
                range,
                selection_range: range,
                original_text: self.parsed.node_text(param).to_string(),
                signature: None,
                is_parameter: true,
            });
        }
    }

    /// Declared parameter names, or `x`, `y`, `z` up to the highest one the
    /// body reads when there is no parameter list.
    fn parameter_names(&self, func: NodeId) -> (Vec<String>, bool) {
        let tree = &self.parsed.tree;
        if let Some(list) = tree
            .children(func)
            .find(|c| tree.kind(*c) == NodeKind::FormalParameters)
        {
            let names = tree
                .named_children(list)
                .filter(|p| tree.kind(*p) == NodeKind::Token(TokenKind::LocalIdentifier))
                .map(|p| self.parsed.node_text(p).to_string())
                .collect();
            return (names, false);
        }
        let arity = self
            .implicit_uses(func)
            .filter_map(|n| IMPLICIT_PARAMS.iter().position(|p| *p == self.parsed.node_text(n)))
            .max()
            .map(|i| i + 1)
            .unwrap_or(0);
        let names = IMPLICIT_PARAMS[..arity].iter().map(|s| s.to_string()).collect();
        (names, true)
    }

    /// `x`, `y`, `z` leaves that belong to `func` itself and not to a nested lambda.
    fn implicit_uses(&self, func: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let tree = &self.parsed.tree;
        tree.descendants(func).filter(move |n| {
            tree.kind(*n) == NodeKind::Token(TokenKind::LocalIdentifier)
                && IMPLICIT_PARAMS.contains(&self.parsed.node_text(*n))
                && enclosing_lambda(self.parsed, *n) == Some(func)
        })
    }
}

pub(crate) fn occurrence_type(kind: NodeKind) -> Option<OccurrenceType> {
    match kind {
        NodeKind::Token(TokenKind::GlobalIdentifier) => Some(OccurrenceType::GlobalIdentifier),
        NodeKind::Token(TokenKind::LocalIdentifier) => Some(OccurrenceType::LocalIdentifier),
        NodeKind::Token(TokenKind::Symbol) => Some(OccurrenceType::SymbolLiteral),
        NodeKind::Token(TokenKind::Operator) => Some(OccurrenceType::Operator),
        NodeKind::Token(TokenKind::Number | TokenKind::String) => Some(OccurrenceType::Literal),
        NodeKind::Token(TokenKind::SystemCommand) => Some(OccurrenceType::SystemCommand),
        _ => None,
    }
}

/// `\d .ns` selects a namespace; `\d .` returns to the root (`""`).
pub(crate) fn namespace_switch(command: &str) -> Option<String> {
    let arg = command.strip_prefix("\\d")?;
    if !arg.starts_with(char::is_whitespace) {
        return None;
    }
    let arg = arg.trim();
    match arg {
        "" => None,
        "." => Some(String::new()),
        ns if ns.starts_with('.') => Some(ns.to_string()),
        ns => Some(format!(".{}", ns)),
    }
}

/// Namespace in effect at `offset`.
pub(crate) fn namespace_at(parsed: &ParsedSource, offset: usize) -> String {
    let tree = &parsed.tree;
    let mut ns = String::new();
    for stmt in tree.children(tree.root()) {
        if tree.span(stmt).start > offset {
            break;
        }
        let Some(first) = tree.children(stmt).next() else {
            continue;
        };
        if tree.kind(first) == NodeKind::Token(TokenKind::SystemCommand) {
            if let Some(next) = namespace_switch(parsed.node_text(first)) {
                ns = next;
            }
        }
    }
    ns
}

fn enclosing_lambda(parsed: &ParsedSource, node: NodeId) -> Option<NodeId> {
    parsed
        .tree
        .ancestors(node)
        .find(|a| parsed.tree.kind(*a) == NodeKind::FuncDefinition)
}

/// Name of the lambda enclosing `node`, `""` at the top level.
pub fn container_of(parsed: &ParsedSource, node: NodeId) -> String {
    enclosing_lambda(parsed, node)
        .map(|f| lambda_name(parsed, f, &namespace_at(parsed, parsed.tree.span(f).start)))
        .unwrap_or_default()
}

/// A lambda is named after the declaration it is assigned to, qualified by
/// the `\d` namespace `ns` like the declaration itself. Anything else gets an
/// id derived from its position.
pub fn lambda_name(parsed: &ParsedSource, func: NodeId, ns: &str) -> String {
    declared_name(parsed, func, ns).unwrap_or_else(|| format!("<lambda:{}>", parsed.tree.span(func).start))
}

fn declared_name(parsed: &ParsedSource, func: NodeId, ns: &str) -> Option<String> {
    let tree = &parsed.tree;
    let expr = tree.parent(func)?;
    if tree.kind(expr) != NodeKind::Expression || tree.first_named_child(expr) != Some(func) {
        return None;
    }
    let assign = tree.parent(expr)?;
    if tree.kind(assign) != NodeKind::Assignment {
        return None;
    }
    let lhs = tree.first_named_child(assign)?;
    let text = parsed.node_text(lhs);
    match tree.kind(lhs) {
        NodeKind::Token(TokenKind::GlobalIdentifier) => Some(text.to_string()),
        kind if kind.is_identifier() => {
            let to_root = tree.node(lhs).next_sibling.map(|op| tree.kind(op))
                == Some(NodeKind::Token(TokenKind::DoubleColon));
            let top_level = to_root || enclosing_lambda(parsed, assign).is_none();
            if top_level && !ns.is_empty() {
                Some(format!("{}.{}", ns, text))
            } else {
                Some(text.to_string())
            }
        }
        _ => None,
    }
}

/// The word at `offset`, classified and placed in its container.
pub fn word_at(parsed: &ParsedSource, offset: usize) -> Option<Occurrence> {
    let leaf = parsed.leaf_at_offset(offset)?;
    let kind = occurrence_type(parsed.tree.kind(leaf))?;
    Some(Occurrence {
        text: parsed.node_text(leaf).to_string(),
        kind,
        range: parsed.node_range(leaf),
        container: container_of(parsed, leaf),
        namespace: namespace_at(parsed, offset),
    })
}
