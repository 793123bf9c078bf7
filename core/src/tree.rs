//! Index-addressed syntax tree.
//!
//! Nodes live in one `Vec` and refer to each other through `NodeId`s, so the
//! tree can be shared behind an `Arc` and walked in any direction without
//! reference cycles.

use serde::Serialize;

use crate::token::{Span, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Program,
    Expression,
    Assignment,
    FuncDefinition,
    FormalParameters,
    Call,
    Argument,
    Block,
    List,
    Parenthesized,
    Table,
    TableColumn,
    Error,
    Token(TokenKind),
}

impl NodeKind {
    /// Punctuation leaves are structural noise for navigation purposes.
    pub fn is_named(self) -> bool {
        !matches!(
            self,
            NodeKind::Token(
                TokenKind::LParen
                    | TokenKind::RParen
                    | TokenKind::LBracket
                    | TokenKind::RBracket
                    | TokenKind::LBrace
                    | TokenKind::RBrace
                    | TokenKind::Semicolon
                    | TokenKind::Colon
                    | TokenKind::DoubleColon
                    | TokenKind::Newline
            )
        )
    }

    pub fn is_leaf(self) -> bool {
        matches!(self, NodeKind::Token(_))
    }

    pub fn is_identifier(self) -> bool {
        matches!(
            self,
            NodeKind::Token(TokenKind::GlobalIdentifier | TokenKind::LocalIdentifier)
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub last_child: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    pub prev_sibling: Option<NodeId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
}

impl SyntaxTree {
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).span
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn text<'s>(&self, id: NodeId, src: &'s str) -> &'s str {
        let span = self.span(id);
        src.get(span.start..span.end).unwrap_or("")
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.node(id).first_child,
        }
    }

    pub fn named_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).filter(move |c| self.kind(*c).is_named())
    }

    pub fn first_named_child(&self, id: NodeId) -> Option<NodeId> {
        self.named_children(id).next()
    }

    pub fn next_named_sibling(&self, id: NodeId) -> Option<NodeId> {
        let mut cur = self.node(id).next_sibling;
        while let Some(n) = cur {
            if self.kind(n).is_named() {
                return Some(n);
            }
            cur = self.node(n).next_sibling;
        }
        None
    }

    pub fn prev_named_sibling(&self, id: NodeId) -> Option<NodeId> {
        let mut cur = self.node(id).prev_sibling;
        while let Some(n) = cur {
            if self.kind(n).is_named() {
                return Some(n);
            }
            cur = self.node(n).prev_sibling;
        }
        None
    }

    /// Walks from the parent of `id` up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |n| self.parent(*n))
    }

    /// Pre-order walk over `id` and everything below it, in source order.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: vec![id],
        }
    }

    /// Indented outline, one node per line. Leaves show their text.
    pub fn debug_dump(&self, src: &str) -> String {
        let mut out = String::new();
        for id in self.descendants(self.root()) {
            let depth = self.ancestors(id).count();
            let node = self.node(id);
            let label = match node.kind {
                NodeKind::Token(k) => format!("{:?} {:?}", k, self.text(id, src)),
                k => format!("{:?}", k),
            };
            out.push_str(&format!("{}{}@{}\n", "  ".repeat(depth), label, node.span));
        }
        out
    }

    /// Deepest node whose span touches `offset`. Later siblings win ties, so a
    /// cursor between two tokens resolves to the one that starts there.
    pub fn node_at_offset(&self, offset: usize) -> NodeId {
        let mut current = self.root();
        loop {
            let hit = self
                .children(current)
                .filter(|c| self.span(*c).touches(offset))
                .last();
            match hit {
                Some(child) => current = child,
                None => return current,
            }
        }
    }
}

pub struct Children<'a> {
    tree: &'a SyntaxTree,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.next?;
        self.next = self.tree.node(cur).next_sibling;
        Some(cur)
    }
}

pub struct Descendants<'a> {
    tree: &'a SyntaxTree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.stack.pop()?;
        let mut child = self.tree.node(cur).last_child;
        while let Some(c) = child {
            self.stack.push(c);
            child = self.tree.node(c).prev_sibling;
        }
        Some(cur)
    }
}

/// Marks a position among the children of the currently open node.
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    parent: NodeId,
    after: Option<NodeId>,
}

/// Builds a `SyntaxTree` top-down. Spans of inner nodes are computed from
/// their children when finished; empty nodes take the position they were
/// opened at.
pub struct TreeBuilder {
    nodes: Vec<Node>,
    open: Vec<NodeId>,
    open_at: Vec<usize>,
}

impl TreeBuilder {
    pub fn new(source_len: usize) -> Self {
        let root = Node {
            kind: NodeKind::Program,
            span: Span::new(0, source_len),
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            prev_sibling: None,
        };
        Self {
            nodes: vec![root],
            open: vec![NodeId(0)],
            open_at: vec![0],
        }
    }

    fn current(&self) -> NodeId {
        *self.open.last().unwrap_or(&NodeId(0))
    }

    fn alloc(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            span,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            prev_sibling: None,
        });
        id
    }

    fn append(&mut self, parent: NodeId, child: NodeId) {
        let prev = self.nodes[parent.index()].last_child;
        {
            let c = &mut self.nodes[child.index()];
            c.parent = Some(parent);
            c.prev_sibling = prev;
            c.next_sibling = None;
        }
        match prev {
            Some(p) => self.nodes[p.index()].next_sibling = Some(child),
            None => self.nodes[parent.index()].first_child = Some(child),
        }
        self.nodes[parent.index()].last_child = Some(child);
    }

    pub fn start_node(&mut self, kind: NodeKind, at: usize) -> NodeId {
        let parent = self.current();
        let id = self.alloc(kind, Span::empty(at));
        self.append(parent, id);
        self.open.push(id);
        self.open_at.push(at);
        id
    }

    pub fn token(&mut self, kind: TokenKind, span: Span) -> NodeId {
        let parent = self.current();
        let id = self.alloc(NodeKind::Token(kind), span);
        self.append(parent, id);
        id
    }

    pub fn checkpoint(&self) -> Checkpoint {
        let parent = self.current();
        Checkpoint {
            parent,
            after: self.nodes[parent.index()].last_child,
        }
    }

    /// Opens a node that adopts every child added to the checkpoint's parent since
    /// the checkpoint was taken.
    pub fn start_node_at(&mut self, cp: Checkpoint, kind: NodeKind) -> NodeId {
        debug_assert_eq!(cp.parent, self.current(), "checkpoint taken under another node");
        let parent = cp.parent;
        let first_moved = match cp.after {
            Some(a) => self.nodes[a.index()].next_sibling,
            None => self.nodes[parent.index()].first_child,
        };
        let at = first_moved
            .map(|n| self.nodes[n.index()].span.start)
            .unwrap_or_else(|| *self.open_at.last().unwrap_or(&0));

        // Detach the adopted run from the parent.
        let old_last = self.nodes[parent.index()].last_child;
        match cp.after {
            Some(a) => self.nodes[a.index()].next_sibling = None,
            None => self.nodes[parent.index()].first_child = None,
        }
        self.nodes[parent.index()].last_child = cp.after;

        let id = self.alloc(kind, Span::empty(at));
        self.append(parent, id);
        if let Some(first) = first_moved {
            self.nodes[first.index()].prev_sibling = None;
            self.nodes[id.index()].first_child = Some(first);
            self.nodes[id.index()].last_child = old_last;
            let mut cur = Some(first);
            while let Some(c) = cur {
                self.nodes[c.index()].parent = Some(id);
                cur = self.nodes[c.index()].next_sibling;
            }
        }
        self.open.push(id);
        self.open_at.push(at);
        id
    }

    pub fn finish_node(&mut self) -> NodeId {
        let id = self.open.pop().unwrap_or(NodeId(0));
        let at = self.open_at.pop().unwrap_or(0);
        let node = &self.nodes[id.index()];
        let span = match (node.first_child, node.last_child) {
            (Some(f), Some(l)) => Span::new(self.nodes[f.index()].span.start, self.nodes[l.index()].span.end),
            _ => Span::empty(at),
        };
        self.nodes[id.index()].span = span;
        id
    }

    pub fn finish(mut self) -> SyntaxTree {
        while self.open.len() > 1 {
            self.finish_node();
        }
        SyntaxTree { nodes: self.nodes }
    }
}
