use crate::parser::parse;
use crate::token::TokenKind;
use crate::tree::{NodeId, NodeKind, SyntaxTree};

fn all_of(tree: &SyntaxTree, kind: NodeKind) -> Vec<NodeId> {
    tree.descendants(tree.root()).filter(|n| tree.kind(*n) == kind).collect()
}

fn first_of(tree: &SyntaxTree, kind: NodeKind) -> NodeId {
    all_of(tree, kind)
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("no {:?} node", kind))
}

fn named_kinds(tree: &SyntaxTree, id: NodeId) -> Vec<NodeKind> {
    tree.named_children(id).map(|c| tree.kind(c)).collect()
}

#[test]
fn lambda_assignment() {
    let src = "f:{[x;y] x+y}";
    let parsed = parse(src);
    assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
    let tree = &parsed.tree;

    let assign = first_of(tree, NodeKind::Assignment);
    let lhs = tree.first_named_child(assign).unwrap();
    assert_eq!(tree.text(lhs, src), "f");
    let rhs = tree.next_named_sibling(lhs).unwrap();
    assert_eq!(tree.kind(rhs), NodeKind::Expression);
    let lambda = tree.first_named_child(rhs).unwrap();
    assert_eq!(tree.kind(lambda), NodeKind::FuncDefinition);

    let params = first_of(tree, NodeKind::FormalParameters);
    let names: Vec<&str> = tree.named_children(params).map(|p| tree.text(p, src)).collect();
    assert_eq!(names, vec!["x", "y"]);
}

#[test]
fn call_keeps_empty_argument_slots() {
    let src = "f[1;]";
    let parsed = parse(src);
    assert!(parsed.errors.is_empty());
    let tree = &parsed.tree;
    let call = first_of(tree, NodeKind::Call);
    assert_eq!(
        named_kinds(tree, call),
        vec![
            NodeKind::Token(TokenKind::LocalIdentifier),
            NodeKind::Argument,
            NodeKind::Argument
        ]
    );
    let args = all_of(tree, NodeKind::Argument);
    assert!(tree.span(args[1]).is_empty());
    assert_eq!(tree.span(args[1]).start, 4);
}

#[test]
fn unterminated_call_still_has_trailing_slot() {
    let src = "f:{[x;y] x+y}\nf[1;";
    let parsed = parse(src);
    assert_eq!(parsed.errors.len(), 1);
    assert!(parsed.errors[0].message.contains("Unclosed '['"));
    let tree = &parsed.tree;
    let call = first_of(tree, NodeKind::Call);
    let args: Vec<NodeId> = tree
        .named_children(call)
        .filter(|c| tree.kind(*c) == NodeKind::Argument)
        .collect();
    assert_eq!(args.len(), 2);
    assert_eq!(tree.span(args[1]).start, src.len());
}

#[test]
fn table_columns_are_not_assignments() {
    let src = "t:([] a:1 2; b:`x`y)";
    let parsed = parse(src);
    assert!(parsed.errors.is_empty());
    let tree = &parsed.tree;
    assert_eq!(all_of(tree, NodeKind::Assignment).len(), 1);
    assert_eq!(all_of(tree, NodeKind::TableColumn).len(), 2);
    assert_eq!(all_of(tree, NodeKind::Table).len(), 1);
}

#[test]
fn keyed_table() {
    let src = "kt:([id:1 2] v:3 4)";
    let tree = parse(src).tree;
    assert_eq!(all_of(&tree, NodeKind::TableColumn).len(), 2);
    assert_eq!(all_of(&tree, NodeKind::Assignment).len(), 1);
}

#[test]
fn qsql_renames_are_columns() {
    let src = "select total:sum qty by sym from trade";
    let tree = parse(src).tree;
    assert!(all_of(&tree, NodeKind::Assignment).is_empty());
    assert_eq!(all_of(&tree, NodeKind::TableColumn).len(), 1);
}

#[test]
fn stray_closer_becomes_error_node() {
    let src = ")abc";
    let parsed = parse(src);
    assert_eq!(parsed.errors.len(), 1);
    let tree = &parsed.tree;
    assert_eq!(all_of(tree, NodeKind::Error).len(), 1);
    let ident = first_of(tree, NodeKind::Token(TokenKind::LocalIdentifier));
    assert_eq!(tree.text(ident, src), "abc");
}

#[test]
fn statements_split_on_column_zero_lines() {
    let src = "a:1\nb:2";
    let tree = parse(src).tree;
    let assigns = all_of(&tree, NodeKind::Assignment);
    assert_eq!(assigns.len(), 2);
    for a in assigns {
        let stmt = tree.parent(a).unwrap();
        assert_eq!(tree.parent(stmt), Some(tree.root()));
    }
}

#[test]
fn node_at_offset_prefers_token_starting_there() {
    let src = "f[1;2]";
    let tree = parse(src).tree;
    let node = tree.node_at_offset(4);
    assert_eq!(tree.kind(node), NodeKind::Token(TokenKind::Number));
    assert_eq!(tree.text(node, src), "2");
}

#[test]
fn indexed_and_compound_assignment() {
    let src = "d[`a]:1";
    let tree = parse(src).tree;
    let assign = first_of(&tree, NodeKind::Assignment);
    assert_eq!(tree.kind(tree.first_named_child(assign).unwrap()), NodeKind::Call);

    let tree = parse("a+:1").tree;
    assert_eq!(all_of(&tree, NodeKind::Assignment).len(), 1);
}

#[test]
fn newlines_inside_lambda_are_whitespace() {
    let src = "f:{\na:1;\nb:2}";
    let parsed = parse(src);
    assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
    let tree = &parsed.tree;
    let lambda = first_of(tree, NodeKind::FuncDefinition);
    let inner = tree
        .descendants(lambda)
        .filter(|n| tree.kind(*n) == NodeKind::Assignment)
        .count();
    assert_eq!(inner, 2);
}

#[test]
fn unclosed_lambda_is_recovered() {
    let src = "f:{x+";
    let parsed = parse(src);
    assert_eq!(parsed.errors.len(), 1);
    assert!(parsed.errors[0].message.contains("Unclosed '{'"));
    assert_eq!(all_of(&parsed.tree, NodeKind::FuncDefinition).len(), 1);
}

#[test]
fn list_versus_parenthesized() {
    let tree = parse("(1;2)").tree;
    assert_eq!(all_of(&tree, NodeKind::List).len(), 1);
    let tree = parse("(1+2)").tree;
    assert_eq!(all_of(&tree, NodeKind::Parenthesized).len(), 1);
}

#[test]
fn debug_dump_lists_every_node() {
    let src = "a:1";
    let tree = parse(src).tree;
    let dump = tree.debug_dump(src);
    assert_eq!(dump.lines().count(), tree.len());
    assert!(dump.contains("LocalIdentifier \"a\""));
}
