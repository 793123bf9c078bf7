use super::*;
use tower_lsp::lsp_types::{HoverContents, MarkedString, Position, Range, SemanticToken, TextEdit};

fn uri(name: &str) -> Url {
    Url::parse(&format!("file:///ws/{name}")).unwrap()
}

fn open(analyzer: &mut Analyzer, name: &str, text: &str) -> Url {
    let u = uri(name);
    analyzer.on_document_changed(u.clone(), text, 1);
    u
}

/// Position of the first `needle` in `text`, plus `shift` columns.
fn at(text: &str, needle: &str, shift: u32) -> Position {
    let offset = text.find(needle).unwrap_or_else(|| panic!("{needle:?} not in text"));
    let line = text[..offset].matches('\n').count() as u32;
    let col = offset - text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    Position::new(line, col as u32 + shift)
}

fn range(line: u32, start: u32, end: u32) -> Range {
    Range::new(Position::new(line, start), Position::new(line, end))
}

#[test]
fn definition_crosses_documents() {
    let mut an = Analyzer::new();
    let a = open(&mut an, "a.q", ".u.add:{[a;b] a+b}");
    let b_text = "r:.u.add[1;2]";
    let b = open(&mut an, "b.q", b_text);

    let defs = an.find_definition(&b, at(b_text, ".u.add", 1));
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0].uri, a);
    assert_eq!(defs[0].range, range(0, 0, 6));
}

#[test]
fn parameters_shadow_top_level_names() {
    let mut an = Analyzer::new();
    let text = "f:{[x] x*2}\ng:{[x] x+1}\nx:5";
    let u = open(&mut an, "s.q", text);

    let in_f = an.find_references(&u, Position::new(0, 7), true);
    assert_eq!(in_f.iter().map(|l| l.range).collect::<Vec<_>>(), vec![range(0, 4, 5), range(0, 7, 8)]);

    let top = an.find_references(&u, Position::new(2, 0), true);
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].range, range(2, 0, 1));

    let without_decl = an.find_references(&u, Position::new(0, 7), false);
    assert_eq!(without_decl.len(), 1);
}

#[test]
fn lambdas_see_top_level_names() {
    let mut an = Analyzer::new();
    let text = "n:10\nf:{[a] a+n}";
    let u = open(&mut an, "s.q", text);
    let defs = an.find_definition(&u, at(text, "+n", 1));
    assert_eq!(defs[0].range, range(0, 0, 1));
}

#[test]
fn namespace_names_resolve_inside_functions() {
    let mut an = Analyzer::new();
    let text = "\\d .util\nhelper:{[s] s}\nrun:{helper[1]}";
    let u = open(&mut an, "ns.q", text);
    let defs = an.find_definition(&u, at(text, "helper[", 0));
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0].range, range(1, 0, 6));
    assert!(an.workspace().global(".util.run").is_some());
}

#[test]
fn unresolved_words_yield_nothing() {
    let mut an = Analyzer::new();
    let text = "f:{y+1}\n.no.where[2]";
    let u = open(&mut an, "s.q", text);
    assert!(an.find_definition(&u, at(text, ".no", 0)).is_empty());
    assert!(an.find_definition(&u, at(text, "1", 0)).is_empty());
    assert!(an.find_definition(&uri("missing.q"), Position::new(0, 0)).is_empty());
    assert!(an.hover(&u, at(text, ".no", 0)).is_none());
}

#[test]
fn prepare_rename_only_for_identifiers() {
    let mut an = Analyzer::new();
    let text = "a:`sym;b:42";
    let u = open(&mut an, "s.q", text);
    assert_eq!(an.prepare_rename(&u, Position::new(0, 0)), Some(range(0, 0, 1)));
    assert_eq!(an.prepare_rename(&u, at(text, "`sym", 1)), None);
    assert_eq!(an.prepare_rename(&u, at(text, "42", 0)), None);
}

#[test]
fn rename_local_stays_in_its_container() {
    let mut an = Analyzer::new();
    let text = "f:{[v] v+1}\ng:{[v] v}";
    let u = open(&mut an, "s.q", text);
    let edit = an.rename(&u, Position::new(0, 7), "w").unwrap();
    let changes = edit.changes.unwrap();
    assert_eq!(changes.len(), 1);
    let edits = &changes[&u];
    assert_eq!(edits.len(), 2);
    assert!(edits.iter().all(|e| e.range.start.line == 0 && e.new_text == "w"));
}

#[test]
fn same_function_name_in_two_namespaces_keeps_locals_apart() {
    let mut an = Analyzer::new();
    let text = "\\d .a\nf:{[p] p+1}\n\\d .b\nf:{[p] p*2}";
    let u = open(&mut an, "ns.q", text);

    let refs = an.find_references(&u, Position::new(3, 7), true);
    assert_eq!(refs.iter().map(|l| l.range).collect::<Vec<_>>(), vec![range(3, 4, 5), range(3, 7, 8)]);
    let defs = an.find_definition(&u, Position::new(3, 7));
    assert_eq!(defs[0].range, range(3, 4, 5));

    let edits = an.rename(&u, Position::new(3, 7), "q").unwrap().changes.unwrap();
    assert!(edits[&u].iter().all(|e| e.range.start.line == 3));

    let outline = an.document_symbols(&u);
    let names: Vec<&str> = outline.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec![".a.f", ".b.f"]);
    assert!(outline.iter().all(|s| s.children.as_ref().map(Vec::len) == Some(1)));
}

#[test]
fn rename_keeps_each_spelling_of_a_namespaced_global() {
    let mut an = Analyzer::new();
    let a = open(&mut an, "a.q", "\\d .ns\nf:{x}\ng:f 1");
    let b = open(&mut an, "b.q", "h:.ns.f 2");

    let changes = an.rename(&a, Position::new(2, 2), "k").unwrap().changes.unwrap();
    let texts: Vec<&str> = changes[&a].iter().map(|e| e.new_text.as_str()).collect();
    assert_eq!(texts, vec!["k", "k"]);
    assert_eq!(changes[&b], vec![TextEdit::new(range(0, 2, 7), ".ns.k".to_string())]);

    let changes = an.rename(&b, Position::new(0, 4), ".ns.k").unwrap().changes.unwrap();
    assert!(changes[&a].iter().all(|e| e.new_text == "k"));
    assert_eq!(changes[&b][0].new_text, ".ns.k");

    let changes = an.rename(&b, Position::new(0, 4), ".other.k").unwrap().changes.unwrap();
    assert!(changes.values().flatten().all(|e| e.new_text == ".other.k"));
}

#[test]
fn highlights_symbol_literals_by_value() {
    let mut an = Analyzer::new();
    let text = "a:`x`y`x";
    let u = open(&mut an, "s.q", text);
    let hl = an.document_highlights(&u, Position::new(0, 3));
    assert_eq!(hl.len(), 2);
}

#[test]
fn dot_completion_lists_globals() {
    let mut an = Analyzer::new();
    open(&mut an, "defs.q", ".u.f:1\n.u.g:{x}");
    let text = "a:.u";
    let u = open(&mut an, "use.q", text);
    let labels: Vec<String> = an
        .completions(&u, Position::new(0, 4))
        .into_iter()
        .map(|c| c.label)
        .collect();
    assert!(labels.contains(&".u.f".to_string()));
    assert!(labels.contains(&".u.g".to_string()));
    assert!(labels.contains(&".z.p".to_string()));
    assert!(!labels.contains(&"count".to_string()));
    assert!(!labels.contains(&"a".to_string()));
}

#[test]
fn backtick_completion_lists_symbol_literals() {
    let mut an = Analyzer::new();
    let text = "s:`abc`def`abc\nt:`";
    let u = open(&mut an, "s.q", text);
    let items = an.completions(&u, Position::new(1, 3));
    let labels: Vec<&str> = items.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["`abc", "`def"]);
    assert!(items
        .iter()
        .all(|c| c.kind == Some(tower_lsp::lsp_types::CompletionItemKind::ENUM)));
}

#[test]
fn local_completion_uses_the_cursor_container() {
    let mut an = Analyzer::new();
    let text = "f:{[alpha] al}\ng:{[beta] beta}";
    let u = open(&mut an, "s.q", text);
    let labels: Vec<String> = an
        .completions(&u, Position::new(0, 13))
        .into_iter()
        .map(|c| c.label)
        .collect();
    assert!(labels.contains(&"alpha".to_string()));
    assert!(labels.contains(&"f".to_string()));
    assert!(labels.contains(&"count".to_string()));
    assert!(!labels.contains(&"beta".to_string()));
    assert!(!labels.contains(&".z.p".to_string()));
}

#[test]
fn signature_help_counts_argument_slots() {
    let mut an = Analyzer::new();
    let text = "f:{[x;y] x+y}\nf[1;";
    let u = open(&mut an, "s.q", text);
    let help = an.signature_help(&u, Position::new(1, 4)).unwrap();
    assert_eq!(help.active_parameter, Some(1));
    assert_eq!(help.signatures[0].label, "f[x;y]");

    let first = an.signature_help(&u, Position::new(1, 2)).unwrap();
    assert_eq!(first.active_parameter, Some(0));
}

#[test]
fn signature_help_for_builtins_and_closed_calls() {
    let mut an = Analyzer::new();
    let text = "r:ssr[\"abc\";\"b\"; ";
    let u = open(&mut an, "s.q", text);
    let help = an.signature_help(&u, Position::new(0, text.len() as u32)).unwrap();
    assert_eq!(help.signatures[0].label, "ssr[x;y;z]");
    assert_eq!(help.active_parameter, Some(2));

    let closed = "r:count[1 2] ";
    let u = open(&mut an, "c.q", closed);
    assert!(an.signature_help(&u, Position::new(0, closed.len() as u32)).is_none());
}

#[test]
fn semantic_tokens_follow_declarations() {
    let mut an = Analyzer::new();
    let text = "t:([] c:1 2)\nf:{[p] p+t+.u.v+zz}\n.u.v:1";
    let u = open(&mut an, "s.q", text);
    let tokens = an.semantic_tokens(&u);
    let tok = |delta_line, delta_start, length, token_type| SemanticToken {
        delta_line,
        delta_start,
        length,
        token_type,
        token_modifiers_bitset: 0,
    };
    assert_eq!(
        tokens,
        vec![
            tok(0, 0, 1, 2),
            tok(1, 0, 1, 0),
            tok(0, 4, 1, 1),
            tok(0, 3, 1, 1),
            tok(0, 2, 1, 2),
            tok(0, 2, 4, 3),
            tok(1, 0, 4, 3),
        ]
    );
}

#[test]
fn hover_prefers_builtins_then_declarations() {
    let mut an = Analyzer::new();
    let text = "f:{[a] count a}\nf[1]";
    let u = open(&mut an, "s.q", text);

    let value = |h: tower_lsp::lsp_types::Hover| match h.contents {
        HoverContents::Scalar(MarkedString::LanguageString(ls)) => ls.value,
        other => panic!("unexpected hover {other:?}"),
    };
    let builtin = an.hover(&u, at(text, "count", 1)).unwrap();
    assert_eq!(value(builtin), "/ count[x]\nnumber of items");
    let decl = an.hover(&u, Position::new(1, 0)).unwrap();
    assert_eq!(value(decl), "f:{[a] count a}");
}

#[test]
fn outline_nests_function_locals() {
    let mut an = Analyzer::new();
    let u = open(&mut an, "s.q", "f:{[a] b:a}\n.u.x:1");
    let outline = an.document_symbols(&u);
    let names: Vec<&str> = outline.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["f", ".u.x"]);
    let children: Vec<&str> = outline[0]
        .children
        .as_ref()
        .unwrap()
        .iter()
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(children, vec!["a", "b"]);
    assert_eq!(outline[0].detail.as_deref(), Some("f[a]"));
    assert!(outline[1].children.is_none());
}

#[test]
fn search_ranks_and_truncates() {
    let mut an = Analyzer::new();
    open(&mut an, "s.q", ".u.tradeSummary:2\n.u.trade:1\n.v.x:3");
    let names: Vec<String> = an.search("trade", 10).into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec![".u.trade", ".u.tradeSummary"]);
    assert_eq!(an.search("", 2).len(), 2);
    assert!(an.search("nothing", 10).is_empty());
}

#[test]
fn layout_diagnostic_for_leading_closer() {
    let mut an = Analyzer::new();
    let u = open(&mut an, "s.q", ")abc");
    let diags = an.diagnostics(&u);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "require a space before )");
    assert_eq!(diags[0].source.as_deref(), Some("q-lsp"));
}

#[test]
fn cache_symbols_complete_and_hover() {
    let mut an = Analyzer::new();
    an.on_cache_refresh(".srv.f:{[a;b] a}\ntbl:([] c:1 2)");
    let text = "r:.srv.f[1;";
    let u = open(&mut an, "s.q", text);
    let help = an.signature_help(&u, Position::new(0, text.len() as u32)).unwrap();
    assert_eq!(help.signatures[0].label, ".srv.f[a;b]");
    assert_eq!(help.active_parameter, Some(1));

    let tokens = an.semantic_tokens(&u);
    // `r` is a top-level variable, `.srv.f` comes from the server
    assert_eq!(tokens.iter().map(|t| t.token_type).collect::<Vec<_>>(), vec![0, 3]);
}
