use std::collections::HashSet;

use q_lsp::analyzer::{Analyzer, AnalyzeOutcome, ScannedSources};
use tower_lsp::lsp_types::{Position, Url};

fn uri(name: &str) -> Url {
    Url::parse(&format!("file:///ws/{name}")).unwrap()
}

fn open(analyzer: &mut Analyzer, name: &str, text: &str) -> Url {
    let u = uri(name);
    analyzer.on_document_changed(u.clone(), text, 1);
    u
}

fn labels(analyzer: &Analyzer, uri: &Url, pos: Position) -> Vec<String> {
    analyzer.completions(uri, pos).into_iter().map(|c| c.label).collect()
}

#[test]
fn global_definitions_are_found_from_any_document() {
    let mut an = Analyzer::new();
    let lib = open(&mut an, "lib.q", ".m.one:1\n.m.two:{x+1}\n.m.three:([] a:1 2)");
    let app = open(&mut an, "app.q", "r:.m.two .m.one\nt:.m.three");

    for (pos, line) in [(Position::new(0, 3), 1), (Position::new(0, 10), 0), (Position::new(1, 4), 2)] {
        let defs = an.find_definition(&app, pos);
        assert_eq!(defs.len(), 1, "at {pos:?}");
        assert_eq!(defs[0].uri, lib);
        assert_eq!(defs[0].range.start, Position::new(line, 0));
    }
}

#[test]
fn local_references_stay_in_their_container_and_document() {
    let mut an = Analyzer::new();
    let text = "f:{[a] a+1}\ng:{[a] a*2}";
    let one = open(&mut an, "one.q", text);
    open(&mut an, "two.q", text);

    let refs = an.find_references(&one, Position::new(0, 7), true);
    assert_eq!(refs.len(), 2);
    assert!(refs.iter().all(|l| l.uri == one && l.range.start.line == 0));
}

#[test]
fn removing_a_document_drops_exactly_its_globals() {
    let mut an = Analyzer::new();
    let a = open(&mut an, "a.q", ".a.x:1\n.a.y:2\nlocal:3");
    let b = open(&mut an, "b.q", ".b.z:3");
    assert_eq!(an.workspace().global_count(), 3);

    assert!(an.workspace().document(&a).is_some());
    an.on_file_watch_event(&a, q_lsp::analyzer::FileChangeKind::Deleted);

    assert_eq!(an.workspace().global_count(), 1);
    assert!(an.workspace().global(".a.x").is_none());
    let (owner, _) = an.workspace().global(".b.z").unwrap();
    assert_eq!(owner.uri, b);
}

#[test]
fn first_registered_document_owns_a_shared_global() {
    let mut an = Analyzer::new();
    let first = open(&mut an, "first.q", ".cfg.port:5010");
    let second = open(&mut an, "second.q", ".cfg.port:6010");
    assert_eq!(an.workspace().global(".cfg.port").unwrap().0.uri, first);

    an.on_file_watch_event(&first, q_lsp::analyzer::FileChangeKind::Deleted);
    assert_eq!(an.workspace().global(".cfg.port").unwrap().0.uri, second);
}

#[test]
fn global_rename_groups_edits_per_document() {
    let mut an = Analyzer::new();
    let a = open(&mut an, "a.q", ".u.f:{x}\n.u.f[1]");
    let b = open(&mut an, "b.q", "r:.u.f[2]\ns:.u.f");
    open(&mut an, "c.q", "unrelated:1");

    let edit = an.rename(&b, Position::new(1, 3), ".u.g").unwrap();
    let changes = edit.changes.unwrap();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[&a].len(), 2);
    assert_eq!(changes[&b].len(), 2);
    assert!(changes.values().flatten().all(|e| e.new_text == ".u.g"));
}

#[test]
fn local_rename_touches_only_its_document() {
    let mut an = Analyzer::new();
    let text = "f:{[a] a+1}";
    let one = open(&mut an, "one.q", text);
    open(&mut an, "two.q", text);

    let edit = an.rename(&one, Position::new(0, 4), "b").unwrap();
    let changes = edit.changes.unwrap();
    assert_eq!(changes.keys().collect::<Vec<_>>(), vec![&one]);
    assert_eq!(changes[&one].len(), 2);
}

#[test]
fn completion_labels_are_unique_and_locals_win() {
    let mut an = Analyzer::new();
    an.on_cache_refresh("val:1\n.s.count:2");
    open(&mut an, "other.q", ".o.val:1");
    let text = "f:{[val] v}\nval:2";
    let u = open(&mut an, "s.q", text);

    let items = an.completions(&u, Position::new(0, 10));
    let unique: HashSet<&str> = items.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(unique.len(), items.len());

    let val: Vec<_> = items.iter().filter(|c| c.label == "val").collect();
    assert_eq!(val.len(), 1);
    assert_eq!(val[0].detail.as_deref(), Some("local to f"));
}

#[test]
fn signature_help_reports_second_parameter() {
    let mut an = Analyzer::new();
    let u = open(&mut an, "s.q", "f:{[x;y] x+y}\nf[1;");
    let help = an.signature_help(&u, Position::new(1, 4)).unwrap();
    assert_eq!(help.active_parameter, Some(1));
    assert_eq!(help.signatures.len(), 1);
    assert_eq!(help.signatures[0].label, "f[x;y]");
}

#[test]
fn leading_close_paren_is_one_diagnostic() {
    let mut an = Analyzer::new();
    let u = open(&mut an, "s.q", "\n)abc\n");
    let diags = an.diagnostics(&u);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "require a space before )");
    assert_eq!(diags[0].range.start, Position::new(1, 0));
}

#[test]
fn cache_refresh_leaves_no_residue() {
    let mut an = Analyzer::new();
    let u = open(&mut an, "s.q", "a:.s");

    an.on_cache_refresh(".s.first:1\n.s.second:{x}");
    let before = labels(&an, &u, Position::new(0, 4));
    assert!(before.contains(&".s.first".to_string()));

    an.on_cache_refresh(".s.third:3");
    let after = labels(&an, &u, Position::new(0, 4));
    assert!(after.contains(&".s.third".to_string()));
    assert!(!after.contains(&".s.first".to_string()));
    assert!(!after.contains(&".s.second".to_string()));
    assert_eq!(an.server_cache().symbols().len(), 1);
}

#[test]
fn disk_scan_never_replaces_an_open_buffer() {
    let mut an = Analyzer::new();
    let u = open(&mut an, "s.q", ".e.edited:1");

    let plan = an.plan_scan(&[], &[]).unwrap();
    let scanned = ScannedSources {
        files: vec![(u.clone(), ".e.ondisk:1".to_string()), (uri("new.q"), ".n.x:1".to_string())],
        warnings: Vec::new(),
    };
    let report = an.apply_scan(plan, scanned);
    assert_eq!(report.stale, 1);
    assert_eq!(report.indexed, 1);
    assert_eq!(an.document(&u).unwrap().text(), ".e.edited:1");
    assert!(an.workspace().global(".e.ondisk").is_none());
    assert!(an.workspace().global(".n.x").is_some());
}

#[test]
fn older_editor_versions_are_rejected() {
    let mut an = Analyzer::new();
    let u = uri("s.q");
    assert_eq!(an.on_document_changed(u.clone(), "a:1", 3), AnalyzeOutcome::Applied);
    assert_eq!(an.on_document_changed(u.clone(), "a:0", 2), AnalyzeOutcome::Stale);
    assert_eq!(an.on_document_changed(u.clone(), "a:1", 4), AnalyzeOutcome::Unchanged);
    assert_eq!(an.document(&u).unwrap().version(), Some(4));
}
