use std::path::{Component, Path};

use anyhow::Context;
use tower_lsp::lsp_types::{DiagnosticSeverity, Url};

use crate::analyzer::Analyzer;

const USAGE: &str = "Usage: q-lsp --analyze [--errors-only] <relative-file-path>\n  --analyze <file>     : Full analysis with JSON output\n  --errors-only        : Show only errors in simple format";

/// One-shot analysis from the command line. Returns `None` when the process
/// should start the language server instead.
pub(crate) fn try_cli_analyze() -> anyhow::Result<Option<String>> {
    let args: Vec<String> = std::env::args().collect();
    let Some(i) = args.iter().position(|a| a == "--analyze") else {
        return Ok(None);
    };
    let path = args[i + 1..]
        .iter()
        .find(|a| !a.starts_with("--"))
        .ok_or_else(|| anyhow::anyhow!(USAGE))?;
    let errors_only = args.iter().any(|a| a == "--errors-only");

    let content = read_file_content(path)?;
    let absolute = std::env::current_dir()
        .context("Failed to resolve the working directory")?
        .join(path);
    let uri = Url::from_file_path(&absolute)
        .map_err(|()| anyhow::anyhow!("Cannot build a file URI for '{}'", absolute.display()))?;
    analyze_to_string(uri, &content, errors_only).map(Some)
}

pub(crate) fn analyze_to_string(uri: Url, content: &str, errors_only: bool) -> anyhow::Result<String> {
    let mut analyzer = Analyzer::new();
    analyzer.on_document_changed(uri.clone(), content, 0);
    let diagnostics = analyzer.diagnostics(&uri);

    if errors_only {
        let errors: Vec<String> = diagnostics
            .iter()
            .filter(|d| d.severity == Some(DiagnosticSeverity::ERROR))
            .map(|d| {
                format!(
                    "Line {}:{}: {}",
                    d.range.start.line + 1,
                    d.range.start.character + 1,
                    d.message
                )
            })
            .collect();
        return Ok(if errors.is_empty() {
            "No errors found".to_string()
        } else {
            errors.join("\n")
        });
    }

    let tokens: Vec<[u32; 5]> = analyzer
        .semantic_tokens(&uri)
        .iter()
        .map(|t| [t.delta_line, t.delta_start, t.length, t.token_type, t.token_modifiers_bitset])
        .collect();
    let parse_errors = analyzer
        .document(&uri)
        .map(|doc| {
            doc.parsed
                .errors
                .iter()
                .map(|e| serde_json::json!({ "message": e.message, "range": doc.parsed.span_to_range(e.span) }))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let output = serde_json::json!({
        "diagnostics": diagnostics,
        "parse_errors": parse_errors,
        "symbols": analyzer.document_symbols(&uri),
        "semantic_tokens": tokens,
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

pub(crate) fn is_safe_path(path: &str) -> bool {
    let path = Path::new(path);

    if path.as_os_str().is_empty() || path.is_absolute() {
        return false;
    }
    if path.components().any(|c| c == Component::ParentDir) {
        return false;
    }

    let s = path.to_string_lossy();
    if s.chars().any(|c| matches!(c, '\0' | '\n' | '\r' | '\t')) {
        return false;
    }
    // drive letters
    s.as_bytes().get(1) != Some(&b':')
}

pub(crate) fn read_file_content(path: &str) -> anyhow::Result<String> {
    if !is_safe_path(path) {
        return Err(anyhow::anyhow!("Unsafe file path: {}", path));
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read file '{}'", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsafe_paths_are_rejected() {
        assert!(is_safe_path("src/a.q"));
        assert!(!is_safe_path(""));
        assert!(!is_safe_path("/etc/passwd"));
        assert!(!is_safe_path("../a.q"));
        assert!(!is_safe_path("C:a.q"));
        assert!(!is_safe_path("a\n.q"));
        assert!(read_file_content("../outside.q").is_err());
    }

    #[test]
    fn errors_only_lists_layout_errors() {
        let uri = Url::parse("file:///w/a.q").unwrap();
        let out = analyze_to_string(uri.clone(), "f:{[x]\n  x\n}", true).unwrap();
        assert_eq!(out, "Line 3:1: require a space before }");
        assert_eq!(analyze_to_string(uri, "a:1", true).unwrap(), "No errors found");
    }

    #[test]
    fn json_report_has_every_section() {
        let uri = Url::parse("file:///w/a.q").unwrap();
        let out = analyze_to_string(uri, "f:{[x] x}\n.u.v:1", false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["symbols"].as_array().map(Vec::len), Some(2));
        assert!(value["diagnostics"].as_array().is_some_and(|d| d.is_empty()));
        assert!(value["parse_errors"].as_array().is_some());
        assert!(value["semantic_tokens"].as_array().is_some_and(|t| !t.is_empty()));
    }
}
