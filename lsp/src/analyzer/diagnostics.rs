//! Layout lint: a closing bracket at column 0 ends a multiline expression
//! too early, because q reads every column-0 line as a new statement.

use once_cell::sync::Lazy;
use regex::Regex;
use tower_lsp::lsp_types::{Diagnostic, DiagnosticRelatedInformation, DiagnosticSeverity, Location, Url};

use super::parse::ParsedSource;
use super::Analyzer;

pub const DIAGNOSTIC_SOURCE: &str = "q-lsp";

static CLOSER_AT_LINE_START: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?m)^[}\])]").ok());

pub fn check_layout(uri: &Url, parsed: &ParsedSource) -> Vec<Diagnostic> {
    let Some(re) = CLOSER_AT_LINE_START.as_ref() else {
        return Vec::new();
    };
    re.find_iter(parsed.text())
        .map(|m| {
            let range = parsed.span_to_range(q_core::Span::new(m.start(), m.end()));
            Diagnostic {
                range,
                severity: Some(DiagnosticSeverity::ERROR),
                source: Some(DIAGNOSTIC_SOURCE.to_string()),
                message: format!("require a space before {}", m.as_str()),
                related_information: Some(vec![DiagnosticRelatedInformation {
                    location: Location::new(uri.clone(), range),
                    message: "Multiline expressions".to_string(),
                }]),
                ..Default::default()
            }
        })
        .collect()
}

impl Analyzer {
    pub fn diagnostics(&self, uri: &Url) -> Vec<Diagnostic> {
        self.workspace
            .document(uri)
            .map(|doc| check_layout(uri, &doc.parsed))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(src: &str) -> Vec<Diagnostic> {
        let uri = Url::parse("file:///d.q").unwrap();
        check_layout(&uri, &ParsedSource::new(src))
    }

    #[test]
    fn each_column_zero_closer_is_flagged() {
        let diags = check("f:{[x]\n  x+1\n}\ng:(1;\n 2\n)\nh:{x}");
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].message, "require a space before }");
        assert_eq!(diags[0].range.start.line, 2);
        assert_eq!(diags[1].message, "require a space before )");
        assert_eq!(diags[1].range.end.character, 1);
    }

    #[test]
    fn indented_closers_are_fine() {
        assert!(check("f:{[x]\n  x+1\n }").is_empty());
    }
}
