use tower_lsp::lsp_types::SymbolInformation;

use super::symbols::{namespace_of, Symbol};
use super::Analyzer;

/// Lower is better: exact, prefix, substring, then in-order subsequence.
fn rank(name: &str, query: &str) -> Option<u8> {
    if query.is_empty() {
        return Some(3);
    }
    let name = name.to_lowercase();
    if name == query {
        Some(0)
    } else if name.starts_with(query) {
        Some(1)
    } else if name.contains(query) {
        Some(2)
    } else {
        let mut rest = name.chars();
        query.chars().all(|q| rest.any(|c| c == q)).then_some(3)
    }
}

impl Analyzer {
    /// Workspace symbol search over the global table. Names are compared
    /// case-insensitively with and without their namespace.
    pub fn search(&self, query: &str, max_results: usize) -> Vec<SymbolInformation> {
        let query = query.trim().to_lowercase();
        let mut hits: Vec<(u8, &Symbol, SymbolInformation)> = self
            .workspace
            .globals()
            .filter_map(|(doc, sym)| {
                let score = [rank(&sym.name, &query), rank(sym.unqualified_name(), &query)]
                    .into_iter()
                    .flatten()
                    .min()?;
                #[allow(deprecated)]
                let info = SymbolInformation {
                    name: sym.name.clone(),
                    kind: sym.kind.to_lsp(),
                    tags: None,
                    deprecated: None,
                    location: doc.location(sym.selection_range),
                    container_name: Some(namespace_of(&sym.name).to_string()),
                };
                Some((score, sym, info))
            })
            .collect();
        hits.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then(a.1.name.len().cmp(&b.1.name.len()))
                .then_with(|| a.1.name.cmp(&b.1.name))
        });
        hits.truncate(max_results);
        hits.into_iter().map(|(_, _, info)| info).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::rank;

    #[test]
    fn ranking_tiers() {
        assert_eq!(rank(".u.trade", ".u.trade"), Some(0));
        assert_eq!(rank(".u.trade", ".u.tr"), Some(1));
        assert_eq!(rank(".u.trade", "trad"), Some(2));
        assert_eq!(rank(".u.trade", "utd"), Some(3));
        assert_eq!(rank(".u.trade", "xyz"), None);
        assert_eq!(rank("Upper", "upp"), Some(1));
    }
}
