use tracing::debug;

use super::extract;
use super::parse::ParsedSource;
use super::symbols::{Scope, Symbol};
use super::utils::dedup_by_key;

/// Declarations reported by a running q process.
///
/// The client renders the process's namespace tree as q source and sends it
/// over; it is parsed like any document but kept apart from the workspace.
/// Every refresh replaces the previous set in full.
#[derive(Debug, Default)]
pub struct ServerCacheOverlay {
    symbols: Vec<Symbol>,
    generation: u64,
}

impl ServerCacheOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the overlay with the top-level declarations found in `code`.
    /// Malformed text yields whatever declarations could be recovered.
    pub fn refresh(&mut self, code: &str) -> usize {
        let parsed = ParsedSource::new(code);
        let extraction = extract::extract(&parsed);
        let top_level = extraction.symbols.into_iter().filter_map(|mut sym| {
            if sym.scope.container() == Some("") {
                // plain names live in the root namespace of the process
                sym.scope = Scope::Global {
                    namespace: ".".to_string(),
                };
            }
            sym.is_global().then_some(sym)
        });
        self.symbols = dedup_by_key(top_level, |s| s.name.clone());
        self.generation += 1;
        debug!(
            generation = self.generation,
            symbols = self.symbols.len(),
            parse_errors = parsed.errors.len(),
            "server cache refreshed"
        );
        self.symbols.len()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn find(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.name == name)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_replaces_everything() {
        let mut cache = ServerCacheOverlay::new();
        assert_eq!(cache.refresh(".a.f:{[p;q] p}\nt:([] c:1 2)\nf2:{x}"), 3);
        assert!(cache.find(".a.f").is_some());
        assert_eq!(cache.find("t").unwrap().scope, Scope::Global { namespace: ".".into() });
        // parameters of cached lambdas are not top-level names
        assert!(cache.find("p").is_none());

        cache.refresh(".b.g:1");
        assert_eq!(cache.generation(), 2);
        assert!(cache.find(".a.f").is_none());
        assert_eq!(cache.symbols().len(), 1);
    }

    #[test]
    fn malformed_payload_is_partially_ingested() {
        let mut cache = ServerCacheOverlay::new();
        cache.refresh(".ok.v:1\n.broken:{[a;\n.ok.w:2");
        assert!(cache.find(".ok.v").is_some());
    }
}
