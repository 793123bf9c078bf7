use tower_lsp::lsp_types::{SemanticToken, SemanticTokenType, SemanticTokensLegend, Url};

use super::symbols::{Occurrence, OccurrenceType, Symbol};
use super::Analyzer;

pub const TOKEN_VARIABLE: u32 = 0;
pub const TOKEN_PARAMETER: u32 = 1;
pub const TOKEN_TYPE: u32 = 2;
pub const TOKEN_CLASS: u32 = 3;

pub fn semantic_token_legend() -> SemanticTokensLegend {
    SemanticTokensLegend {
        token_types: vec![
            SemanticTokenType::VARIABLE,
            SemanticTokenType::PARAMETER,
            SemanticTokenType::TYPE,
            SemanticTokenType::CLASS,
        ],
        token_modifiers: Vec::new(),
    }
}

fn classify(sym: &Symbol) -> u32 {
    if sym.is_parameter {
        TOKEN_PARAMETER
    } else if sym.kind.is_type_like() {
        TOKEN_TYPE
    } else if sym.is_global() {
        TOKEN_CLASS
    } else {
        TOKEN_VARIABLE
    }
}

impl Analyzer {
    /// Full-document tokens, delta encoded. Unresolved local names are left
    /// to lexical highlighting.
    pub fn semantic_tokens(&self, uri: &Url) -> Vec<SemanticToken> {
        let Some(doc) = self.workspace.document(uri) else {
            return Vec::new();
        };
        let mut absolute: Vec<(&Occurrence, u32)> = Vec::new();
        for occ in doc.occurrences.iter().filter(|o| o.kind.is_identifier()) {
            let resolved = self.resolve(doc, occ).and_then(|key| self.symbol_for(&key));
            let token_type = match resolved {
                Some((_, sym)) => classify(sym),
                None => match self.cache.find(&occ.text) {
                    Some(sym) if sym.kind.is_type_like() => TOKEN_TYPE,
                    Some(_) => TOKEN_CLASS,
                    None if occ.kind == OccurrenceType::GlobalIdentifier => TOKEN_CLASS,
                    None => continue,
                },
            };
            absolute.push((occ, token_type));
        }

        let mut tokens = Vec::with_capacity(absolute.len());
        let mut prev_line: u32 = 0;
        let mut prev_start: u32 = 0;
        for (occ, token_type) in absolute {
            let line = occ.range.start.line;
            let start = occ.range.start.character;
            let delta_line = line.saturating_sub(prev_line);
            let delta_start = if delta_line == 0 { start.saturating_sub(prev_start) } else { start };
            tokens.push(SemanticToken {
                delta_line,
                delta_start,
                length: occ.range.end.character.saturating_sub(start),
                token_type,
                token_modifiers_bitset: 0,
            });
            prev_line = line;
            prev_start = start;
        }
        tokens
    }
}
