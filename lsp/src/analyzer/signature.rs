use q_core::{NodeId, NodeKind, TokenKind};
use tower_lsp::lsp_types::{
    Documentation, ParameterInformation, ParameterLabel, Position, SignatureHelp, SignatureInformation, Url,
};

use super::builtins;
use super::document::Document;
use super::extract;
use super::symbols::Signature;
use super::Analyzer;

pub(crate) fn signature_information(sig: &Signature, doc: Option<String>) -> SignatureInformation {
    SignatureInformation {
        label: sig.label(),
        documentation: doc.map(Documentation::String),
        parameters: Some(
            sig.parameters
                .iter()
                .map(|p| ParameterInformation {
                    label: ParameterLabel::Simple(p.clone()),
                    documentation: None,
                })
                .collect(),
        ),
        active_parameter: None,
    }
}

impl Analyzer {
    pub fn signature_help(&self, uri: &Url, pos: Position) -> Option<SignatureHelp> {
        let doc = self.workspace.document(uri)?;
        let parsed = &doc.parsed;
        let tree = &parsed.tree;
        let offset = parsed.skip_back_blanks(parsed.position_to_offset(pos));
        let node = tree.node_at_offset(offset);

        // innermost call whose argument list is still open at the cursor
        let call = std::iter::once(node).chain(tree.ancestors(node)).find(|n| {
            tree.kind(*n) == NodeKind::Call
                && !tree.children(*n).last().is_some_and(|last| {
                    tree.kind(last) == NodeKind::Token(TokenKind::RBracket) && tree.span(last).end <= offset
                })
        })?;
        let callee = tree.first_named_child(call)?;
        let (sig, documentation) = self.signature_for(doc, callee)?;

        let start = tree.span(node).start;
        let mut child = callee;
        let mut index: i64 = -1;
        while let Some(next) = tree.next_named_sibling(child) {
            if start <= tree.span(child).end {
                break;
            }
            index += 1;
            child = next;
        }

        Some(SignatureHelp {
            signatures: vec![signature_information(&sig, documentation)],
            active_signature: Some(0),
            active_parameter: u32::try_from(index).ok(),
        })
    }

    /// Signature for the function named by `callee`: the current document and
    /// workspace first, then the server cache, then the built-ins.
    fn signature_for(&self, doc: &Document, callee: NodeId) -> Option<(Signature, Option<String>)> {
        if !doc.parsed.tree.kind(callee).is_identifier() {
            return None;
        }
        let word = extract::word_at(&doc.parsed, doc.parsed.tree.span(callee).start)?;
        let declared = self
            .resolve(doc, &word)
            .and_then(|key| self.symbol_for(&key))
            .and_then(|(_, sym)| sym.signature.clone().map(|s| (s, Some(sym.preview(1)))));
        if declared.is_some() {
            return declared;
        }
        if let Some(sig) = self.cache.find(&word.text).and_then(|s| s.signature.clone()) {
            return Some((sig, Some("server".to_string())));
        }
        let builtin = builtins::find(&word.text)?;
        Some((builtin.signature()?, Some(builtin.documentation.to_string())))
    }
}
