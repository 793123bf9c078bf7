use serde::Deserialize;
use serde_json::Value;
use tower_lsp::lsp_types::MessageType;
use tracing::{info, warn};

use super::state::QLanguageServer;

pub(crate) const ANALYZE_SOURCE_CODE: &str = "$/analyze-source-code";
pub(crate) const ANALYZE_SERVER_CACHE: &str = "$/analyze-server-cache";

/// A glob setting sent either as one pattern or as a list.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub(crate) enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(glob) => vec![glob],
            OneOrMany::Many(globs) => globs,
        }
        .into_iter()
        .filter(|g| !g.trim().is_empty())
        .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnalyzeSourceCodeParams {
    #[serde(default)]
    pub(crate) globs_pattern: Option<OneOrMany>,
    #[serde(default)]
    pub(crate) ignore_pattern: Option<OneOrMany>,
}

impl AnalyzeSourceCodeParams {
    /// Include and exclude globs, falling back to `defaults` for whatever the
    /// client left out. An empty include list also falls back.
    pub(crate) fn globs(self, defaults: (Vec<String>, Vec<String>)) -> (Vec<String>, Vec<String>) {
        let include = self
            .globs_pattern
            .map(OneOrMany::into_vec)
            .filter(|g| !g.is_empty())
            .unwrap_or(defaults.0);
        let exclude = self.ignore_pattern.map(OneOrMany::into_vec).unwrap_or(defaults.1);
        (include, exclude)
    }
}

/// Source text of a server-cache payload: a bare string, the first element
/// of an array, or the `code` field of an object.
pub(crate) fn cache_payload(value: Value) -> Option<String> {
    match value {
        Value::String(code) => Some(code),
        Value::Array(items) => items.into_iter().next().and_then(cache_payload),
        Value::Object(mut fields) => fields.remove("code").and_then(cache_payload),
        _ => None,
    }
}

impl QLanguageServer {
    pub(crate) async fn analyze_source_code(&self, params: AnalyzeSourceCodeParams) {
        let config = self.config();
        let (include, exclude) = params.globs((config.source_globs, config.ignore_globs));
        self.scan_workspace(include, exclude).await;
    }

    pub(crate) async fn analyze_server_cache(&self, params: Value) {
        let Some(code) = cache_payload(params) else {
            warn!("ignoring server cache payload without source text");
            return;
        };
        let kept = self.analyzer().on_cache_refresh(&code);
        info!(kept, "server cache refreshed");
    }

    /// Re-indexes the workspace folders. Files are read on the blocking pool
    /// so requests keep being served while the scan runs.
    pub(crate) async fn scan_workspace(&self, include: Vec<String>, exclude: Vec<String>) {
        let planned = self.analyzer().plan_scan(&include, &exclude);
        let plan = match planned {
            Ok(plan) => plan,
            Err(err) => {
                warn!("invalid workspace globs: {err:#}");
                self.client
                    .log_message(MessageType::WARNING, format!("invalid workspace globs: {err:#}"))
                    .await;
                return;
            }
        };

        let job = plan.clone();
        let scanned = match tokio::task::spawn_blocking(move || job.collect()).await {
            Ok(scanned) => scanned,
            Err(err) => {
                warn!("workspace scan aborted: {err}");
                return;
            }
        };

        let report = self.analyzer().apply_scan(plan, scanned);
        for skipped in &report.skipped {
            self.client.log_message(MessageType::WARNING, skipped.to_string()).await;
        }
        self.client
            .log_message(
                MessageType::INFO,
                format!("indexed {} q files ({} unchanged)", report.indexed, report.unchanged),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn defaults() -> (Vec<String>, Vec<String>) {
        (vec!["**/*.q".to_string()], vec!["**/target/**".to_string()])
    }

    #[test]
    fn globs_accept_strings_and_lists() {
        let params: AnalyzeSourceCodeParams =
            serde_json::from_value(json!({ "globsPattern": "src/**/*.q", "ignorePattern": ["a/**", ""] })).unwrap();
        let (include, exclude) = params.globs(defaults());
        assert_eq!(include, vec!["src/**/*.q"]);
        assert_eq!(exclude, vec!["a/**"]);
    }

    #[test]
    fn missing_globs_use_defaults() {
        let params: AnalyzeSourceCodeParams = serde_json::from_value(json!({ "globsPattern": [] })).unwrap();
        assert_eq!(params.globs(defaults()), defaults());
    }

    #[test]
    fn cache_payload_shapes() {
        assert_eq!(cache_payload(json!("a:1")).as_deref(), Some("a:1"));
        assert_eq!(cache_payload(json!(["b:2"])).as_deref(), Some("b:2"));
        assert_eq!(cache_payload(json!({ "code": "c:3" })).as_deref(), Some("c:3"));
        assert_eq!(cache_payload(json!(42)), None);
        assert_eq!(cache_payload(json!([])), None);
    }
}
