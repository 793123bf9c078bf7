use serde::Deserialize;
use tower_lsp::lsp_types::ConfigurationItem;
use tracing::debug;

use crate::analyzer::{DEFAULT_IGNORE_GLOBS, DEFAULT_SOURCE_GLOBS};

use super::state::{lock, QLanguageServer};

pub(crate) const CONFIG_SECTION: &str = "q.lsp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServerConfig {
    pub(crate) source_globs: Vec<String>,
    pub(crate) ignore_globs: Vec<String>,
    pub(crate) diagnostics_enabled: bool,
    pub(crate) max_workspace_symbols: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            source_globs: DEFAULT_SOURCE_GLOBS.iter().map(|g| g.to_string()).collect(),
            ignore_globs: DEFAULT_IGNORE_GLOBS.iter().map(|g| g.to_string()).collect(),
            diagnostics_enabled: true,
            max_workspace_symbols: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct QLspConfigSection {
    #[serde(default)]
    source_globs: Option<Vec<String>>,
    #[serde(default)]
    ignore_globs: Option<Vec<String>>,
    #[serde(default)]
    diagnostics: DiagnosticsConfig,
    #[serde(default)]
    workspace_symbols: WorkspaceSymbolsConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DiagnosticsConfig {
    enabled: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WorkspaceSymbolsConfig {
    max_results: Option<usize>,
}

impl ServerConfig {
    /// Overlays a `q.lsp` settings object. Missing or invalid fields keep
    /// their current values; an empty glob list counts as missing.
    pub(crate) fn merge_json(&mut self, value: serde_json::Value) -> bool {
        let Ok(section) = serde_json::from_value::<QLspConfigSection>(value) else {
            return false;
        };
        if let Some(globs) = section.source_globs.filter(|g| !g.is_empty()) {
            self.source_globs = globs;
        }
        if let Some(globs) = section.ignore_globs {
            self.ignore_globs = globs;
        }
        if let Some(enabled) = section.diagnostics.enabled {
            self.diagnostics_enabled = enabled;
        }
        if let Some(max) = section.workspace_symbols.max_results.filter(|v| *v > 0) {
            self.max_workspace_symbols = max;
        }
        true
    }
}

impl QLanguageServer {
    pub(crate) async fn load_config(&self) {
        let items = vec![ConfigurationItem {
            scope_uri: None,
            section: Some(CONFIG_SECTION.to_string()),
        }];
        let Ok(values) = self.client.configuration(items).await else {
            return;
        };
        if let Some(value) = values.into_iter().next() {
            let mut config = lock(&self.config);
            if config.merge_json(value) {
                debug!(?config, "loaded client configuration");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_section_keeps_defaults() {
        let mut config = ServerConfig::default();
        assert!(config.merge_json(json!({ "diagnostics": { "enabled": false } })));
        assert!(!config.diagnostics_enabled);
        assert_eq!(config.source_globs, vec!["**/*.q", "**/*.k"]);
        assert_eq!(config.max_workspace_symbols, 500);
    }

    #[test]
    fn globs_and_limits_are_read() {
        let mut config = ServerConfig::default();
        config.merge_json(json!({
            "sourceGlobs": ["src/**/*.q"],
            "ignoreGlobs": [],
            "workspaceSymbols": { "maxResults": 0 }
        }));
        assert_eq!(config.source_globs, vec!["src/**/*.q"]);
        assert!(config.ignore_globs.is_empty());
        assert_eq!(config.max_workspace_symbols, 500);
    }

    #[test]
    fn null_section_is_rejected() {
        let mut config = ServerConfig::default();
        assert!(!config.merge_json(serde_json::Value::Null));
        assert_eq!(config, ServerConfig::default());
    }
}
