use std::path::PathBuf;

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::LanguageServer;
use tracing::{debug, info, warn};

use crate::analyzer::{read_source, semantic_token_legend, FileChangeKind, ScanWarning, WatchOutcome};

use super::state::{OpenBuffer, QLanguageServer};
use super::text::apply_change;

const WATCHED_FILES_ID: &str = "q-lsp-watched-files";
const WATCHED_FILES_METHOD: &str = "workspace/didChangeWatchedFiles";

#[tower_lsp::async_trait]
impl LanguageServer for QLanguageServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        #[allow(deprecated)]
        let roots: Vec<_> = params
            .workspace_folders
            .iter()
            .flatten()
            .map(|folder| &folder.uri)
            .chain(params.root_uri.iter())
            .filter_map(|uri| uri.to_file_path().ok())
            .fold(Vec::new(), |mut roots, path| {
                if !roots.contains(&path) {
                    roots.push(path);
                }
                roots
            });
        info!(?roots, "q language server initializing");
        self.analyzer().set_roots(roots);

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::INCREMENTAL)),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                completion_provider: Some(CompletionOptions {
                    resolve_provider: Some(true),
                    trigger_characters: Some(vec![".".to_string(), "`".to_string()]),
                    ..Default::default()
                }),
                signature_help_provider: Some(SignatureHelpOptions {
                    trigger_characters: Some(vec!["[".to_string()]),
                    retrigger_characters: Some(vec![";".to_string()]),
                    work_done_progress_options: Default::default(),
                }),
                definition_provider: Some(OneOf::Left(true)),
                references_provider: Some(OneOf::Left(true)),
                document_highlight_provider: Some(OneOf::Left(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                workspace_symbol_provider: Some(OneOf::Left(true)),
                rename_provider: Some(OneOf::Right(RenameOptions {
                    prepare_provider: Some(true),
                    work_done_progress_options: Default::default(),
                })),
                semantic_tokens_provider: Some(SemanticTokensServerCapabilities::SemanticTokensOptions(
                    SemanticTokensOptions {
                        work_done_progress_options: Default::default(),
                        legend: semantic_token_legend(),
                        range: Some(false),
                        full: Some(SemanticTokensFullOptions::Bool(true)),
                    },
                )),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "q Language Server".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        info!("q language server initialized");
        self.client
            .log_message(MessageType::INFO, "q language server started")
            .await;
        self.load_config().await;
        self.watch_source_files(false).await;

        let config = self.config();
        self.scan_workspace(config.source_globs, config.ignore_globs).await;
    }

    async fn shutdown(&self) -> Result<()> {
        info!("q language server shutting down");
        Ok(())
    }

    async fn did_change_configuration(&self, _: DidChangeConfigurationParams) {
        let before = self.config().source_globs;
        self.load_config().await;
        if self.config().source_globs != before {
            self.watch_source_files(true).await;
        }
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        self.buffers.insert(
            doc.uri.clone(),
            OpenBuffer {
                content: ropey::Rope::from_str(&doc.text),
                version: doc.version,
            },
        );
        self.reanalyze(doc.uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        {
            let mut buffer = self.buffers.entry(uri.clone()).or_default();
            buffer.version = params.text_document.version;
            for change in &params.content_changes {
                apply_change(&mut buffer.content, change);
            }
        }
        self.reanalyze(uri).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.buffers.remove(&uri);
        let path = self.analyzer().workspace_path(&uri);
        let on_disk = match path {
            Some(path) => read_off_lock(path).await.ok(),
            None => None,
        };
        self.analyzer().restore_closed(&uri, on_disk);
        self.client.publish_diagnostics(uri, Vec::new(), None).await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        for event in params.changes {
            let kind = match event.typ {
                FileChangeType::CREATED => FileChangeKind::Created,
                FileChangeType::DELETED => FileChangeKind::Deleted,
                _ => FileChangeKind::Changed,
            };
            // open buffers are authoritative until they are closed
            if kind != FileChangeKind::Deleted && self.buffers.contains_key(&event.uri) {
                continue;
            }
            let outcome = if kind == FileChangeKind::Deleted {
                self.analyzer().on_file_deleted(&event.uri)
            } else {
                let path = self.analyzer().workspace_path(&event.uri);
                match path {
                    Some(path) => {
                        let read = read_off_lock(path).await;
                        self.analyzer().apply_file_read(&event.uri, read)
                    }
                    None => WatchOutcome::Ignored,
                }
            };
            match outcome {
                WatchOutcome::Failed(warning) => {
                    self.client.log_message(MessageType::WARNING, warning.to_string()).await;
                }
                other => debug!(uri = %event.uri, ?other, "watched file event"),
            }
        }
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let at = params.text_document_position_params;
        Ok(self.analyzer().hover(&at.text_document.uri, at.position))
    }

    async fn goto_definition(&self, params: GotoDefinitionParams) -> Result<Option<GotoDefinitionResponse>> {
        let at = params.text_document_position_params;
        let locations = self.analyzer().find_definition(&at.text_document.uri, at.position);
        Ok(match locations.len() {
            0 => None,
            1 => locations.into_iter().next().map(GotoDefinitionResponse::Scalar),
            _ => Some(GotoDefinitionResponse::Array(locations)),
        })
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let at = params.text_document_position;
        let locations = self.analyzer().find_references(
            &at.text_document.uri,
            at.position,
            params.context.include_declaration,
        );
        Ok((!locations.is_empty()).then_some(locations))
    }

    async fn document_highlight(&self, params: DocumentHighlightParams) -> Result<Option<Vec<DocumentHighlight>>> {
        let at = params.text_document_position_params;
        let highlights = self.analyzer().document_highlights(&at.text_document.uri, at.position);
        Ok((!highlights.is_empty()).then_some(highlights))
    }

    async fn document_symbol(&self, params: DocumentSymbolParams) -> Result<Option<DocumentSymbolResponse>> {
        let symbols = self.analyzer().document_symbols(&params.text_document.uri);
        Ok((!symbols.is_empty()).then_some(DocumentSymbolResponse::Nested(symbols)))
    }

    async fn symbol(&self, params: WorkspaceSymbolParams) -> Result<Option<Vec<SymbolInformation>>> {
        let max = self.config().max_workspace_symbols;
        Ok(Some(self.analyzer().search(&params.query, max)))
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let at = params.text_document_position;
        let items = self.analyzer().completions(&at.text_document.uri, at.position);
        Ok(Some(CompletionResponse::Array(items)))
    }

    async fn completion_resolve(&self, item: CompletionItem) -> Result<CompletionItem> {
        Ok(item)
    }

    async fn prepare_rename(&self, params: TextDocumentPositionParams) -> Result<Option<PrepareRenameResponse>> {
        let range = self.analyzer().prepare_rename(&params.text_document.uri, params.position);
        Ok(range.map(PrepareRenameResponse::Range))
    }

    async fn rename(&self, params: RenameParams) -> Result<Option<WorkspaceEdit>> {
        let at = params.text_document_position;
        Ok(self
            .analyzer()
            .rename(&at.text_document.uri, at.position, &params.new_name))
    }

    async fn signature_help(&self, params: SignatureHelpParams) -> Result<Option<SignatureHelp>> {
        let at = params.text_document_position_params;
        Ok(self.analyzer().signature_help(&at.text_document.uri, at.position))
    }

    async fn semantic_tokens_full(&self, params: SemanticTokensParams) -> Result<Option<SemanticTokensResult>> {
        let data = self.analyzer().semantic_tokens(&params.text_document.uri);
        Ok(Some(SemanticTokensResult::Tokens(SemanticTokens { result_id: None, data })))
    }
}

impl QLanguageServer {
    /// Re-analyzes an open buffer and publishes its diagnostics.
    async fn reanalyze(&self, uri: Url) {
        let Some((text, version)) = self
            .buffers
            .get(&uri)
            .map(|buffer| (buffer.content.to_string(), buffer.version))
        else {
            return;
        };
        let diagnostics_enabled = self.config().diagnostics_enabled;
        let diagnostics = {
            let mut analyzer = self.analyzer();
            analyzer.on_document_changed(uri.clone(), &text, version);
            if diagnostics_enabled {
                analyzer.diagnostics(&uri)
            } else {
                Vec::new()
            }
        };
        self.client.publish_diagnostics(uri, diagnostics, Some(version)).await;
    }

    /// Asks the client to report changes to files matching the configured
    /// source globs. `replace` drops the previous registration first.
    async fn watch_source_files(&self, replace: bool) {
        if replace {
            let old = Unregistration {
                id: WATCHED_FILES_ID.to_string(),
                method: WATCHED_FILES_METHOD.to_string(),
            };
            if let Err(err) = self.client.unregister_capability(vec![old]).await {
                debug!("no file watchers to drop: {err}");
            }
        }
        let options = DidChangeWatchedFilesRegistrationOptions {
            watchers: file_watchers(&self.config().source_globs),
        };
        let registration = Registration {
            id: WATCHED_FILES_ID.to_string(),
            method: WATCHED_FILES_METHOD.to_string(),
            register_options: serde_json::to_value(options).ok(),
        };
        if let Err(err) = self.client.register_capability(vec![registration]).await {
            warn!("client refused file watching: {err}");
        }
    }
}

fn file_watchers(globs: &[String]) -> Vec<FileSystemWatcher> {
    globs
        .iter()
        .map(|glob| FileSystemWatcher {
            glob_pattern: GlobPattern::String(glob.clone()),
            kind: None,
        })
        .collect()
}

/// Reads a workspace file on the blocking pool so the analyzer stays unlocked.
async fn read_off_lock(path: PathBuf) -> std::result::Result<String, ScanWarning> {
    let fallback = path.clone();
    tokio::task::spawn_blocking(move || read_source(&path))
        .await
        .unwrap_or_else(|err| {
            Err(ScanWarning {
                path: fallback,
                message: err.to_string(),
            })
        })
}
