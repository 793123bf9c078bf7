//! Source analysis for q: parsing, symbol extraction, the workspace index and
//! every query the language server answers from it.
//!
//! `Analyzer` is the single owner of all analysis state. Each triggering event
//! has one synchronous entry point that runs to completion; queries take
//! `&self` and never perform I/O.

use std::path::{Path, PathBuf};

use tower_lsp::lsp_types::Url;
use tracing::{debug, info};

pub mod builtins;
mod completions;
pub mod diagnostics;
pub mod document;
pub mod extract;
mod navigation;
pub mod parse;
mod search;
pub mod semantic_tokens;
pub mod server_cache;
mod signature;
pub mod symbols;
#[cfg(test)]
mod tests;
mod utils;
pub mod workspace;

pub use document::{Document, DocumentSource};
pub use semantic_tokens::semantic_token_legend;
pub use server_cache::ServerCacheOverlay;
pub use symbols::{Occurrence, OccurrenceType, Scope, Signature, Symbol, SymbolKey, SymbolKind};
pub use workspace::{
    read_source, AnalyzeOutcome, FileFilter, ScanReport, ScanWarning, ScannedSources, WorkspaceIndex,
    DEFAULT_IGNORE_GLOBS, DEFAULT_SOURCE_GLOBS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    Created,
    Changed,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    Removed,
    Analyzed(AnalyzeOutcome),
    /// The path does not match the source globs.
    Ignored,
    Failed(ScanWarning),
}

/// Roots and filter for a workspace scan. Collecting the files needs no
/// access to the index, so callers can do it off any lock.
#[derive(Debug, Clone)]
pub struct ScanPlan {
    pub roots: Vec<PathBuf>,
    pub filter: FileFilter,
}

impl ScanPlan {
    pub fn collect(&self) -> ScannedSources {
        workspace::collect_sources(&self.roots, &self.filter)
    }
}

pub struct Analyzer {
    workspace: WorkspaceIndex,
    cache: ServerCacheOverlay,
    filter: FileFilter,
    roots: Vec<PathBuf>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Self::with_roots(Vec::new())
    }

    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        let filter = FileFilter::with_defaults(filter_root(&roots));
        Self {
            workspace: WorkspaceIndex::new(),
            cache: ServerCacheOverlay::new(),
            filter,
            roots,
        }
    }

    /// Replaces the workspace folders. The filter is reset to the default globs
    /// until the next scan installs its own.
    pub fn set_roots(&mut self, roots: Vec<PathBuf>) {
        self.filter = FileFilter::with_defaults(filter_root(&roots));
        self.roots = roots;
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn workspace(&self) -> &WorkspaceIndex {
        &self.workspace
    }

    pub fn server_cache(&self) -> &ServerCacheOverlay {
        &self.cache
    }

    pub fn filter(&self) -> &FileFilter {
        &self.filter
    }

    pub fn document(&self, uri: &Url) -> Option<&Document> {
        self.workspace.document(uri)
    }

    /// Whether a path on disk belongs to the analyzed workspace.
    pub fn match_file(&self, path: &Path) -> bool {
        self.filter.matches(path)
    }

    /// New content from an editor buffer.
    pub fn on_document_changed(&mut self, uri: Url, text: &str, version: i32) -> AnalyzeOutcome {
        self.workspace
            .analyze_document(uri, text, DocumentSource::Editor { version })
    }

    /// Path of `uri` on disk when it belongs to the analyzed workspace.
    pub fn workspace_path(&self, uri: &Url) -> Option<PathBuf> {
        uri.to_file_path().ok().filter(|path| self.filter.matches(path))
    }

    /// An editor buffer was closed. The index falls back to the file on disk
    /// when it is part of the workspace, otherwise the document is dropped.
    pub fn on_document_closed(&mut self, uri: &Url) {
        let on_disk = self.workspace_path(uri).and_then(|path| read_source(&path).ok());
        self.restore_closed(uri, on_disk);
    }

    /// Second half of `on_document_closed`, for callers that read the disk
    /// content themselves.
    pub fn restore_closed(&mut self, uri: &Url, on_disk: Option<String>) {
        match on_disk {
            Some(text) => self.workspace.reset_to_disk(uri.clone(), &text),
            None => {
                self.workspace.remove_document(uri);
            }
        }
    }

    pub fn on_file_watch_event(&mut self, uri: &Url, kind: FileChangeKind) -> WatchOutcome {
        if kind == FileChangeKind::Deleted {
            return self.on_file_deleted(uri);
        }
        match self.workspace_path(uri) {
            Some(path) => self.apply_file_read(uri, read_source(&path)),
            None => WatchOutcome::Ignored,
        }
    }

    pub fn on_file_deleted(&mut self, uri: &Url) -> WatchOutcome {
        info!("removing {} from index", uri);
        self.workspace.remove_document(uri);
        WatchOutcome::Removed
    }

    /// Indexes a created or changed file from content read off the lock.
    pub fn apply_file_read(&mut self, uri: &Url, read: Result<String, ScanWarning>) -> WatchOutcome {
        match read {
            Ok(text) => {
                WatchOutcome::Analyzed(self.workspace.analyze_document(uri.clone(), &text, DocumentSource::Disk))
            }
            Err(warning) => WatchOutcome::Failed(warning),
        }
    }

    /// Replaces the server-cache overlay. Returns the number of declarations kept.
    pub fn on_cache_refresh(&mut self, code: &str) -> usize {
        self.cache.refresh(code)
    }

    /// Scans the workspace roots with new globs, reading files inline.
    pub fn on_workspace_scan_requested(&mut self, include: &[String], exclude: &[String]) -> anyhow::Result<ScanReport> {
        let plan = self.plan_scan(include, exclude)?;
        let scanned = plan.collect();
        Ok(self.apply_scan(plan, scanned))
    }

    pub fn plan_scan(&self, include: &[String], exclude: &[String]) -> anyhow::Result<ScanPlan> {
        let filter = FileFilter::new(filter_root(&self.roots), include, exclude)?;
        debug!(include = ?filter.include(), exclude = ?filter.exclude(), "planned workspace scan");
        Ok(ScanPlan {
            roots: self.roots.clone(),
            filter,
        })
    }

    /// Installs the plan's filter and indexes what was read. Files open in an
    /// editor keep their buffer content.
    pub fn apply_scan(&mut self, plan: ScanPlan, scanned: ScannedSources) -> ScanReport {
        self.filter = plan.filter;
        self.workspace.apply_scan(scanned)
    }
}

fn filter_root(roots: &[PathBuf]) -> &Path {
    roots.first().map(PathBuf::as_path).unwrap_or_else(|| Path::new("/"))
}
