//! Workspace-wide document index and the glob-driven file scan that fills it.

use std::fmt;
use std::path::{Path, PathBuf};

use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;
use indexmap::IndexMap;
use tower_lsp::lsp_types::Url;
use tracing::{debug, info, warn};

use super::document::{Document, DocumentSource};
use super::symbols::Symbol;
use super::utils::compute_content_hash;

pub const DEFAULT_SOURCE_GLOBS: &[&str] = &["**/*.q", "**/*.k"];
pub const DEFAULT_IGNORE_GLOBS: &[&str] = &["**/node_modules/**", "**/target/**"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzeOutcome {
    Applied,
    /// Same content as stored; only the source stamp was refreshed.
    Unchanged,
    /// Rejected because the stored content comes from a newer source.
    Stale,
}

#[derive(Debug, Clone)]
struct GlobalRef {
    uri: Url,
    index: usize,
}

/// All analyzed documents plus the global symbol table derived from them.
///
/// Documents keep their registration order, and the global table is rebuilt
/// from that order after every mutation: when two files declare the same
/// dotted name, the one registered first owns it.
#[derive(Debug, Default)]
pub struct WorkspaceIndex {
    documents: IndexMap<Url, Document>,
    globals: IndexMap<String, GlobalRef>,
}

impl WorkspaceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyze_document(&mut self, uri: Url, text: &str, source: DocumentSource) -> AnalyzeOutcome {
        let outcome = self.store(uri, text, source);
        if outcome == AnalyzeOutcome::Applied {
            self.rebuild_globals();
        }
        outcome
    }

    /// Replaces the stored content with what is on disk, whatever its stamp.
    /// Used when an editor buffer is closed without saving.
    pub fn reset_to_disk(&mut self, uri: Url, text: &str) {
        let doc = Document::analyze(uri.clone(), text, DocumentSource::Disk);
        self.documents.insert(uri, doc);
        self.rebuild_globals();
    }

    pub fn remove_document(&mut self, uri: &Url) -> bool {
        let removed = self.documents.shift_remove(uri).is_some();
        if removed {
            debug!(uri = %uri, "removed document");
            self.rebuild_globals();
        }
        removed
    }

    /// Applies a batch of disk reads, rebuilding the global table once.
    pub fn apply_scan(&mut self, scanned: ScannedSources) -> ScanReport {
        let mut report = ScanReport {
            skipped: scanned.warnings,
            ..Default::default()
        };
        for (uri, text) in scanned.files {
            match self.store(uri, &text, DocumentSource::Disk) {
                AnalyzeOutcome::Applied => report.indexed += 1,
                AnalyzeOutcome::Unchanged => report.unchanged += 1,
                AnalyzeOutcome::Stale => report.stale += 1,
            }
        }
        if report.indexed > 0 {
            self.rebuild_globals();
        }
        info!(
            indexed = report.indexed,
            unchanged = report.unchanged,
            stale = report.stale,
            skipped = report.skipped.len(),
            "workspace scan applied"
        );
        report
    }

    fn store(&mut self, uri: Url, text: &str, source: DocumentSource) -> AnalyzeOutcome {
        if let Some(existing) = self.documents.get_mut(&uri) {
            if !source.supersedes(&existing.source) {
                debug!(uri = %uri, ?source, current = ?existing.source, "dropping stale content");
                return AnalyzeOutcome::Stale;
            }
            if existing.content_hash == compute_content_hash(text) {
                existing.source = source;
                return AnalyzeOutcome::Unchanged;
            }
        }
        let doc = Document::analyze(uri.clone(), text, source);
        self.documents.insert(uri, doc);
        AnalyzeOutcome::Applied
    }

    fn rebuild_globals(&mut self) {
        self.globals.clear();
        for doc in self.documents.values() {
            for (index, sym) in doc.symbols.iter().enumerate() {
                if sym.is_global() {
                    self.globals.entry(sym.name.clone()).or_insert_with(|| GlobalRef {
                        uri: doc.uri.clone(),
                        index,
                    });
                }
            }
        }
    }

    pub fn document(&self, uri: &Url) -> Option<&Document> {
        self.documents.get(uri)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> + '_ {
        self.documents.values()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn global(&self, name: &str) -> Option<(&Document, &Symbol)> {
        let entry = self.globals.get(name)?;
        let doc = self.documents.get(&entry.uri)?;
        Some((doc, doc.symbols.get(entry.index)?))
    }

    /// The global table in registration order.
    pub fn globals(&self) -> impl Iterator<Item = (&Document, &Symbol)> + '_ {
        self.globals.values().filter_map(|entry| {
            let doc = self.documents.get(&entry.uri)?;
            Some((doc, doc.symbols.get(entry.index)?))
        })
    }

    pub fn global_count(&self) -> usize {
        self.globals.len()
    }
}

/// Include/exclude glob selector for workspace files.
#[derive(Debug, Clone)]
pub struct FileFilter {
    include: Vec<String>,
    exclude: Vec<String>,
    overrides: Override,
}

impl FileFilter {
    /// Later globs win, so excludes are added after includes. An empty include
    /// list falls back to the default source globs.
    pub fn new(root: &Path, include: &[String], exclude: &[String]) -> anyhow::Result<Self> {
        let include: Vec<String> = if include.is_empty() {
            DEFAULT_SOURCE_GLOBS.iter().map(|g| g.to_string()).collect()
        } else {
            include.to_vec()
        };
        let mut builder = OverrideBuilder::new(root);
        for glob in &include {
            builder.add(glob)?;
        }
        for glob in exclude {
            builder.add(&format!("!{}", glob))?;
        }
        Ok(Self {
            include,
            exclude: exclude.to_vec(),
            overrides: builder.build()?,
        })
    }

    pub fn with_defaults(root: &Path) -> Self {
        let exclude: Vec<String> = DEFAULT_IGNORE_GLOBS.iter().map(|g| g.to_string()).collect();
        Self::new(root, &[], &exclude).unwrap_or_else(|e| {
            warn!("default globs rejected: {e}");
            Self {
                include: Vec::new(),
                exclude,
                overrides: Override::empty(),
            }
        })
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.overrides.matched(path, false).is_whitelist()
    }

    pub fn include(&self) -> &[String] {
        &self.include
    }

    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanWarning {
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot analyze {}: {}", self.path.display(), self.message)
    }
}

/// File contents read off the index lock, ready for `apply_scan`.
#[derive(Debug, Default)]
pub struct ScannedSources {
    pub files: Vec<(Url, String)>,
    pub warnings: Vec<ScanWarning>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub indexed: usize,
    pub unchanged: usize,
    pub stale: usize,
    pub skipped: Vec<ScanWarning>,
}

/// Reads one source file as UTF-8.
pub fn read_source(path: &Path) -> Result<String, ScanWarning> {
    std::fs::read_to_string(path).map_err(|err| {
        warn!("cannot read {}: {}", path.display(), err);
        ScanWarning {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    })
}

/// Walks `roots` and reads every file `filter` accepts. Only the globs
/// select files: hidden and `.gitignore`d paths are walked like any other.
/// Unreadable entries become warnings; the walk always runs to the end.
pub fn collect_sources(roots: &[PathBuf], filter: &FileFilter) -> ScannedSources {
    let mut out = ScannedSources::default();
    for root in roots {
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .overrides(filter.overrides.clone())
            .build();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    out.warnings.push(ScanWarning {
                        path: root.clone(),
                        message: err.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) || !filter.matches(entry.path()) {
                continue;
            }
            let path = entry.path();
            let uri = match Url::from_file_path(path) {
                Ok(uri) => uri,
                Err(()) => {
                    out.warnings.push(ScanWarning {
                        path: path.to_path_buf(),
                        message: "not an absolute file path".to_string(),
                    });
                    continue;
                }
            };
            match read_source(path) {
                Ok(text) => out.files.push((uri, text)),
                Err(warning) => out.warnings.push(warning),
            }
        }
    }
    debug!(files = out.files.len(), warnings = out.warnings.len(), "collected workspace sources");
    out
}
