use std::sync::{Mutex, MutexGuard};

use dashmap::DashMap;
use ropey::Rope;
use tower_lsp::lsp_types::Url;
use tower_lsp::Client;

use crate::analyzer::Analyzer;

use super::config::ServerConfig;

/// Text of a buffer the editor has open.
#[derive(Debug, Default)]
pub(crate) struct OpenBuffer {
    pub(crate) content: Rope,
    pub(crate) version: i32,
}

/// Server state shared across handlers. Every request locks the analyzer
/// once and runs to completion against it.
pub(crate) struct QLanguageServer {
    pub(crate) client: Client,
    pub(crate) buffers: DashMap<Url, OpenBuffer>,
    pub(crate) analyzer: Mutex<Analyzer>,
    pub(crate) config: Mutex<ServerConfig>,
}

impl QLanguageServer {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            buffers: DashMap::new(),
            analyzer: Mutex::new(Analyzer::new()),
            config: Mutex::new(ServerConfig::default()),
        }
    }

    pub(crate) fn analyzer(&self) -> MutexGuard<'_, Analyzer> {
        lock(&self.analyzer)
    }

    pub(crate) fn config(&self) -> ServerConfig {
        lock(&self.config).clone()
    }
}

/// Locks `mutex`, recovering the guard if a handler panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
