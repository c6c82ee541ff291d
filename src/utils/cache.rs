use dashmap::DashMap;
use std::path::{Path, PathBuf};

/// Transformed module kept between bundles
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub hash: String,
    pub code: String,
    pub source_map: Option<String>,
    pub specifiers: Vec<String>,
    pub helpers: Vec<String>,
}

/// In-memory module cache keyed by path and validated by content hash.
/// Lets repeated bundles in watch mode skip unchanged modules.
#[derive(Default)]
pub struct ModuleCache {
    entries: DashMap<PathBuf, CacheEntry>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute_content_hash(content: &[u8]) -> String {
        blake3::hash(content).to_hex().to_string()
    }

    /// Entry for `path` if it was built from the same content
    pub fn get(&self, path: &Path, hash: &str) -> Option<CacheEntry> {
        let entry = self.entries.get(path)?;
        if entry.hash != hash {
            return None;
        }
        Some(entry.clone())
    }

    pub fn insert(&self, path: PathBuf, entry: CacheEntry) {
        self.entries.insert(path, entry);
    }

    /// Drop entries for modules that are no longer part of the graph
    pub fn retain_paths(&self, live: &[PathBuf]) {
        self.entries.retain(|path, _| live.contains(path));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Paths of every cached module
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }
}
