use crate::core::models::*;
use crate::utils::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// File system operations interface
#[async_trait]
pub trait FileSystemService: Send + Sync {
    /// Files in a source set, sorted. A missing directory yields nothing.
    async fn collect(&self, set: &SourceSet) -> Result<Vec<PathBuf>>;
    async fn read_to_string(&self, path: &Path) -> Result<String>;
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;
    /// Write, creating parent directories as needed
    async fn write(&self, path: &Path, content: &[u8]) -> Result<()>;
    async fn copy(&self, from: &Path, to: &Path) -> Result<u64>;
    /// True when `dest` is missing or older than `source`
    async fn is_stale(&self, source: &Path, dest: &Path) -> bool;
    fn file_exists(&self, path: &Path) -> bool;
}

/// HTML include resolution and minification
#[async_trait]
pub trait HtmlProcessor: Send + Sync {
    async fn process(&self, content: &str, path: &Path) -> Result<String>;
}

/// Stylesheet bundling, lowering and minification
#[async_trait]
pub trait CssProcessor: Send + Sync {
    async fn process_entry(&self, entry: &Path) -> Result<CssOutput>;
}

/// JavaScript module bundling
#[async_trait]
pub trait JsBundler: Send + Sync {
    async fn bundle(&self, entry: &Path) -> Result<BundleOutput>;

    /// Files that made up the most recent bundle
    fn module_paths(&self) -> Vec<PathBuf>;
}

/// Image compression. Returns the bytes to write, which may be the input.
pub trait ImageOptimizer: Send + Sync {
    fn optimize(&self, content: &[u8], path: &Path) -> Result<Vec<u8>>;
}

/// Desktop notification sink
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

/// Receiver of reload requests after a watched task re-runs
pub trait ReloadSink: Send + Sync {
    fn reload(&self, kind: ReloadKind);
}
