use crate::core::{interfaces::FileSystemService, models::*};
use crate::utils::{Result, SluiceError};
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

pub struct TokioFileSystemService;

impl TokioFileSystemService {
    fn walk(set: &SourceSet) -> Vec<PathBuf> {
        if !set.dir.is_dir() {
            return Vec::new();
        }

        let max_depth = if set.recursive { usize::MAX } else { 1 };
        let mut files: Vec<PathBuf> = WalkDir::new(&set.dir)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| set.accepts_extension(path))
            .collect();

        files.sort();
        files
    }
}

#[async_trait::async_trait]
impl FileSystemService for TokioFileSystemService {
    async fn collect(&self, set: &SourceSet) -> Result<Vec<PathBuf>> {
        let set = set.clone();
        let files = tokio::task::spawn_blocking(move || Self::walk(&set)).await?;
        Ok(files)
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).await.map_err(SluiceError::Io)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).await.map_err(SluiceError::Io)
    }

    async fn write(&self, path: &Path, content: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(SluiceError::Io)?;
        }

        fs::write(path, content).await.map_err(SluiceError::Io)
    }

    async fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).await.map_err(SluiceError::Io)?;
        }

        fs::copy(from, to).await.map_err(SluiceError::Io)
    }

    async fn is_stale(&self, source: &Path, dest: &Path) -> bool {
        let dest_modified = match fs::metadata(dest).await.and_then(|m| m.modified()) {
            Ok(time) => time,
            Err(_) => return true,
        };

        match fs::metadata(source).await.and_then(|m| m.modified()) {
            Ok(source_modified) => source_modified > dest_modified,
            Err(_) => true,
        }
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}
