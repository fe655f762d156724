use std::fs;
use std::path::{Path, PathBuf};

use super::error::{ReelError, ReelResult};
use super::utils::{compute_file_hash, write_atomically};

/// Subtitle artifacts keyed by the content hash of the media they were generated from.
#[derive(Debug, Clone)]
pub struct SubtitleStore {
    root: PathBuf,
}

impl SubtitleStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn artifact_path(&self, source: &Path) -> ReelResult<PathBuf> {
        let hash = compute_file_hash(source)?;
        Ok(self.root.join(format!("{hash}.srt")))
    }

    /// Store `srt` for `source`, replacing whatever was registered before.
    pub fn register(&self, source: &Path, srt: &Path) -> ReelResult<PathBuf> {
        let target = self.artifact_path(source)?;
        let contents = fs::read(srt)?;
        write_atomically(&target, &contents)?;
        Ok(target)
    }

    pub fn lookup(&self, source: &Path) -> ReelResult<PathBuf> {
        let target = self.artifact_path(source)?;
        if target.is_file() {
            Ok(target)
        } else {
            Err(ReelError::NotFound(source.display().to_string()))
        }
    }

    /// Copy the stored artifact for `source` to `destination`.
    pub fn fetch(&self, source: &Path, destination: &Path) -> ReelResult<PathBuf> {
        let stored = self.lookup(source)?;
        let contents = fs::read(&stored)?;
        write_atomically(destination, &contents)?;
        Ok(destination.to_path_buf())
    }
}
