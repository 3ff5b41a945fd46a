use std::path::{Path, PathBuf};

use nix::unistd::{AccessFlags, access};
use tracing::info;

use super::errors::WatchError;

/// Copies the watched file into an archive directory under a timestamped
/// name, e.g. `2024-06-01--134502.118273.jinja2`.
#[derive(Debug, Clone)]
pub struct Archiver {
    dir: PathBuf,
}

impl Archiver {
    /// Fails unless `dir` is an existing directory this process can write to.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, WatchError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(WatchError::ArchiveDirMissing { path: dir });
        }
        if let Err(source) = access(dir.as_path(), AccessFlags::W_OK) {
            return Err(WatchError::ArchiveDirUnwritable { path: dir, source });
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Destination for a copy of `source` taken now.
    pub fn destination_for(&self, source: &Path) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y-%m-%d--%H%M%S%.6f");
        let name = match source.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{stamp}.{ext}"),
            None => stamp.to_string(),
        };
        self.dir.join(name)
    }

    /// Copy `source` into the archive. Returns the destination path.
    pub async fn archive(&self, source: &Path) -> std::io::Result<PathBuf> {
        let dest = self.destination_for(source);
        tokio::fs::copy(source, &dest).await?;
        info!(
            event = "core.archive.copy_completed",
            source = %source.display(),
            dest = %dest.display(),
        );
        Ok(dest)
    }
}
