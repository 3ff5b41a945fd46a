//! Watcher error types.

use std::path::PathBuf;

use crate::errors::BridgeError;

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Watched file does not exist: {}", path.display())]
    WatchedPathMissing { path: PathBuf },

    #[error("Watched path is not a regular file: {}", path.display())]
    WatchedPathNotFile { path: PathBuf },

    #[error("Watched file is not readable: {}: {source}", path.display())]
    WatchedPathUnreadable {
        path: PathBuf,
        source: nix::errno::Errno,
    },

    #[error("Archive directory does not exist: {}", path.display())]
    ArchiveDirMissing { path: PathBuf },

    #[error("Archive directory is not writable: {}: {source}", path.display())]
    ArchiveDirUnwritable {
        path: PathBuf,
        source: nix::errno::Errno,
    },

    #[error("Failed to register watch on {}: {source}", path.display())]
    Notify {
        path: PathBuf,
        source: notify::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    /// Startup preconditions the rest of the system relies on permanently.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            WatchError::WatchedPathMissing { .. }
                | WatchError::WatchedPathNotFile { .. }
                | WatchError::WatchedPathUnreadable { .. }
                | WatchError::ArchiveDirMissing { .. }
                | WatchError::ArchiveDirUnwritable { .. }
        )
    }
}

impl BridgeError for WatchError {
    fn error_code(&self) -> &'static str {
        match self {
            WatchError::WatchedPathMissing { .. } => "WATCHED_PATH_MISSING",
            WatchError::WatchedPathNotFile { .. } => "WATCHED_PATH_NOT_FILE",
            WatchError::WatchedPathUnreadable { .. } => "WATCHED_PATH_UNREADABLE",
            WatchError::ArchiveDirMissing { .. } => "ARCHIVE_DIR_MISSING",
            WatchError::ArchiveDirUnwritable { .. } => "ARCHIVE_DIR_UNWRITABLE",
            WatchError::Notify { .. } => "WATCH_REGISTRATION_FAILED",
            WatchError::Io(_) => "WATCH_IO_ERROR",
        }
    }

    fn is_user_error(&self) -> bool {
        self.is_precondition()
    }
}
