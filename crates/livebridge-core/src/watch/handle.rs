use std::path::{Path, PathBuf};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Raw notification as delivered by the OS watcher thread.
pub type RawEvent = notify::Result<Event>;

/// A registered OS-level watch on one path.
///
/// The registration lives exactly as long as this value: dropping it
/// unregisters the watch and releases its descriptor.
pub struct WatchHandle {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl WatchHandle {
    /// Register a non-recursive watch on `path`, forwarding every raw
    /// notification into `tx`.
    pub fn acquire(path: &Path, tx: UnboundedSender<RawEvent>) -> notify::Result<Self> {
        let mut watcher = notify::recommended_watcher(move |res: RawEvent| {
            // Receiver gone means the detector loop has shut down.
            let _ = tx.send(res);
        })?;
        watcher.watch(path, RecursiveMode::NonRecursive)?;
        debug!(event = "core.watch.handle_acquired", path = %path.display());
        Ok(Self {
            path: path.to_path_buf(),
            _watcher: watcher,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        debug!(event = "core.watch.handle_released", path = %self.path.display());
    }
}
