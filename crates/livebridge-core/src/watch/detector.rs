use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::errno::Errno;
use nix::unistd::{AccessFlags, access};
use notify::event::{EventKind, ModifyKind};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::archive::Archiver;
use super::debounce::{Debouncer, ModifiedDecision};
use super::errors::WatchError;
use super::handle::{RawEvent, WatchHandle};
use crate::config::WatchConfig;

/// Kind of a raw notification for the watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Modified,
    MetadataChanged,
    Deleted,
    Other,
}

impl Notification {
    pub fn classify(kind: &EventKind) -> Self {
        match kind {
            EventKind::Modify(ModifyKind::Metadata(_)) => Notification::MetadataChanged,
            EventKind::Modify(ModifyKind::Name(_)) => Notification::Other,
            EventKind::Modify(_) => Notification::Modified,
            EventKind::Remove(_) => Notification::Deleted,
            _ => Notification::Other,
        }
    }
}

/// What produced a change signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Modified,
    MetadataChanged,
}

/// Logical "the watched file was updated" signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileChanged {
    pub trigger: Trigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Idle,
    Watching,
}

impl std::fmt::Display for DetectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorState::Idle => write!(f, "idle"),
            DetectorState::Watching => write!(f, "watching"),
        }
    }
}

/// Pending re-registration after the watch target was deleted.
#[derive(Debug, Clone, Copy)]
struct Rewatch {
    attempt: u32,
    at: Instant,
}

/// Turns raw notifications for one file into clean [`FileChanged`] signals.
///
/// - MODIFIED goes through the [`Debouncer`].
/// - METADATA_CHANGED (how remote sync tools finish an update) fires at
///   once, after archiving a copy when an archive directory is configured.
/// - DELETED (sync tools replace by delete) re-registers the watch on the
///   recreated path and releases the old handle after a delay.
pub struct ChangeDetector {
    path: PathBuf,
    archiver: Option<Archiver>,
    debouncer: Debouncer,
    teardown_delay: Duration,
    rewatch_attempts: u32,
    rewatch_backoff: Duration,
    handle: Option<WatchHandle>,
    rewatch: Option<Rewatch>,
    raw_tx: UnboundedSender<RawEvent>,
    raw_rx: UnboundedReceiver<RawEvent>,
    changes: UnboundedSender<FileChanged>,
}

impl ChangeDetector {
    /// Validate preconditions and build an idle detector.
    ///
    /// Fails if the watched file is missing, not a regular file or not
    /// readable, or if a configured archive directory is not writable.
    pub fn new(
        config: &WatchConfig,
        changes: UnboundedSender<FileChanged>,
    ) -> Result<Self, WatchError> {
        check_watched_path(&config.path)?;
        let archiver = config.archive_dir.as_deref().map(Archiver::new).transpose()?;
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();

        Ok(Self {
            path: config.path.clone(),
            archiver,
            debouncer: Debouncer::new(config.debounce_window(), config.population_delay()),
            teardown_delay: config.delete_teardown_delay(),
            rewatch_attempts: config.rewatch_attempts,
            rewatch_backoff: config.rewatch_backoff(),
            handle: None,
            rewatch: None,
            raw_tx,
            raw_rx,
            changes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> DetectorState {
        if self.handle.is_some() {
            DetectorState::Watching
        } else {
            DetectorState::Idle
        }
    }

    /// Register with the OS notification source.
    ///
    /// Restartable: a handle already held is swapped out only after the new
    /// one is registered, then released after the teardown delay. Releasing
    /// inline would stop delivery for the path we just re-registered.
    pub fn watch(&mut self) -> Result<(), WatchError> {
        let handle =
            WatchHandle::acquire(&self.path, self.raw_tx.clone()).map_err(|source| {
                WatchError::Notify {
                    path: self.path.clone(),
                    source,
                }
            })?;

        if let Some(old) = self.handle.replace(handle) {
            release_after(old, self.teardown_delay);
        }

        info!(event = "core.watch.started", path = %self.path.display());
        Ok(())
    }

    /// Watch loop. Runs until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            event = "core.watch.loop_started",
            path = %self.path.display(),
            state = %self.state(),
        );

        loop {
            let deadline = self.debouncer.deadline();
            let rewatch_at = self.rewatch.map(|r| r.at);
            tokio::select! {
                _ = shutdown.cancelled() => {
                    break;
                }
                raw = self.raw_rx.recv() => match raw {
                    Some(Ok(event)) => self.handle_event(&event.kind),
                    Some(Err(e)) => {
                        warn!(event = "core.watch.notify_error", error = %e);
                    }
                    // We hold a sender ourselves; kept for exhaustiveness.
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if self.debouncer.take_due(Instant::now()) {
                        self.emit(Trigger::Modified);
                    }
                }
                _ = tokio::time::sleep_until(rewatch_at.unwrap_or_else(Instant::now)), if rewatch_at.is_some() => {
                    if let Some(rewatch) = self.rewatch.take() {
                        self.try_rewatch(rewatch.attempt);
                    }
                }
            }
        }

        info!(event = "core.watch.loop_stopped", path = %self.path.display());
    }

    fn handle_event(&mut self, kind: &EventKind) {
        let now = Instant::now();

        match Notification::classify(kind) {
            Notification::Modified => match self.debouncer.on_modified(now) {
                ModifiedDecision::Accepted { flushed } => {
                    if flushed {
                        self.emit(Trigger::Modified);
                    }
                    debug!(
                        event = "core.watch.modified_accepted",
                        flushed = flushed,
                        deadline_in_ms = self
                            .debouncer
                            .deadline()
                            .map(|d| d.saturating_duration_since(now).as_millis() as u64),
                    );
                }
                ModifiedDecision::Deferred => {
                    debug!(event = "core.watch.modified_deferred");
                }
                ModifiedDecision::Dropped => {
                    debug!(event = "core.watch.modified_duplicate_skipped");
                }
            },
            Notification::MetadataChanged => self.on_metadata_changed(),
            Notification::Deleted => self.on_deleted(),
            Notification::Other => {
                trace!(event = "core.watch.ignored", kind = ?kind);
            }
        }
    }

    fn on_metadata_changed(&self) {
        let Some(archiver) = self.archiver.clone() else {
            debug!(event = "core.watch.metadata_changed", archived = false);
            self.emit(Trigger::MetadataChanged);
            return;
        };

        let path = self.path.clone();
        let changes = self.changes.clone();
        tokio::spawn(async move {
            if let Err(e) = archiver.archive(&path).await {
                error!(
                    event = "core.archive.copy_failed",
                    source = %path.display(),
                    dir = %archiver.dir().display(),
                    error = %e,
                );
            }
            send_signal(&changes, Trigger::MetadataChanged);
        });
    }

    fn on_deleted(&mut self) {
        info!(event = "core.watch.target_deleted", path = %self.path.display());
        self.try_rewatch(1);
    }

    /// One re-registration attempt. A failure schedules the next attempt on
    /// the loop's rewatch deadline until `rewatch_attempts` is used up.
    fn try_rewatch(&mut self, attempt: u32) {
        match self.watch() {
            Ok(()) => {
                self.rewatch = None;
                info!(
                    event = "core.watch.restarted",
                    path = %self.path.display(),
                    attempt = attempt,
                );
            }
            Err(e) => {
                warn!(
                    event = "core.watch.rewatch_failed",
                    path = %self.path.display(),
                    attempt = attempt,
                    error = %e,
                );
                if attempt < self.rewatch_attempts {
                    self.rewatch = Some(Rewatch {
                        attempt: attempt + 1,
                        at: Instant::now() + self.rewatch_backoff,
                    });
                } else {
                    self.rewatch = None;
                    error!(
                        event = "core.watch.rewatch_exhausted",
                        path = %self.path.display(),
                        attempts = self.rewatch_attempts,
                    );
                }
            }
        }
    }

    /// Whether a re-registration attempt is scheduled.
    pub fn rewatch_pending(&self) -> bool {
        self.rewatch.is_some()
    }

    fn emit(&self, trigger: Trigger) {
        send_signal(&self.changes, trigger);
    }

    #[cfg(test)]
    pub(crate) fn raw_sender(&self) -> UnboundedSender<RawEvent> {
        self.raw_tx.clone()
    }
}

fn send_signal(changes: &UnboundedSender<FileChanged>, trigger: Trigger) {
    info!(event = "core.watch.file_changed", trigger = ?trigger);
    if changes.send(FileChanged { trigger }).is_err() {
        warn!(event = "core.watch.signal_dropped", reason = "receiver closed");
    }
}

/// Drop `value` once `delay` has elapsed, off the caller's path.
fn release_after<T: Send + 'static>(value: T, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        drop(value);
    });
}

fn check_watched_path(path: &Path) -> Result<(), WatchError> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(WatchError::WatchedPathMissing {
                path: path.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(WatchError::WatchedPathUnreadable {
                path: path.to_path_buf(),
                source: e.raw_os_error().map_or(Errno::UnknownErrno, Errno::from_raw),
            });
        }
    };
    if !metadata.is_file() {
        return Err(WatchError::WatchedPathNotFile {
            path: path.to_path_buf(),
        });
    }
    access(path, AccessFlags::R_OK).map_err(|source| WatchError::WatchedPathUnreadable {
        path: path.to_path_buf(),
        source,
    })
}
