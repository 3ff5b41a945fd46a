//! Watched-file change detection.
//!
//! [`ChangeDetector`] owns one OS watch on the results file and converts its
//! raw, often duplicated notifications into [`FileChanged`] signals.

pub mod archive;
pub mod debounce;
pub mod detector;
pub mod errors;
pub mod handle;

pub use archive::Archiver;
pub use debounce::{Debouncer, ModifiedDecision};
pub use detector::{ChangeDetector, DetectorState, FileChanged, Notification, Trigger};
pub use errors::WatchError;
pub use handle::WatchHandle;
