//! Watched-file handles.
//!
//! The registry only needs two things from a handle: the path it stands for
//! and its last known modification time. [`WatchedHandle`] captures that
//! contract; [`WatchedFile`] is the stat-backed handle a poller creates when
//! it discovers a path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Capabilities a registry consumes from a watched file.
///
/// `path` must not change while the handle is registered. Registries check
/// this on every call that touches the handle and reject a changed path with
/// [`WatchError::PathChanged`](super::WatchError::PathChanged).
pub trait WatchedHandle: Send + Sync {
    /// Filesystem path this handle represents.
    fn path(&self) -> &Path;

    /// Last known modification time in fractional seconds since the UNIX epoch.
    ///
    /// With `refresh` set the value is re-read from its source first.
    fn modified_at(&self, refresh: bool) -> f64;
}

/// A discovered file whose modification time comes from `stat`.
#[derive(Debug)]
pub struct WatchedFile {
    path: PathBuf,
    /// `f64` bits of the cached modification time.
    modified_at: AtomicU64,
}

impl WatchedFile {
    /// Stat `path` and build a handle from the result.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let modified_at = stat_modified_at(&path)?;
        Ok(Self::with_modified_at(path, modified_at))
    }

    /// Build a handle from a modification time the caller already has.
    pub fn with_modified_at(path: impl Into<PathBuf>, modified_at: f64) -> Self {
        Self {
            path: path.into(),
            modified_at: AtomicU64::new(modified_at.to_bits()),
        }
    }

    /// Overwrite the cached modification time.
    ///
    /// The value lasts until the next refresh: `modified_at(true)`, `restat`
    /// and `WatchedFiles::update` all re-stat the file and replace it. A
    /// registry sorted by modification time only sees a new value once the
    /// handle is re-sorted.
    pub fn set_modified_at(&self, modified_at: f64) {
        self.modified_at
            .store(modified_at.to_bits(), Ordering::Release);
    }

    /// Re-stat the file, returning whether the modification time changed.
    pub fn restat(&self) -> io::Result<bool> {
        let fresh = stat_modified_at(&self.path)?;
        let previous = f64::from_bits(self.modified_at.swap(fresh.to_bits(), Ordering::AcqRel));
        Ok(previous.total_cmp(&fresh).is_ne())
    }

    fn cached_modified_at(&self) -> f64 {
        f64::from_bits(self.modified_at.load(Ordering::Acquire))
    }
}

impl WatchedHandle for WatchedFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn modified_at(&self, refresh: bool) -> f64 {
        if refresh {
            if let Err(e) = self.restat() {
                // Vanished or unreadable files are the poller's concern; keep the last value.
                tracing::warn!(
                    target: "watcher",
                    "stat failed for {}, keeping last modified_at: {e}",
                    self.path.display()
                );
            }
        }
        self.cached_modified_at()
    }
}

fn stat_modified_at(path: &Path) -> io::Result<f64> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(system_time_to_secs(modified))
}

/// Fractional seconds since the UNIX epoch, negative for earlier times.
///
/// Any representable `SystemTime` converts; filesystems allow mtimes far
/// outside calendar-library ranges.
fn system_time_to_secs(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => since.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}
