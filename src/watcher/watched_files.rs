//! Sorted, thread-safe registry of watched files.
//!
//! Keeps every watched file in two views that always describe the same set
//! of `(handle, path)` pairs:
//! - an ordered map in the configured sort order, used for iteration
//! - a path index, used for point lookup and removal
//!
//! Both views live behind a single mutex so no reader ever observes one
//! without the other. Collections of tens of thousands of files are the
//! normal case; no operation rescans the whole set except the bulk
//! snapshot and iteration calls.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use super::error::{WatchError, WatchResult};
use super::handle::{WatchedFile, WatchedHandle};
use super::ordering::{OrderingPolicy, SortKey};
use crate::config::WatchConfig;

/// Identity of a registered handle: the address of its shared allocation.
///
/// The registry holds an `Arc` to every handle it tracks, so an address
/// cannot be reused while its entry is present.
type HandleId = usize;

fn handle_id<H: ?Sized>(handle: &Arc<H>) -> HandleId {
    Arc::as_ptr(handle).cast::<()>() as usize
}

/// Freeze a handle's path into the string stored on both sides of the index.
fn frozen_path(path: &Path) -> WatchResult<Arc<str>> {
    let Some(s) = path.to_str() else {
        return Err(WatchError::InvalidPath {
            path: path.to_path_buf(),
            reason: "path is not valid UTF-8".to_string(),
        });
    };
    if s.is_empty() {
        return Err(WatchError::InvalidPath {
            path: path.to_path_buf(),
            reason: "path is empty".to_string(),
        });
    }
    Ok(Arc::from(s))
}

struct Entries<H: ?Sized> {
    /// Sort position -> handle.
    ordered: BTreeMap<SortKey, Arc<H>>,
    /// Frozen path -> handle.
    by_path: HashMap<Arc<str>, Arc<H>>,
    /// Handle identity -> current sort position (which carries the frozen path).
    keys: HashMap<HandleId, SortKey>,
}

impl<H: ?Sized> Entries<H> {
    fn new() -> Self {
        Self {
            ordered: BTreeMap::new(),
            by_path: HashMap::new(),
            keys: HashMap::new(),
        }
    }

    fn insert(&mut self, id: HandleId, key: SortKey, handle: Arc<H>) {
        self.by_path.insert(key.path().clone(), Arc::clone(&handle));
        self.ordered.insert(key.clone(), handle);
        self.keys.insert(id, key);
    }

    fn remove_path(&mut self, path: &str) -> bool {
        let Some(handle) = self.by_path.remove(path) else {
            return false;
        };
        if let Some(key) = self.keys.remove(&handle_id(&handle)) {
            self.ordered.remove(&key);
        }
        true
    }
}

impl<H: ?Sized> Clone for Entries<H> {
    fn clone(&self) -> Self {
        Self {
            ordered: self.ordered.clone(),
            by_path: self.by_path.clone(),
            keys: self.keys.clone(),
        }
    }
}

/// Registry of watched files in a configurable, strict order.
///
/// Handles are shared with the poller that owns them. The registry keeps
/// each handle's path as it was when the handle was added and rejects any
/// later call that sees the handle under a different path.
///
/// # Locking
///
/// Every operation takes the registry's single lock once. [`each`](Self::each)
/// holds it for the whole pass, so the visitor must not call back into the
/// same registry. [`paths`](Self::paths) and [`files`](Self::files) copy under
/// the lock and return a detached snapshot.
pub struct WatchedFiles<H: WatchedHandle + ?Sized = dyn WatchedHandle> {
    policy: OrderingPolicy,
    entries: Mutex<Entries<H>>,
}

impl<H: WatchedHandle + ?Sized> WatchedFiles<H> {
    /// Create an empty registry sorted by `policy`.
    pub fn new(policy: OrderingPolicy) -> Self {
        Self {
            policy,
            entries: Mutex::new(Entries::new()),
        }
    }

    /// Create an empty registry from the `[watch]` settings section.
    pub fn from_config(config: &WatchConfig) -> Self {
        Self::new(config.policy())
    }

    pub fn policy(&self) -> OrderingPolicy {
        self.policy
    }

    /// Register a handle, returning the path it is stored under.
    ///
    /// Adding a handle that is already registered under the same path
    /// changes nothing. Adding it while its path differs from the recorded
    /// one fails with [`WatchError::PathChanged`]. A different handle for a
    /// path that is already present replaces the previous handle.
    pub fn add(&self, handle: Arc<H>) -> WatchResult<Arc<str>> {
        let path = frozen_path(handle.path())?;
        let modified_at = if self.policy.sorts_by_modified_at() {
            handle.modified_at(false)
        } else {
            0.0
        };
        let key = self.policy.key_for(Arc::clone(&path), modified_at);
        let id = handle_id(&handle);

        let mut entries = self.entries.lock();
        if let Some(recorded) = entries.keys.get(&id) {
            if recorded.path() != &path {
                return Err(WatchError::PathChanged {
                    recorded: recorded.path().to_string(),
                    current: path.to_string(),
                });
            }
            return Ok(Arc::clone(recorded.path()));
        }
        let replaced = entries.remove_path(&path);
        entries.insert(id, key, handle);
        drop(entries);

        if replaced {
            crate::log_event!("watcher", "replaced", "handle for {path}");
        } else {
            crate::debug_event!("watcher", "added", "{path}");
        }
        Ok(path)
    }

    /// Remove the entry for `path`, returning whether one was present.
    pub fn remove(&self, path: impl AsRef<Path>) -> bool {
        self.remove_paths([path]) == 1
    }

    /// Remove the entries for all `paths`, returning how many were present.
    ///
    /// Paths that are not registered are skipped. All removals happen under
    /// one lock acquisition.
    pub fn remove_paths<I, P>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut entries = self.entries.lock();
        let removed = paths
            .into_iter()
            .filter_map(|path| path.as_ref().to_str().map(|s| entries.remove_path(s)))
            .filter(|removed| *removed)
            .count();
        drop(entries);

        if removed > 0 {
            crate::debug_event!("watcher", "removed", "{removed} path(s)");
        }
        removed
    }

    /// Look up the handle registered for `path`.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<Arc<H>> {
        let path = path.as_ref().to_str()?;
        self.entries.lock().by_path.get(path).cloned()
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.get(path).is_some()
    }

    /// Number of registered files.
    pub fn len(&self) -> usize {
        self.entries.lock().ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().ordered.is_empty()
    }

    /// Visit every handle in sort order while holding the registry lock.
    ///
    /// No mutation can interleave with the pass. Calling back into this
    /// registry from `visitor` deadlocks.
    pub fn each<F>(&self, mut visitor: F)
    where
        F: FnMut(&Arc<H>),
    {
        let entries = self.entries.lock();
        for handle in entries.ordered.values() {
            visitor(handle);
        }
    }

    /// Snapshot of all registered paths in sort order.
    pub fn paths(&self) -> Vec<Arc<str>> {
        self.entries
            .lock()
            .ordered
            .keys()
            .map(|key| Arc::clone(key.path()))
            .collect()
    }

    /// Snapshot of all registered handles in sort order.
    pub fn files(&self) -> Vec<Arc<H>> {
        self.entries.lock().ordered.values().cloned().collect()
    }

    /// Move a handle to the position matching its current modification time.
    ///
    /// Returns `false` without touching the handle when the registry is not
    /// sorted by modification time, or when the handle is not registered.
    /// Otherwise the handle's modification time is refreshed and the entry
    /// re-sorted; its path index entry is left as is.
    pub fn update(&self, handle: &Arc<H>) -> WatchResult<bool> {
        self.resort(handle, true)
    }

    /// Re-key a registered handle from `modified_at(refresh)`.
    ///
    /// The handle is read before any index is touched, so a handle that
    /// panics leaves the entry at its old position.
    fn resort(&self, handle: &Arc<H>, refresh: bool) -> WatchResult<bool> {
        if !self.policy.sorts_by_modified_at() {
            return Ok(false);
        }
        let id = handle_id(handle);

        let mut entries = self.entries.lock();
        let Some(old_key) = entries.keys.get(&id).cloned() else {
            crate::debug_event!(
                "watcher",
                "update skipped",
                "{} is not registered",
                handle.path().display()
            );
            return Ok(false);
        };
        let current = handle.path();
        if current.to_str() != Some(old_key.path().as_ref()) {
            return Err(WatchError::PathChanged {
                recorded: old_key.path().to_string(),
                current: current.display().to_string(),
            });
        }

        let modified_at = handle.modified_at(refresh);
        let key = self.policy.key_for(Arc::clone(old_key.path()), modified_at);
        entries.ordered.remove(&old_key);
        entries.ordered.insert(key.clone(), Arc::clone(handle));
        entries.keys.insert(id, key);
        drop(entries);

        crate::debug_event!("watcher", "resorted", "{} at {modified_at}", old_key.path());
        Ok(true)
    }

    /// Independent copy with the same policy and entries.
    ///
    /// Handles are shared; the index structures are not.
    pub fn duplicate(&self) -> Self {
        let entries = self.entries.lock().clone();
        Self {
            policy: self.policy,
            entries: Mutex::new(entries),
        }
    }

    /// Short summary for log lines.
    pub fn describe(&self) -> String {
        format!("WatchedFiles({}): size={}", self.policy, self.len())
    }
}

impl WatchedFiles<WatchedFile> {
    /// Re-stat a handle and re-sort it if its modification time changed.
    ///
    /// Re-sorting on change keeps the order current without re-sorting the
    /// whole collection on every stat pass. The file is stat'ed once; the
    /// re-sort uses the value that stat cached. Returns whether the entry
    /// was re-sorted.
    pub fn restat(&self, handle: &Arc<WatchedFile>) -> WatchResult<bool> {
        let changed = handle.restat().map_err(|source| WatchError::Stat {
            path: handle.path().to_path_buf(),
            source,
        })?;
        if !changed {
            return Ok(false);
        }
        self.resort(handle, false)
    }
}

impl<H: WatchedHandle + ?Sized> Clone for WatchedFiles<H> {
    fn clone(&self) -> Self {
        self.duplicate()
    }
}

impl<H: WatchedHandle + ?Sized> fmt::Debug for WatchedFiles<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchedFiles")
            .field("policy", &self.policy)
            .field("size", &self.len())
            .finish()
    }
}

impl<H: WatchedHandle + ?Sized> fmt::Display for WatchedFiles<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
