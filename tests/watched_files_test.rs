use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use tailwatch::{OrderingPolicy, SortBy, SortDirection, WatchConfig, WatchedFiles, WatchedHandle};

/// Poller-side handle that never touches the filesystem.
struct StubFile {
    path: PathBuf,
    modified_at: AtomicU64,
    pending: AtomicU64,
}

impl StubFile {
    fn new(path: &str, modified_at: f64) -> Arc<Self> {
        Arc::new(Self {
            path: PathBuf::from(path),
            modified_at: AtomicU64::new(modified_at.to_bits()),
            pending: AtomicU64::new(modified_at.to_bits()),
        })
    }

    fn touch(&self, modified_at: f64) {
        self.pending.store(modified_at.to_bits(), Ordering::SeqCst);
    }
}

impl WatchedHandle for StubFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn modified_at(&self, refresh: bool) -> f64 {
        if refresh {
            let pending = self.pending.load(Ordering::SeqCst);
            self.modified_at.store(pending, Ordering::SeqCst);
        }
        f64::from_bits(self.modified_at.load(Ordering::SeqCst))
    }
}

fn paths(files: &WatchedFiles<StubFile>) -> Vec<String> {
    files.paths().iter().map(|p| p.to_string()).collect()
}

#[test]
fn test_var_log_scenario() {
    let config = WatchConfig {
        file_sort_by: SortBy::Path,
        file_sort_direction: SortDirection::Asc,
    };
    let files = WatchedFiles::from_config(&config);

    for path in ["/var/log/b.log", "/var/log/a.log", "/var/log/c.log"] {
        files.add(StubFile::new(path, 0.0)).unwrap();
    }

    assert_eq!(
        paths(&files),
        vec!["/var/log/a.log", "/var/log/b.log", "/var/log/c.log"]
    );
}

#[test]
fn test_descending_is_exact_reverse() {
    let asc = WatchedFiles::new(OrderingPolicy::new(SortBy::Path, SortDirection::Asc));
    let desc = WatchedFiles::new(OrderingPolicy::new(SortBy::Path, SortDirection::Desc));

    for path in ["/x/2", "/x/10", "/a", "/x/1", "/b/c"] {
        let handle = StubFile::new(path, 0.0);
        asc.add(Arc::clone(&handle)).unwrap();
        desc.add(handle).unwrap();
    }

    let mut reversed = paths(&desc);
    reversed.reverse();
    assert_eq!(paths(&asc), reversed);
    assert_eq!(paths(&asc), vec!["/a", "/b/c", "/x/1", "/x/10", "/x/2"]);
}

#[test]
fn test_update_moves_entry_and_keeps_lookup() {
    let files = WatchedFiles::new(OrderingPolicy::new(
        SortBy::LastModified,
        SortDirection::Asc,
    ));
    let old = StubFile::new("/logs/old.log", 10.0);
    let new = StubFile::new("/logs/new.log", 20.0);
    files.add(Arc::clone(&old)).unwrap();
    files.add(Arc::clone(&new)).unwrap();
    assert_eq!(paths(&files), vec!["/logs/old.log", "/logs/new.log"]);

    old.touch(30.0);
    assert!(files.update(&old).unwrap());

    assert_eq!(paths(&files), vec!["/logs/new.log", "/logs/old.log"]);
    assert!(Arc::ptr_eq(&files.get("/logs/old.log").unwrap(), &old));
    assert_eq!(files.len(), 2);
}

#[test]
fn test_snapshots_are_detached() {
    let files = WatchedFiles::new(OrderingPolicy::new(SortBy::Path, SortDirection::Asc));
    files.add(StubFile::new("/a", 0.0)).unwrap();
    files.add(StubFile::new("/b", 0.0)).unwrap();

    let path_snapshot = files.paths();
    let file_snapshot = files.files();
    files.remove_paths(["/a", "/b"]);

    assert!(files.is_empty());
    assert_eq!(path_snapshot.len(), 2);
    assert_eq!(file_snapshot[0].path(), Path::new("/a"));
}

#[test]
fn test_duplicate_keeps_order_and_independence() {
    let files = WatchedFiles::new(OrderingPolicy::new(
        SortBy::LastModified,
        SortDirection::Desc,
    ));
    for (i, path) in ["/one", "/two", "/three", "/four"].iter().enumerate() {
        files.add(StubFile::new(path, i as f64)).unwrap();
    }

    let copy = files.duplicate();
    assert_eq!(paths(&copy), paths(&files));

    assert_eq!(copy.remove_paths(["/one", "/two"]), 2);
    assert_eq!(copy.len(), 2);
    assert_eq!(files.len(), 4);
    assert_eq!(paths(&files), vec!["/four", "/three", "/two", "/one"]);
}

#[test]
fn test_concurrent_poller_and_readers() {
    const FILES: usize = 2_000;

    let files = Arc::new(WatchedFiles::new(OrderingPolicy::new(
        SortBy::LastModified,
        SortDirection::Asc,
    )));
    let handles: Arc<Vec<Arc<StubFile>>> = Arc::new(
        (0..FILES)
            .map(|i| StubFile::new(&format!("/var/log/app-{i:05}.log"), (i % 7) as f64))
            .collect(),
    );

    let poller = {
        let files = Arc::clone(&files);
        let handles = Arc::clone(&handles);
        thread::spawn(move || {
            for handle in handles.iter() {
                files.add(Arc::clone(handle)).unwrap();
            }
            for (i, handle) in handles.iter().enumerate().step_by(3) {
                handle.touch(100.0 + i as f64);
                assert!(files.update(handle).unwrap());
            }
            let gone: Vec<String> = (0..FILES)
                .step_by(5)
                .map(|i| format!("/var/log/app-{i:05}.log"))
                .collect();
            files.remove_paths(&gone)
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let files = Arc::clone(&files);
            thread::spawn(move || {
                for _ in 0..50 {
                    // Order must hold for the whole pass, whatever the poller is doing
                    let policy = files.policy();
                    let mut previous: Option<Arc<StubFile>> = None;
                    let mut visited = 0;
                    files.each(|handle| {
                        if let Some(prev) = &previous {
                            assert_eq!(
                                policy.compare(prev.as_ref(), handle.as_ref()),
                                std::cmp::Ordering::Less
                            );
                        }
                        previous = Some(Arc::clone(handle));
                        visited += 1;
                    });
                    assert!(visited <= FILES);

                    let snapshot = files.files();
                    for path in snapshot.iter().take(10).map(|h| h.path().to_path_buf()) {
                        // Entry may have been removed since the snapshot; both outcomes are fine
                        if let Some(found) = files.get(&path) {
                            assert_eq!(found.path(), path);
                        }
                    }
                }
            })
        })
        .collect();

    let removed = poller.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(removed, FILES / 5);
    assert_eq!(files.len(), FILES - FILES / 5);
    assert!(files.get("/var/log/app-00000.log").is_none());
    assert!(files.get("/var/log/app-00001.log").is_some());
    assert_eq!(
        files.describe(),
        format!("WatchedFiles(last_modified asc): size={}", FILES - FILES / 5)
    );
}

#[test]
fn test_heterogeneous_handles() {
    let files: WatchedFiles = WatchedFiles::new(OrderingPolicy::new(
        SortBy::Path,
        SortDirection::Asc,
    ));
    let stub: Arc<dyn WatchedHandle> = StubFile::new("/b", 2.0);
    let stat: Arc<dyn WatchedHandle> =
        Arc::new(tailwatch::WatchedFile::with_modified_at("/a", 1.0));

    files.add(stub).unwrap();
    files.add(stat).unwrap();

    let order: Vec<_> = files.files().iter().map(|h| h.path().to_path_buf()).collect();
    assert_eq!(order, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
}
