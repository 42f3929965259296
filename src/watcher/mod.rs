//! Watched-file registry for the file tailing service.
//!
//! The poller discovers files, wraps each in a [`WatchedHandle`] and keeps the
//! registry current; processing threads read the registry in a stable order.
//!
//! # Architecture
//!
//! ```text
//! poller (discover / restat / rotate)        processing threads
//!     |  add / remove_paths / update             |  get / files / paths / each
//!     v                                          v
//!   WatchedFiles ---- one Mutex ----+------------+
//!     ordered: SortKey -> handle    |  OrderingPolicy
//!     by_path: path    -> handle    |    (path | last_modified, asc | desc)
//! ```

mod error;
mod handle;
mod ordering;
mod watched_files;

pub use error::{WatchError, WatchResult};
pub use handle::{WatchedFile, WatchedHandle};
pub use ordering::{OrderingPolicy, SortBy, SortDirection};
pub use watched_files::WatchedFiles;
