//! In-memory registry of watched files for a high-volume file tailing service.
//!
//! A poller discovers files and keeps the [`WatchedFiles`] registry current;
//! processing threads consume it in a stable order, sorted by path or by
//! last modification time.

pub mod config;
pub mod logging;
pub mod watcher;

pub use config::{LoggingConfig, Settings, WatchConfig};
pub use watcher::{
    OrderingPolicy, SortBy, SortDirection, WatchError, WatchResult, WatchedFile, WatchedFiles,
    WatchedHandle,
};
