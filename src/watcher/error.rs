//! Error types for the watched-file registry.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from registry construction and mutation.
///
/// Lookups that find nothing are not errors: `get` returns `None`,
/// `remove` returns a zero count and `update` returns `false`.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("sort_by: '{value}' not supported (expected 'path' or 'last_modified')")]
    InvalidSortBy { value: String },

    #[error("sort_direction: '{value}' not supported (expected 'asc' or 'desc')")]
    InvalidSortDirection { value: String },

    #[error("Watched file path changed from '{recorded}' to '{current}' while registered")]
    PathChanged { recorded: String, current: String },

    #[error("Unusable watched file path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("Failed to stat {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WatchError {
    /// True for errors raised while building an ordering policy.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            WatchError::InvalidSortBy { .. } | WatchError::InvalidSortDirection { .. }
        )
    }
}

pub type WatchResult<T> = Result<T, WatchError>;
