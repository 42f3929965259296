//! Ordering policy for watched files.
//!
//! Builds a strict total order from `file_sort_by` and `file_sort_direction`.
//! Sorting by modification time always falls back to the path on equal
//! timestamps, so two distinct files never compare equal.

use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::{WatchError, WatchResult};
use super::handle::WatchedHandle;

/// Primary sort key of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Path,
    #[default]
    #[serde(alias = "lastModified")]
    LastModified,
}

/// Direction applied on top of the primary sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortBy {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "path" => Ok(SortBy::Path),
            "last_modified" | "lastModified" => Ok(SortBy::LastModified),
            other => Err(WatchError::InvalidSortBy {
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for SortDirection {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(WatchError::InvalidSortDirection {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortBy::Path => write!(f, "path"),
            SortBy::LastModified => write!(f, "last_modified"),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "asc"),
            SortDirection::Desc => write!(f, "desc"),
        }
    }
}

/// Sort configuration shared by a registry and its duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OrderingPolicy {
    sort_by: SortBy,
    direction: SortDirection,
}

impl OrderingPolicy {
    pub fn new(sort_by: SortBy, direction: SortDirection) -> Self {
        Self { sort_by, direction }
    }

    /// Parse a policy from raw setting values.
    ///
    /// Unknown values are rejected; there is no fallback to the defaults.
    pub fn from_names(sort_by: &str, direction: &str) -> WatchResult<Self> {
        Ok(Self::new(sort_by.parse()?, direction.parse()?))
    }

    pub fn sort_by(&self) -> SortBy {
        self.sort_by
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    /// Whether entries must be re-sorted when their modification time changes.
    pub fn sorts_by_modified_at(&self) -> bool {
        self.sort_by == SortBy::LastModified
    }

    /// Compare two handles under this policy.
    ///
    /// Reads `modified_at(false)` only, never refreshing the handles.
    pub fn compare<A, B>(&self, a: &A, b: &B) -> Ordering
    where
        A: WatchedHandle + ?Sized,
        B: WatchedHandle + ?Sized,
    {
        if std::ptr::addr_eq(a, b) {
            return Ordering::Equal;
        }
        let ord = match self.sort_by {
            SortBy::Path => compare_paths(a.path(), b.path()),
            SortBy::LastModified => a
                .modified_at(false)
                .total_cmp(&b.modified_at(false))
                .then_with(|| compare_paths(a.path(), b.path())),
        };
        self.apply_direction(ord)
    }

    /// Freeze the sort position of an entry.
    pub(crate) fn key_for(&self, path: Arc<str>, modified_at: f64) -> SortKey {
        let modified_at = if self.sorts_by_modified_at() {
            modified_at
        } else {
            0.0
        };
        SortKey {
            modified_at,
            path,
            descending: self.direction == SortDirection::Desc,
        }
    }

    fn apply_direction(&self, ord: Ordering) -> Ordering {
        match self.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

impl fmt::Display for OrderingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.sort_by, self.direction)
    }
}

fn compare_paths(a: &Path, b: &Path) -> Ordering {
    a.as_os_str().cmp(b.as_os_str())
}

/// Snapshot of an entry's position in the ordered map.
///
/// Keys are only rebuilt by `add` and `update`, so a handle whose timestamp
/// moves between re-sorts cannot disturb the map's ordering.
/// `modified_at` is `0.0` for every key of a path-sorted registry.
#[derive(Debug, Clone)]
pub(crate) struct SortKey {
    modified_at: f64,
    path: Arc<str>,
    descending: bool,
}

impl SortKey {
    pub(crate) fn path(&self) -> &Arc<str> {
        &self.path
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let ord = self
            .modified_at
            .total_cmp(&other.modified_at)
            .then_with(|| self.path.as_bytes().cmp(other.path.as_bytes()));
        if self.descending { ord.reverse() } else { ord }
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}
