//! Directory membership.
//!
//! The dispatcher decides between a listing and a raw file by asking whether
//! a cleaned request path names a known directory. [`DirectorySet`] is that
//! question; [`DirectoryTracker`] answers it for a live tree.

mod tracker;

use std::collections::BTreeSet;

pub use tracker::{scan_directories, DirectoryTracker};

/// Read-only view of the directories under a served root.
///
/// Paths are URL-style: `/` is the root, `/cats` and `/cats/kittens` are
/// subdirectories. Implementations must never block on I/O.
pub trait DirectorySet: Send + Sync {
    /// Whether `path` is a known directory.
    fn contains(&self, path: &str) -> bool;

    /// Every known directory, sorted.
    fn list(&self) -> Vec<String>;

    /// Known directories whose parent is `parent`, sorted.
    fn children(&self, parent: &str) -> Vec<String> {
        self.list()
            .into_iter()
            .filter(|dir| dir != parent && parent_of(dir) == parent)
            .collect()
    }
}

/// A fixed set, for tests and one-shot scans.
impl DirectorySet for BTreeSet<String> {
    fn contains(&self, path: &str) -> bool {
        BTreeSet::contains(self, path)
    }

    fn list(&self) -> Vec<String> {
        self.iter().cloned().collect()
    }
}

/// URL parent of a cleaned path; the root is its own parent.
pub(crate) fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}
