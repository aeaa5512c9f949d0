//! Background-maintained set of directories under a root.
//!
//! A `notify` watcher forwards change signals over a channel to a task that
//! rescans the tree and swaps in the new set. Readers take a short read lock
//! and never wait on the filesystem; what they see is the latest completed
//! scan, so it may briefly lag the real tree.
//!
//! Excluded subtrees (the thumbnail cache when it lives under the image root)
//! are left out of every scan, and changes inside them never trigger one.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::TrackerError;

use super::DirectorySet;

type Shared = Arc<RwLock<BTreeSet<String>>>;

/// Watcher and rescan task, present until shutdown.
struct Worker {
    watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

/// Live directory set for one root.
pub struct DirectoryTracker {
    root: PathBuf,
    exclusions: Exclusions,
    dirs: Shared,
    worker: Mutex<Option<Worker>>,
}

impl DirectoryTracker {
    /// Scan `root` once and keep watching it for changes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn watch(root: impl Into<PathBuf>) -> Result<Self, TrackerError> {
        Self::watch_excluding(root, &[])
    }

    /// Like [`watch`](Self::watch), leaving out the subtrees at `excluded`.
    ///
    /// Excluded paths outside `root`, or that do not exist yet, have no
    /// effect.
    pub fn watch_excluding(
        root: impl Into<PathBuf>,
        excluded: &[PathBuf],
    ) -> Result<Self, TrackerError> {
        let root = checked_root(root.into())?;
        let exclusions = Exclusions::new(&root, excluded);

        let dirs: Shared = Arc::new(RwLock::new(scan(&root, &exclusions)));
        let (tx, rx) = mpsc::unbounded_channel();

        let filter = exclusions.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if changes_tree(&event.kind) && !filter.covers_all(&event.paths) => {
                let _ = tx.send(());
            }
            Ok(_) => {}
            Err(e) => warn!("Directory watcher error: {}", e),
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        let task = tokio::spawn(rescan_loop(
            root.clone(),
            exclusions.clone(),
            Arc::clone(&dirs),
            rx,
        ));

        info!(
            root = %root.display(),
            directories = read(&dirs).len(),
            excluded = exclusions.len(),
            "Directory tracker started"
        );

        Ok(Self {
            root,
            exclusions,
            dirs,
            worker: Mutex::new(Some(Worker { watcher, task })),
        })
    }

    /// Scan `root` once without watching.
    pub fn snapshot(root: impl Into<PathBuf>) -> Result<Self, TrackerError> {
        Self::snapshot_excluding(root, &[])
    }

    /// Like [`snapshot`](Self::snapshot), leaving out the subtrees at
    /// `excluded`.
    pub fn snapshot_excluding(
        root: impl Into<PathBuf>,
        excluded: &[PathBuf],
    ) -> Result<Self, TrackerError> {
        let root = checked_root(root.into())?;
        let exclusions = Exclusions::new(&root, excluded);
        let dirs = Arc::new(RwLock::new(scan(&root, &exclusions)));
        Ok(Self {
            root,
            exclusions,
            dirs,
            worker: Mutex::new(None),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` lies in an excluded subtree of the root.
    pub fn excludes(&self, path: &Path) -> bool {
        std::fs::canonicalize(path)
            .map(|canonical| self.exclusions.covers(&canonical))
            .unwrap_or(false)
    }

    /// Rescan immediately, on the calling thread.
    pub fn refresh(&self) {
        let scanned = scan(&self.root, &self.exclusions);
        replace(&self.dirs, scanned);
    }

    /// Whether the watcher is still running.
    pub fn is_watching(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Stop watching. The last scanned set stays readable.
    pub async fn shutdown(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(Worker { watcher, task }) = worker {
            // dropping the watcher closes the channel and ends the loop
            drop(watcher);
            if let Err(e) = task.await {
                warn!("Directory tracker task ended abnormally: {}", e);
            }
            info!(root = %self.root.display(), "Directory tracker stopped");
        }
    }
}

impl DirectorySet for DirectoryTracker {
    fn contains(&self, path: &str) -> bool {
        read(&self.dirs).contains(path)
    }

    fn list(&self) -> Vec<String> {
        read(&self.dirs).iter().cloned().collect()
    }
}

impl std::fmt::Debug for DirectoryTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryTracker")
            .field("root", &self.root)
            .field("directories", &read(&self.dirs).len())
            .field("watching", &self.is_watching())
            .finish()
    }
}

// =============================================================================
// Scanning
// =============================================================================

/// Collect every directory under `root` as a URL path.
///
/// Directories whose name starts with `.` are skipped along with everything
/// beneath them. Unreadable subtrees are skipped.
pub fn scan_directories(root: &Path) -> BTreeSet<String> {
    scan(root, &Exclusions::new(root, &[]))
}

fn scan(root: &Path, exclusions: &Exclusions) -> BTreeSet<String> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !(is_hidden(entry.file_name()) || exclusions.covers(entry.path()))
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(|entry| url_path(root, entry.path()))
        .collect()
}

fn url_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(format!("/{}", segments.join("/")))
}

fn checked_root(root: PathBuf) -> Result<PathBuf, TrackerError> {
    if root.is_dir() {
        Ok(root)
    } else {
        Err(TrackerError::NotADirectory {
            path: root.display().to_string(),
        })
    }
}

/// Subtrees left out of scans, stored relative to the root.
#[derive(Debug, Clone)]
struct Exclusions {
    root: PathBuf,
    canonical_root: Option<PathBuf>,
    relative: Arc<[PathBuf]>,
}

impl Exclusions {
    fn new(root: &Path, excluded: &[PathBuf]) -> Self {
        let canonical_root = std::fs::canonicalize(root).ok();
        let relative: Vec<PathBuf> = match &canonical_root {
            Some(canonical_root) => excluded
                .iter()
                .filter_map(|path| std::fs::canonicalize(path).ok())
                .filter_map(|path| {
                    path.strip_prefix(canonical_root)
                        .ok()
                        .map(Path::to_path_buf)
                })
                // excluding the root itself would hide everything
                .filter(|relative| !relative.as_os_str().is_empty())
                .collect(),
            None => Vec::new(),
        };
        Self {
            root: root.to_path_buf(),
            canonical_root,
            relative: relative.into(),
        }
    }

    fn len(&self) -> usize {
        self.relative.len()
    }

    /// `path` may be under the root as given or under its canonical form.
    fn covers(&self, path: &Path) -> bool {
        if self.relative.is_empty() {
            return false;
        }
        let relative = path.strip_prefix(&self.root).ok().or_else(|| {
            self.canonical_root
                .as_deref()
                .and_then(|canonical| path.strip_prefix(canonical).ok())
        });
        match relative {
            Some(relative) => self.relative.iter().any(|ex| relative.starts_with(ex)),
            None => false,
        }
    }

    fn covers_all(&self, paths: &[PathBuf]) -> bool {
        !paths.is_empty() && paths.iter().all(|path| self.covers(path))
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|n| n.starts_with('.')).unwrap_or(false)
}

/// Events that can add, remove or rename a directory.
fn changes_tree(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) | EventKind::Any
    )
}

async fn rescan_loop(
    root: PathBuf,
    exclusions: Exclusions,
    dirs: Shared,
    mut rx: mpsc::UnboundedReceiver<()>,
) {
    while rx.recv().await.is_some() {
        // coalesce bursts into one rescan
        while rx.try_recv().is_ok() {}

        let scan_root = root.clone();
        let scan_exclusions = exclusions.clone();
        match tokio::task::spawn_blocking(move || scan(&scan_root, &scan_exclusions)).await {
            Ok(scanned) => {
                debug!(directories = scanned.len(), "Rescanned directory tree");
                replace(&dirs, scanned);
            }
            Err(e) => warn!("Directory rescan failed: {}", e),
        }
    }
}

fn read(dirs: &Shared) -> std::sync::RwLockReadGuard<'_, BTreeSet<String>> {
    dirs.read().unwrap_or_else(PoisonError::into_inner)
}

fn replace(dirs: &Shared, scanned: BTreeSet<String>) {
    *dirs.write().unwrap_or_else(PoisonError::into_inner) = scanned;
}
