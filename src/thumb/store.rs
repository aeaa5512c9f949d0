//! On-disk thumbnail cache.
//!
//! Entries live at `<cache root>/<identity>.<suffix>`, mirroring the raw image
//! tree. There is no eviction: entries are created on first miss and only
//! ever replaced by a later regeneration.
//!
//! The entry path carries no geometry, so a store built with target
//! dimensions checks the stored image header and treats a size left behind
//! by an earlier configuration as a miss.
//!
//! Writes go to a temporary file in the destination directory which is then
//! renamed over the final path, so a concurrent reader sees either the old
//! entry, the new entry, or no entry, never a partial one.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::NamedTempFile;
use tokio::fs::File;
use tracing::{debug, warn};

use crate::content::sniff_file;
use crate::error::ServeError;
use crate::path::ImageIdentity;

use super::format::ThumbFormat;

/// An opened cache entry that passed validation.
#[derive(Debug)]
pub struct CachedEntry {
    pub file: File,
    pub len: u64,
    pub modified: SystemTime,
}

/// Filesystem-backed thumbnail cache.
#[derive(Debug, Clone)]
pub struct ThumbStore {
    root: PathBuf,
    suffix: String,
    dimensions: Option<(u32, u32)>,
}

impl ThumbStore {
    /// Create a store rooted at `root` whose entries end in `.<suffix>`.
    pub fn new(root: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            suffix: suffix.into(),
            dimensions: None,
        }
    }

    /// Only accept entries that are exactly `width` x `height`.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Some((width, height));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic location of the entry for `identity`.
    pub fn entry_path(&self, identity: &ImageIdentity) -> PathBuf {
        self.root
            .join(format!("{}.{}", identity.as_str(), self.suffix))
    }

    /// Open the entry for `identity` if it is usable.
    ///
    /// Returns `None` when the entry is missing, unreadable, holds a format
    /// other than `format`, has the wrong size for a store with dimensions,
    /// or (when `source_modified` is given) is older than its source. All of
    /// these mean "regenerate".
    pub async fn open(
        &self,
        identity: &ImageIdentity,
        format: ThumbFormat,
        source_modified: Option<SystemTime>,
    ) -> Option<CachedEntry> {
        let path = self.entry_path(identity);

        let mut file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), "Cannot open thumbnail cache entry: {}", e);
                return None;
            }
        };

        let sniffed = match sniff_file(&mut file).await {
            Ok(sniffed) => sniffed,
            Err(e) => {
                warn!(path = %path.display(), "Cannot read thumbnail cache entry: {}", e);
                return None;
            }
        };
        if sniffed != format.media_type() {
            debug!(
                path = %path.display(),
                expected = format.media_type(),
                found = sniffed,
                "Cache entry holds a different format, regenerating"
            );
            return None;
        }

        if let Some(expected) = self.dimensions {
            let found = stored_dimensions(path.clone()).await;
            if found != Some(expected) {
                debug!(
                    path = %path.display(),
                    expected = ?expected,
                    found = ?found,
                    "Cache entry has a different size, regenerating"
                );
                return None;
            }
        }

        let metadata = file.metadata().await.ok()?;
        let modified = metadata.modified().ok()?;

        if let Some(source_modified) = source_modified {
            if modified < source_modified {
                debug!(path = %path.display(), "Cache entry older than its source, regenerating");
                return None;
            }
        }

        Some(CachedEntry {
            file,
            len: metadata.len(),
            modified,
        })
    }

    /// Atomically write `data` as the entry for `identity`.
    ///
    /// Blocking; call from a blocking context.
    pub fn persist(&self, identity: &ImageIdentity, data: &[u8]) -> Result<PathBuf, ServeError> {
        let path = self.entry_path(identity);
        let parent = path
            .parent()
            .ok_or_else(|| ServeError::processing("cache entry has no parent directory"))?;

        std::fs::create_dir_all(parent).map_err(|e| {
            ServeError::processing(format!(
                "could not create cache directory {}: {}",
                parent.display(),
                e
            ))
        })?;

        let mut tmp = NamedTempFile::new_in(parent).map_err(|e| {
            ServeError::processing(format!("could not create temp file: {}", e))
        })?;
        tmp.write_all(data)
            .and_then(|_| tmp.flush())
            .map_err(|e| ServeError::processing(format!("could not write thumbnail: {}", e)))?;
        tmp.persist(&path).map_err(|e| {
            ServeError::processing(format!(
                "could not move thumbnail into {}: {}",
                path.display(),
                e.error
            ))
        })?;

        Ok(path)
    }
}

/// Read the width and height from an image header without decoding pixels.
async fn stored_dimensions(path: PathBuf) -> Option<(u32, u32)> {
    tokio::task::spawn_blocking(move || {
        image::ImageReader::open(&path)
            .ok()?
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()
    })
    .await
    .ok()
    .flatten()
}
