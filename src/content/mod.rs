//! Raw file serving with content sniffing.
//!
//! - [`sniff`]: media type detection from a byte prefix
//! - [`serve`]: conditional and ranged response building
//! - [`ContentService`]: serves any file under a root with its sniffed type

pub mod serve;
pub mod sniff;

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use axum::http::HeaderMap;
use axum::response::Response;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use crate::error::ServeError;
use crate::path::{decode_and_clean, resolve_under};

pub use serve::{parse_range, serve_content, ByteRange, Content, ContentBody};
pub use sniff::{detect_content_type, OCTET_STREAM, SNIFF_LEN, TEXT_PLAIN};

/// Read the sniffing prefix of `file` and rewind it to the start.
pub async fn sniff_file(file: &mut File) -> std::io::Result<&'static str> {
    let mut prefix = Vec::with_capacity(SNIFF_LEN);
    (&mut *file)
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut prefix)
        .await?;
    file.seek(SeekFrom::Start(0)).await?;
    Ok(detect_content_type(&prefix))
}

/// Serves files beneath a root directory, typed by their content.
#[derive(Debug, Clone)]
pub struct ContentService {
    root: PathBuf,
}

impl ContentService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Serve the file at `request_path` (relative to the root).
    ///
    /// # Errors
    ///
    /// - `NotFound` if the file cannot be opened
    /// - `Forbidden` if the target is not a regular file or unreadable
    /// - `Io` if stat, read or seek fail after opening
    pub async fn serve(
        &self,
        request_path: &str,
        headers: &HeaderMap,
    ) -> Result<Response, ServeError> {
        let cleaned = decode_and_clean(request_path);
        let target = resolve_under(&self.root, &cleaned);

        let mut file = File::open(&target)
            .await
            .map_err(|e| ServeError::from_open(&cleaned, &e))?;

        let metadata = file
            .metadata()
            .await
            .map_err(|e| ServeError::Io(format!("cannot stat {}: {}", cleaned, e)))?;
        if !metadata.is_file() {
            return Err(ServeError::forbidden(cleaned, "not a regular file"));
        }

        let content_type = sniff_file(&mut file)
            .await
            .map_err(|e| ServeError::Io(format!("cannot read {}: {}", cleaned, e)))?;
        let modified = metadata
            .modified()
            .map_err(|e| ServeError::Io(format!("cannot stat {}: {}", cleaned, e)))?;

        debug!(path = %cleaned, content_type, "Serving raw file");

        serve_content(
            headers,
            Content::from_file(file, metadata.len(), content_type, modified),
        )
        .await
    }
}
