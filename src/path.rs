//! Request path normalization.
//!
//! Every component that maps a URL onto the filesystem goes through
//! [`clean_path`] first, so `..` can never climb above the configured root and
//! two spellings of the same path always resolve to the same file.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ServeError;

/// Lexically clean a URL path into its rooted canonical form.
///
/// Empty and `.` segments are dropped, `..` removes the previous segment
/// (and is ignored at the root), and the result always starts with `/` and
/// never ends with one unless it is the root itself.
///
/// ```
/// use thumbserve::path::clean_path;
///
/// assert_eq!(clean_path(""), "/");
/// assert_eq!(clean_path("a//b/./c/"), "/a/b/c");
/// assert_eq!(clean_path("/../../etc/passwd"), "/etc/passwd");
/// ```
pub fn clean_path(raw: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Percent-decode a request path, then clean it.
///
/// Paths that are not valid UTF-8 after decoding are cleaned as received.
pub fn decode_and_clean(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(decoded) => clean_path(&decoded),
        Err(_) => clean_path(raw),
    }
}

/// Join a cleaned URL path onto a filesystem root.
pub fn resolve_under(root: &Path, cleaned: &str) -> PathBuf {
    let relative = cleaned.trim_start_matches('/');
    if relative.is_empty() {
        root.to_path_buf()
    } else {
        root.join(relative)
    }
}

/// Join a child name onto a URL path.
pub fn join_url(parent: &str, name: &str) -> String {
    clean_path(&format!("{}/{}", parent, name))
}

/// Percent-encode every segment of a cleaned path for use in a link.
///
/// The inverse of [`decode_and_clean`]: names holding `#`, `?`, `%` or
/// spaces come back as the same path when requested.
pub fn encode_url_path(cleaned: &str) -> String {
    let segments: Vec<_> = cleaned
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment))
        .collect();
    format!("/{}", segments.join("/"))
}

// =============================================================================
// Image Identity
// =============================================================================

/// Normalized relative path naming a source image under the raw-image root.
///
/// Built only through [`ImageIdentity::parse`], so two raw strings that clean
/// to the same path compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageIdentity(String);

impl ImageIdentity {
    /// Clean `raw` into an identity. The root itself names no image.
    pub fn parse(raw: &str) -> Result<Self, ServeError> {
        let cleaned = clean_path(raw);
        let relative = cleaned.trim_start_matches('/');
        if relative.is_empty() {
            return Err(ServeError::not_found(raw));
        }
        Ok(Self(relative.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path segment (the file name).
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Parent directory segments, empty at the top level.
    pub fn parent(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }

    /// Location of this identity under `root`.
    pub fn under(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }
}

impl fmt::Display for ImageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
