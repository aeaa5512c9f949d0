//! HTML directory listings.
//!
//! Files come from reading the directory; subdirectories come from the
//! directory tracker, so the listing and the dispatcher always agree on what
//! is a directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use http::header;
use serde::Serialize;
use tera::{Context, Tera};
use tracing::debug;

use crate::dirs::DirectorySet;
use crate::error::ServeError;
use crate::path::{decode_and_clean, encode_url_path, join_url, resolve_under};

use super::assets::PAGE_TEMPLATE;

/// Name the listing template is registered under.
pub const LISTING_TEMPLATE: &str = "page.template";

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Data handed to the listing template.
///
/// `files`, `dirs`, `entries` and `url` are percent-encoded and safe to drop
/// into links; `path` and the values of `names` are for display.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Listing {
    /// Cleaned request path
    pub path: String,

    /// `path`, encoded
    pub url: String,

    /// Visible files, as URL paths
    pub files: Vec<String>,

    /// Child directories, as URL paths
    pub dirs: Vec<String>,

    /// `dirs` followed by `files`
    pub entries: Vec<String>,

    /// Display name (last decoded segment) of every entry, by URL
    pub names: BTreeMap<String, String>,

    /// Suffix appended to a file path to form its thumbnail URL
    pub thumb_suffix: String,
}

/// Read the listing template source: `path` if given, otherwise the built-in one.
pub fn load_template(path: Option<&Path>) -> std::io::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path),
        None => Ok(PAGE_TEMPLATE.to_string()),
    }
}

/// Renders directory listings under a root.
pub struct ListingService {
    root: PathBuf,
    dirs: Arc<dyn DirectorySet>,
    tera: Tera,
    thumb_suffix: String,
}

impl ListingService {
    /// Compile `template` and bind it to `root`.
    ///
    /// Fails if the template does not parse.
    pub fn new(
        root: impl Into<PathBuf>,
        dirs: Arc<dyn DirectorySet>,
        template: &str,
        thumb_suffix: impl Into<String>,
    ) -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![LISTING_TEMPLATE]);
        tera.add_raw_template(LISTING_TEMPLATE, template)?;
        Ok(Self {
            root: root.into(),
            dirs,
            tera,
            thumb_suffix: thumb_suffix.into(),
        })
    }

    /// Collect the listing data for `request_path`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if nothing exists at the path
    /// - `Forbidden` if it is not a directory or cannot be read
    pub async fn listing(&self, request_path: &str) -> Result<Listing, ServeError> {
        let cleaned = decode_and_clean(request_path);
        let target = resolve_under(&self.root, &cleaned);

        let metadata = tokio::fs::metadata(&target)
            .await
            .map_err(|e| ServeError::from_open(&cleaned, &e))?;
        if !metadata.is_dir() {
            return Err(ServeError::forbidden(cleaned, "not a directory"));
        }

        let mut reader = tokio::fs::read_dir(&target)
            .await
            .map_err(|e| ServeError::forbidden(&cleaned, e.to_string()))?;

        let mut files = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| ServeError::forbidden(&cleaned, e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                files.push(join_url(&cleaned, &name));
            }
        }
        files.sort();

        let mut names = BTreeMap::new();
        let mut encode = |raw: String| {
            let url = encode_url_path(&raw);
            let name = raw.rsplit('/').next().unwrap_or_default().to_string();
            names.insert(url.clone(), name);
            url
        };
        let dirs: Vec<String> = self
            .dirs
            .children(&cleaned)
            .into_iter()
            .map(&mut encode)
            .collect();
        let files: Vec<String> = files.into_iter().map(&mut encode).collect();
        let entries = dirs.iter().chain(files.iter()).cloned().collect();

        Ok(Listing {
            url: encode_url_path(&cleaned),
            path: cleaned,
            files,
            dirs,
            entries,
            names,
            thumb_suffix: self.thumb_suffix.clone(),
        })
    }

    /// Render `listing` through the template.
    pub fn render_listing(&self, listing: &Listing) -> Result<String, ServeError> {
        let context = Context::from_serialize(listing).map_err(render_error)?;
        self.tera
            .render(LISTING_TEMPLATE, &context)
            .map_err(render_error)
    }

    /// Serve the listing page for `request_path`.
    pub async fn render(&self, request_path: &str) -> Result<Response, ServeError> {
        let listing = self.listing(request_path).await?;
        let html = self.render_listing(&listing)?;

        debug!(
            path = %listing.path,
            files = listing.files.len(),
            dirs = listing.dirs.len(),
            "Rendered listing"
        );

        Ok(([(header::CONTENT_TYPE, HTML_CONTENT_TYPE)], html).into_response())
    }
}

/// Flatten a tera error and its causes into one message.
fn render_error(err: tera::Error) -> ServeError {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    ServeError::Render { message }
}
