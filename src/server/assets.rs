//! Static assets for the listing page.
//!
//! The page template, script and stylesheet are compiled into the binary.
//! `--static` swaps them for a directory on disk. Either way, template
//! sources are never served.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use tower_http::services::ServeDir;

use crate::content::{serve_content, Content};
use crate::error::ServeError;
use crate::path::decode_and_clean;

/// Built-in listing template.
pub const PAGE_TEMPLATE: &str = include_str!("../../static/page.template");

const PAGE_JS: &str = include_str!("../../static/page.js");
const PAGE_CSS: &str = include_str!("../../static/page.css");

/// Name, body and media type of every embedded asset.
const EMBEDDED: &[(&str, &str, &str)] = &[
    ("page.template", PAGE_TEMPLATE, "text/html; charset=utf-8"),
    ("page.js", PAGE_JS, "text/javascript; charset=utf-8"),
    ("page.css", PAGE_CSS, "text/css; charset=utf-8"),
];

/// Suffix of files that are templates, not assets.
const TEMPLATE_SUFFIX: &str = ".template";

/// Where static assets come from.
#[derive(Debug, Clone)]
pub enum StaticAssets {
    /// The set compiled into the binary, stamped with the time it was loaded
    Embedded { loaded_at: SystemTime },
    /// A directory on disk
    Directory(PathBuf),
}

impl StaticAssets {
    pub fn embedded() -> Self {
        StaticAssets::Embedded {
            loaded_at: SystemTime::now(),
        }
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        StaticAssets::Directory(path.into())
    }

    /// Router serving these assets from its own root.
    pub fn into_router(self) -> Router {
        let router: Router = match self {
            StaticAssets::Embedded { loaded_at } => Router::new()
                .fallback(embedded_asset)
                .with_state(Arc::new(loaded_at)),
            StaticAssets::Directory(path) => Router::new().fallback_service(ServeDir::new(path)),
        };
        router.layer(middleware::from_fn(refuse_templates))
    }
}

/// Look up an embedded asset by name.
pub fn embedded(name: &str) -> Option<(&'static str, &'static str)> {
    EMBEDDED
        .iter()
        .find(|(asset, _, _)| *asset == name)
        .map(|(_, body, media_type)| (*body, *media_type))
}

async fn embedded_asset(
    State(loaded_at): State<Arc<SystemTime>>,
    headers: HeaderMap,
    req: Request,
) -> Result<Response, ServeError> {
    let cleaned = decode_and_clean(req.uri().path());
    let name = cleaned.trim_start_matches('/');

    let (body, media_type) = embedded(name).ok_or_else(|| ServeError::not_found(&cleaned))?;
    serve_content(
        &headers,
        Content::from_bytes(Bytes::from_static(body.as_bytes()), media_type, *loaded_at),
    )
    .await
}

async fn refuse_templates(req: Request, next: Next) -> Response {
    let cleaned = decode_and_clean(req.uri().path());
    if cleaned.ends_with(TEMPLATE_SUFFIX) {
        return ServeError::forbidden(cleaned, "templates are not served").into_response();
    }
    next.run(req).await
}
