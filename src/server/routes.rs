//! Router configuration.
//!
//! # Route Structure
//!
//! ```text
//! /health                 - Health check
//! /static, /static/       - 301 to /
//! /static/{asset}         - Embedded or on-disk static assets
//! /thumb, /thumb/         - 301 to /
//! /thumb/{identity}.{fmt} - Thumbnail cache engine
//! /{path}                 - Listing if a known directory, raw file otherwise
//! ```
//!
//! `/static` and `/thumb` responses carry randomized browser cache expiry.
//! The canonical-host redirect, when configured, wraps everything. Textual
//! responses are gzipped for clients that accept it; images and partial
//! content are sent as stored.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use thumbserve::server::{create_router, AppState, RouterConfig};
//!
//! let state = AppState::new(thumbs, content, listing);
//! let router = create_router(state, Arc::new(tracker), RouterConfig::new());
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use http::{Extensions, HeaderMap, StatusCode, Version};
use tower_http::compression::predicate::{DefaultPredicate, Predicate};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use super::assets::StaticAssets;
use super::dispatch::{DirSplit, Split};
use super::handlers::{
    content_handler, health_handler, listing_handler, redirect_home, thumb_handler, AppState,
};
use super::middleware::{canonical_host, expires_range, CanonicalHost, ExpiresRange};
use crate::dirs::DirectorySet;

/// Default minimum browser cache lifetime, in days.
pub const DEFAULT_CACHE_MIN_DAYS: u64 = 30;

/// Default spread added on top of the minimum, in days.
pub const DEFAULT_CACHE_VARIATION_DAYS: u64 = 7;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Browser cache lifetime range for static assets and thumbnails
    /// (None = no expiry headers)
    pub expires: Option<ExpiresRange>,

    /// Origin to redirect foreign hosts to (None = accept any host)
    pub canonical_host: Option<CanonicalHost>,

    /// Source of `/static` assets
    pub static_assets: StaticAssets,

    /// Whether to gzip textual responses
    pub enable_compression: bool,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a new router configuration.
    ///
    /// By default:
    /// - Expiry is drawn from 30 to 37 days
    /// - Any host is accepted
    /// - Static assets are the embedded set
    /// - Compression is enabled
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            expires: Some(ExpiresRange::from_days(
                DEFAULT_CACHE_MIN_DAYS,
                DEFAULT_CACHE_VARIATION_DAYS,
            )),
            canonical_host: None,
            static_assets: StaticAssets::embedded(),
            enable_compression: true,
            enable_tracing: true,
        }
    }

    /// Set the browser cache lifetime range in days.
    pub fn with_expires_days(mut self, min_days: u64, variation_days: u64) -> Self {
        self.expires = Some(ExpiresRange::from_days(min_days, variation_days));
        self
    }

    /// Disable expiry headers.
    pub fn without_expires(mut self) -> Self {
        self.expires = None;
        self
    }

    /// Redirect requests for other hosts to `canonical`.
    pub fn with_canonical_host(mut self, canonical: CanonicalHost) -> Self {
        self.canonical_host = Some(canonical);
        self
    }

    /// Set where static assets come from.
    pub fn with_static_assets(mut self, assets: StaticAssets) -> Self {
        self.static_assets = assets;
        self
    }

    /// Enable or disable response compression.
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// # Arguments
///
/// * `state` - Shared services for the handlers
/// * `dirs` - Directory set consulted by the root dispatcher
/// * `config` - Router configuration
pub fn create_router(state: AppState, dirs: Arc<dyn DirectorySet>, config: RouterConfig) -> Router {
    let redirect: Router = Router::new().fallback(redirect_home);

    let thumbs: Router = Router::new()
        .fallback(thumb_handler)
        .with_state(state.clone());
    let listing: Router = Router::new()
        .fallback(listing_handler)
        .with_state(state.clone());
    let content: Router = Router::new()
        .fallback(content_handler)
        .with_state(state);
    let assets = config.static_assets.into_router();

    let mut cached: Router = Router::new()
        .nest_service("/static", Split::new(redirect.clone(), assets))
        .nest_service("/thumb", Split::new(redirect, thumbs));
    if let Some(range) = config.expires {
        cached = cached.layer(middleware::from_fn_with_state(range, expires_range));
    }

    let mut router: Router = Router::new()
        .route("/health", get(health_handler))
        .merge(cached)
        .fallback_service(DirSplit::new(dirs, listing, content));

    if config.enable_compression {
        let predicate = DefaultPredicate::new().and(not_partial_content);
        router = router.layer(CompressionLayer::new().compress_when(predicate));
    }

    if let Some(canonical) = config.canonical_host {
        router = router.layer(middleware::from_fn_with_state(canonical, canonical_host));
    }

    // Add tracing if enabled
    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Byte ranges address the stored representation; never re-encode them.
fn not_partial_content(
    status: StatusCode,
    _version: Version,
    _headers: &HeaderMap,
    _extensions: &Extensions,
) -> bool {
    status != StatusCode::PARTIAL_CONTENT
}

// =============================================================================
// Tests
// =============================================================================
