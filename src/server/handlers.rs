//! HTTP request handlers.
//!
//! # Endpoints
//!
//! - `GET /thumb/{identity}.{format}` - Serve a thumbnail
//! - `GET /{path}` - Directory listing or raw file, by directory membership
//! - `GET /health` - Health check endpoint
//!
//! Handlers take the request path from the URI rather than a route
//! parameter, since they sit behind nested services that have already
//! stripped their mount prefix.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::content::{serve_content, ContentService};
use crate::error::ServeError;
use crate::thumb::ThumbService;

use super::listing::ListingService;

/// Response header reporting whether a thumbnail came from the disk cache.
pub const THUMB_CACHE_HIT_HEADER: &str = "x-thumb-cache-hit";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Thumbnail cache engine
    pub thumbs: Arc<ThumbService>,

    /// Raw file server for the image root
    pub content: Arc<ContentService>,

    /// Listing renderer for the image root
    pub listing: Arc<ListingService>,
}

impl AppState {
    pub fn new(thumbs: ThumbService, content: ContentService, listing: ListingService) -> Self {
        Self {
            thumbs: Arc::new(thumbs),
            content: Arc::new(content),
            listing: Arc::new(listing),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "decode_error")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

impl ServeError {
    /// HTTP status and error type identifier for this error.
    pub fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            ServeError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            ServeError::Forbidden { .. } => (StatusCode::FORBIDDEN, "forbidden"),
            ServeError::Decode { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "decode_error"),
            ServeError::Processing { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "processing_error")
            }
            ServeError::UnsupportedFormat { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "unsupported_format")
            }
            ServeError::Render { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "render_error"),
            ServeError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
        }
    }
}

/// Convert ServeError to HTTP response.
///
/// - 5xx errors are logged at ERROR level
/// - 404s are logged at DEBUG level (common and expected)
/// - other 4xx errors are logged at WARN level
impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle thumbnail requests.
///
/// # Endpoint
///
/// `GET /thumb/{identity}.{format}`, seen here with the `/thumb` prefix
/// already stripped.
///
/// # Response
///
/// - `200 OK` / `206 Partial Content` / `304 Not Modified`: the thumbnail
/// - `404 Not Found`: no source image for the identity
/// - `500 Internal Server Error`: decode, geometry or encode failure
///
/// # Headers
///
/// - `Content-Type`: the configured format's media type
/// - `Last-Modified`: cache entry mtime on a hit, generation time on a miss
/// - `X-Thumb-Cache-Hit: true|false`
pub async fn thumb_handler(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, ServeError> {
    let thumb = state.thumbs.fetch(uri.path()).await?;
    let cache_hit = thumb.cache_hit;

    let mut response = serve_content(&headers, thumb.content).await?;
    response.headers_mut().insert(
        HeaderName::from_static(THUMB_CACHE_HIT_HEADER),
        HeaderValue::from_static(if cache_hit { "true" } else { "false" }),
    );

    Ok(response)
}

/// Serve a raw file with its sniffed media type.
pub async fn content_handler(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, ServeError> {
    state.content.serve(uri.path(), &headers).await
}

/// Render the listing for a known directory.
pub async fn listing_handler(
    State(state): State<AppState>,
    uri: Uri,
) -> Result<Response, ServeError> {
    state.listing.render(uri.path()).await
}

/// Permanently redirect to the site root.
pub async fn redirect_home() -> Response {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/")]).into_response()
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
