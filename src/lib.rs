//! # thumbserve
//!
//! An image gallery server: directory listings, raw files typed by their
//! content, and thumbnails generated on first request and kept on disk.
//!
//! ## Features
//!
//! - **Content sniffing**: raw files are served with the media type their
//!   bytes declare, whatever their name says
//! - **Thumbnail cache**: fixed-size, center-cropped thumbnails persisted
//!   in a tree mirroring the image directory, written atomically
//! - **Single-flight generation**: concurrent misses for one thumbnail share
//!   one decode/resize/encode
//! - **Live listings**: a filesystem watcher keeps the set of directories
//!   current for routing and templated listings
//! - **HTTP semantics**: conditional requests and byte ranges everywhere
//!   content is served
//!
//! ## Architecture
//!
//! - [`path`] - Request path cleaning and image identities
//! - [`content`] - Content sniffing and conditional/ranged delivery
//! - [`dirs`] - Directory membership tracking
//! - [`thumb`] - Thumbnail pipeline, disk cache and service
//! - [`server`] - Axum-based HTTP server, dispatch and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use thumbserve::{
//!     create_router, AppState, ContentService, DirectoryTracker, ListingService, RouterConfig,
//!     ThumbService, ThumbSettings, PAGE_TEMPLATE,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let tracker = Arc::new(DirectoryTracker::watch("./images").unwrap());
//!     let listing = ListingService::new("./images", tracker.clone(), PAGE_TEMPLATE, "jpg").unwrap();
//!     let state = AppState::new(
//!         ThumbService::new(ThumbSettings::new("./images", "./thumbs")),
//!         ContentService::new("./images"),
//!         listing,
//!     );
//!     let router = create_router(state, tracker, RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod config;
pub mod content;
pub mod dirs;
pub mod error;
pub mod path;
pub mod server;
pub mod thumb;

// Re-export commonly used types
pub use config::Config;
pub use content::{detect_content_type, serve_content, Content, ContentBody, ContentService};
pub use dirs::{DirectorySet, DirectoryTracker};
pub use error::{ServeError, TrackerError};
pub use path::{clean_path, ImageIdentity};
pub use server::{
    create_router, AppState, CanonicalHost, DirSplit, ErrorResponse, ExpiresRange,
    HealthResponse, ListingService, RouterConfig, Split, StaticAssets, PAGE_TEMPLATE,
};
pub use thumb::{ThumbEncoder, ThumbFormat, ThumbService, ThumbSettings, ThumbSpec, Thumbnail};
