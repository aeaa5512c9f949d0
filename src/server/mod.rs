//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          HTTP Layer                             │
//! │        GET /   GET /static/...   GET /thumb/<identity>.<fmt>    │
//! │                                                                 │
//! │  ┌────────────┐  ┌────────────┐  ┌────────────┐  ┌───────────┐  │
//! │  │  dispatch  │  │  handlers  │  │  listing   │  │  assets   │  │
//! │  │ (Split,    │  │ (thumbs,   │  │  (tera)    │  │ (embedded │  │
//! │  │  DirSplit) │  │  content)  │  │            │  │  or disk) │  │
//! │  └────────────┘  └────────────┘  └────────────┘  └───────────┘  │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │  middleware (expiry,     │  │  routes (router config)     │  │
//! │  │  canonical host)         │  │                             │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod assets;
pub mod dispatch;
pub mod handlers;
pub mod listing;
pub mod middleware;
pub mod routes;

pub use assets::{StaticAssets, PAGE_TEMPLATE};
pub use dispatch::{DirSplit, Split};
pub use handlers::{
    content_handler, health_handler, listing_handler, redirect_home, thumb_handler, AppState,
    ErrorResponse, HealthResponse, THUMB_CACHE_HIT_HEADER,
};
pub use listing::{load_template, Listing, ListingService, LISTING_TEMPLATE};
pub use middleware::{CanonicalHost, ExpiresRange};
pub use routes::{create_router, RouterConfig};
