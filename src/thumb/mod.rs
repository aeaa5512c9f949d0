//! Thumbnail engine.
//!
//! Derives fixed-size thumbnails from source images and keeps them in an
//! on-disk cache that mirrors the raw image tree.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              ThumbService               │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  ThumbStore  │  │  ThumbEncoder   │  │
//! │  │  (disk       │  │  (decode →      │  │
//! │  │   entries)   │  │   crop → encode)│  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            Raw image directory          │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`ThumbService`]: entry point, cache lookup plus single-flight generation
//! - [`ThumbStore`]: deterministic entry paths and atomic writes
//! - [`ThumbEncoder`]: cover-scale, center-crop and encode
//! - [`ThumbFormat`]: output encodings and their media types
//! - [`ThumbSpec`]: key identifying one cacheable thumbnail

mod format;
mod pipeline;
mod service;
mod store;

pub use format::ThumbFormat;
pub use pipeline::{
    clamp_quality, decode, ThumbEncoder, DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY, MAX_SCALED_EDGE,
    MIN_JPEG_QUALITY,
};
pub use service::{
    resolve_source, ThumbService, ThumbSettings, ThumbSpec, Thumbnail, DEFAULT_THUMB_FORMAT,
    DEFAULT_THUMB_HEIGHT, DEFAULT_THUMB_WIDTH,
};
pub use store::{CachedEntry, ThumbStore};
