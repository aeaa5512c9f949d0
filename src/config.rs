//! Configuration management for thumbserve.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `THUMBSERVE_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use thumbserve::config::Config;
//!
//! let config = Config::parse();
//! config.validate()?;
//! println!("Listening on {}", config.bind_address());
//! ```
//!
//! # Environment Variables
//!
//! - `THUMBSERVE_HOST` - Server bind address (default: 0.0.0.0)
//! - `THUMBSERVE_PORT` - Server port (default: 3000)
//! - `THUMBSERVE_IMAGES` - Directory of images to serve (default: ./)
//! - `THUMBSERVE_THUMBS` - Thumbnail cache directory (default: thumbs)
//! - `THUMBSERVE_WIDTH` / `THUMBSERVE_HEIGHT` - Thumbnail geometry (default: 310x200)
//! - `THUMBSERVE_FORMAT` - Thumbnail format symbol (default: jpg)
//! - `THUMBSERVE_JPEG_QUALITY` - JPEG quality (default: 90)
//! - `THUMBSERVE_STATIC` - Alternate static asset directory
//! - `THUMBSERVE_TEMPLATE` - Alternate listing template
//! - `THUMBSERVE_CACHE_MIN` / `THUMBSERVE_CACHE_VARIATION` - Browser cache days (default: 30 / 7)
//! - `THUMBSERVE_FORCE_HOST` / `THUMBSERVE_FORCE_PORT` / `THUMBSERVE_FORCE_SCHEME` - Canonical origin

use std::path::PathBuf;

use clap::Parser;

use crate::server::{CanonicalHost, RouterConfig, StaticAssets};
use crate::server::routes::{DEFAULT_CACHE_MIN_DAYS, DEFAULT_CACHE_VARIATION_DAYS};
use crate::thumb::{
    ThumbSettings, DEFAULT_JPEG_QUALITY, DEFAULT_THUMB_FORMAT, DEFAULT_THUMB_HEIGHT,
    DEFAULT_THUMB_WIDTH,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default raw image directory.
pub const DEFAULT_IMAGES_DIR: &str = "./";

/// Default thumbnail cache directory.
pub const DEFAULT_THUMBS_DIR: &str = "thumbs";

// =============================================================================
// CLI Arguments
// =============================================================================

/// thumbserve - An image gallery server with an on-disk thumbnail cache.
///
/// Serves a directory of images with HTML listings, content-sniffed raw
/// files and thumbnails generated on first request.
#[derive(Parser, Debug, Clone)]
#[command(name = "thumbserve")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "THUMBSERVE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "THUMBSERVE_PORT")]
    pub port: u16,

    // =========================================================================
    // Content Configuration
    // =========================================================================
    /// Directory of images to serve.
    #[arg(short, long, default_value = DEFAULT_IMAGES_DIR, env = "THUMBSERVE_IMAGES")]
    pub images: PathBuf,

    /// Directory thumbnails are cached in.
    #[arg(long, default_value = DEFAULT_THUMBS_DIR, env = "THUMBSERVE_THUMBS")]
    pub thumbs: PathBuf,

    /// Alternate static directory to serve under /static.
    #[arg(short = 's', long = "static", env = "THUMBSERVE_STATIC")]
    pub static_dir: Option<PathBuf>,

    /// Alternate listing template.
    #[arg(short, long, env = "THUMBSERVE_TEMPLATE")]
    pub template: Option<PathBuf>,

    // =========================================================================
    // Thumbnail Configuration
    // =========================================================================
    /// Thumbnail width in pixels.
    #[arg(long, default_value_t = DEFAULT_THUMB_WIDTH, env = "THUMBSERVE_WIDTH")]
    pub width: u32,

    /// Thumbnail height in pixels.
    #[arg(long, default_value_t = DEFAULT_THUMB_HEIGHT, env = "THUMBSERVE_HEIGHT")]
    pub height: u32,

    /// Thumbnail format symbol, also the cache file suffix (jpg, jpeg or png).
    #[arg(long, default_value = DEFAULT_THUMB_FORMAT, env = "THUMBSERVE_FORMAT")]
    pub format: String,

    /// JPEG quality for thumbnails (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "THUMBSERVE_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// Regenerate thumbnails whose source image is newer than the cached file.
    #[arg(long, default_value_t = false, env = "THUMBSERVE_REVALIDATE_THUMBS")]
    pub revalidate_thumbs: bool,

    // =========================================================================
    // Browser Cache Configuration
    // =========================================================================
    /// Minimum days browsers may cache static assets and thumbnails.
    #[arg(long, default_value_t = DEFAULT_CACHE_MIN_DAYS, env = "THUMBSERVE_CACHE_MIN")]
    pub cache_min: u64,

    /// Extra days, drawn at random per response, added to the minimum.
    #[arg(long, default_value_t = DEFAULT_CACHE_VARIATION_DAYS, env = "THUMBSERVE_CACHE_VARIATION")]
    pub cache_variation: u64,

    // =========================================================================
    // Canonical Host Configuration
    // =========================================================================
    /// Redirect requests for any other host to this one.
    #[arg(long, env = "THUMBSERVE_FORCE_HOST")]
    pub force_host: Option<String>,

    /// Port of the canonical origin (requires --force-host).
    #[arg(long, env = "THUMBSERVE_FORCE_PORT")]
    pub force_port: Option<u16>,

    /// Scheme of the canonical origin.
    #[arg(long, env = "THUMBSERVE_FORCE_SCHEME", value_parser = ["http", "https"])]
    pub force_scheme: Option<String>,

    /// Send textual responses uncompressed even when clients accept gzip.
    #[arg(long, default_value_t = false, env = "THUMBSERVE_NO_COMPRESSION")]
    pub no_compression: bool,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    ///
    /// The thumbnail format is not checked here; an unknown symbol fails
    /// each thumbnail request instead.
    pub fn validate(&self) -> Result<(), String> {
        if !self.images.is_dir() {
            return Err(format!(
                "Image directory {} does not exist or is not a directory",
                self.images.display()
            ));
        }

        // Validate thumbnail geometry
        if self.width == 0 || self.height == 0 {
            return Err("width and height must be greater than 0".to_string());
        }

        // Validate JPEG quality
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        if self.format.is_empty() {
            return Err("format must not be empty".to_string());
        }

        if self.force_port.is_some() && self.force_host.is_none() {
            return Err("--force-port requires --force-host".to_string());
        }

        if let Some(template) = &self.template {
            if !template.is_file() {
                return Err(format!("Template {} does not exist", template.display()));
            }
        }
        if let Some(static_dir) = &self.static_dir {
            if !static_dir.is_dir() {
                return Err(format!(
                    "Static directory {} does not exist",
                    static_dir.display()
                ));
            }
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Settings for the thumbnail engine.
    pub fn thumb_settings(&self) -> ThumbSettings {
        ThumbSettings::new(&self.images, &self.thumbs)
            .with_dimensions(self.width, self.height)
            .with_format(self.format.clone())
            .with_jpeg_quality(self.jpeg_quality)
            .with_revalidate(self.revalidate_thumbs)
    }

    /// Canonical origin, if one is forced.
    pub fn canonical_host(&self) -> Option<CanonicalHost> {
        self.force_host.as_ref().map(|host| {
            CanonicalHost::new(host.clone())
                .with_port(self.force_port)
                .with_scheme(self.force_scheme.clone())
        })
    }

    /// Router configuration derived from these settings.
    pub fn router_config(&self) -> RouterConfig {
        let assets = match &self.static_dir {
            Some(dir) => StaticAssets::directory(dir.clone()),
            None => StaticAssets::embedded(),
        };

        let mut config = RouterConfig::new()
            .with_expires_days(self.cache_min, self.cache_variation)
            .with_static_assets(assets)
            .with_compression(!self.no_compression)
            .with_tracing(!self.no_tracing);
        if let Some(canonical) = self.canonical_host() {
            config = config.with_canonical_host(canonical);
        }
        config
    }
}

// =============================================================================
// Tests
// =============================================================================
