//! Thumbnail service orchestrating cache lookups and generation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          ThumbService                            │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │                         fetch()                            │  │
//! │  │  1. Strip suffix, clean path   4. Resolve + decode source  │  │
//! │  │  2. Open cache entry           5. Resize, crop, encode     │  │
//! │  │  3. Hit? serve from disk       6. Persist & serve bytes    │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! │           │                     │                     │          │
//! │           ▼                     ▼                     ▼          │
//! │    ┌────────────┐      ┌────────────────┐    ┌───────────────┐   │
//! │    │ ThumbStore │      │  in-flight map │    │ ThumbEncoder  │   │
//! │    └────────────┘      └────────────────┘    └───────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Concurrent misses for the same [`ThumbSpec`] share one generation. The
//! generation runs as its own task, so a caller that goes away does not
//! abort work that later requests would otherwise repeat.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use bytes::Bytes;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info};

use crate::content::Content;
use crate::error::ServeError;
use crate::path::{decode_and_clean, ImageIdentity};

use super::format::ThumbFormat;
use super::pipeline::{ThumbEncoder, DEFAULT_JPEG_QUALITY};
use super::store::ThumbStore;

// =============================================================================
// Settings
// =============================================================================

/// Default thumbnail width in pixels.
pub const DEFAULT_THUMB_WIDTH: u32 = 310;

/// Default thumbnail height in pixels.
pub const DEFAULT_THUMB_HEIGHT: u32 = 200;

/// Default thumbnail format symbol.
pub const DEFAULT_THUMB_FORMAT: &str = "jpg";

/// Everything the thumbnail engine needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct ThumbSettings {
    /// Directory holding the source images
    pub raw_root: PathBuf,

    /// Directory holding generated thumbnails
    pub cache_root: PathBuf,

    /// Target width in pixels
    pub width: u32,

    /// Target height in pixels
    pub height: u32,

    /// Output format symbol, also the cache entry suffix (e.g. "jpg")
    pub format: String,

    /// JPEG quality (1-100)
    pub jpeg_quality: u8,

    /// Treat entries older than their source as misses
    pub revalidate: bool,
}

impl ThumbSettings {
    /// Settings with default geometry and format.
    pub fn new(raw_root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            raw_root: raw_root.into(),
            cache_root: cache_root.into(),
            width: DEFAULT_THUMB_WIDTH,
            height: DEFAULT_THUMB_HEIGHT,
            format: DEFAULT_THUMB_FORMAT.to_string(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            revalidate: false,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    pub fn with_revalidate(mut self, revalidate: bool) -> Self {
        self.revalidate = revalidate;
        self
    }
}

// =============================================================================
// Thumb Spec / Response
// =============================================================================

/// Key identifying one cacheable derived image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThumbSpec {
    pub identity: ImageIdentity,
    pub width: u32,
    pub height: u32,
    pub format: ThumbFormat,
}

/// A thumbnail ready to be served.
#[derive(Debug)]
pub struct Thumbnail {
    /// Body, media type and modification time
    pub content: Content,

    /// Whether the bytes came from an existing cache entry
    pub cache_hit: bool,
}

/// Output of one generation, shared with every waiter.
#[derive(Debug, Clone)]
struct Generated {
    data: Bytes,
    generated_at: SystemTime,
}

type GenerationResult = Result<Generated, ServeError>;
type InFlight = Arc<Mutex<HashMap<ThumbSpec, watch::Receiver<Option<GenerationResult>>>>>;

// =============================================================================
// Thumb Service
// =============================================================================

/// Serves thumbnails from the disk cache, generating them on first access.
///
/// # Example
///
/// ```ignore
/// use thumbserve::thumb::{ThumbService, ThumbSettings};
///
/// let service = ThumbService::new(ThumbSettings::new("./images", "./thumbs"));
/// let thumb = service.fetch("/cats/tabby.png.jpg").await?;
/// println!("cache hit: {}", thumb.cache_hit);
/// ```
pub struct ThumbService {
    settings: ThumbSettings,
    store: ThumbStore,
    encoder: ThumbEncoder,
    in_flight: InFlight,
    generations: Arc<AtomicUsize>,
}

impl ThumbService {
    pub fn new(settings: ThumbSettings) -> Self {
        let store = ThumbStore::new(settings.cache_root.clone(), settings.format.clone())
            .with_dimensions(settings.width, settings.height);
        let encoder = ThumbEncoder::new(settings.width, settings.height)
            .with_jpeg_quality(settings.jpeg_quality);
        Self {
            settings,
            store,
            encoder,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            generations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn settings(&self) -> &ThumbSettings {
        &self.settings
    }

    pub fn store(&self) -> &ThumbStore {
        &self.store
    }

    /// Number of generations started since creation.
    pub fn generation_count(&self) -> usize {
        self.generations.load(Ordering::SeqCst)
    }

    /// Recover the image identity from a request path such as
    /// `/cats/tabby.png.jpg`.
    pub fn identity_for(&self, request_path: &str) -> Result<ImageIdentity, ServeError> {
        let cleaned = decode_and_clean(request_path);
        let suffix = format!(".{}", self.settings.format);
        let stripped = cleaned.strip_suffix(&suffix).unwrap_or(&cleaned);
        ImageIdentity::parse(stripped)
    }

    /// Get the thumbnail for `request_path`, using the cache when possible.
    ///
    /// # Errors
    ///
    /// - `UnsupportedFormat` if the configured format cannot be encoded
    /// - `NotFound` if the identity has no source image
    /// - `Decode` if the source is not a recognized raster
    /// - `Processing` if the geometry cannot be satisfied or encoding fails
    pub async fn fetch(&self, request_path: &str) -> Result<Thumbnail, ServeError> {
        let format = ThumbFormat::from_symbol(&self.settings.format)?;
        let identity = self.identity_for(request_path)?;

        let source_modified = if self.settings.revalidate {
            source_modified(&self.settings.raw_root, &identity).await
        } else {
            None
        };

        if let Some(entry) = self.store.open(&identity, format, source_modified).await {
            debug!(identity = %identity, "Thumbnail cache hit");
            return Ok(Thumbnail {
                content: Content::from_file(
                    entry.file,
                    entry.len,
                    format.media_type(),
                    entry.modified,
                ),
                cache_hit: true,
            });
        }

        let spec = ThumbSpec {
            identity,
            width: self.settings.width,
            height: self.settings.height,
            format,
        };
        let generated = self.generate_shared(spec).await?;

        Ok(Thumbnail {
            content: Content::from_bytes(
                generated.data,
                format.media_type(),
                generated.generated_at,
            ),
            cache_hit: false,
        })
    }

    /// Join the in-flight generation for `spec`, starting one if needed.
    async fn generate_shared(&self, spec: ThumbSpec) -> GenerationResult {
        let mut receiver = {
            let mut in_flight = self.in_flight.lock().await;

            if let Some(receiver) = in_flight.get(&spec) {
                debug!(identity = %spec.identity, "Joining in-flight thumbnail generation");
                receiver.clone()
            } else {
                let (sender, receiver) = watch::channel(None);
                in_flight.insert(spec.clone(), receiver.clone());

                let job = GenerationJob {
                    raw_root: self.settings.raw_root.clone(),
                    store: self.store.clone(),
                    encoder: self.encoder,
                    spec,
                };
                let in_flight = Arc::clone(&self.in_flight);
                self.generations.fetch_add(1, Ordering::SeqCst);

                tokio::spawn(async move {
                    let spec = job.spec.clone();
                    let result = job.run().await;
                    // publish before unregistering so late joiners see the result
                    sender.send_replace(Some(result));
                    in_flight.lock().await.remove(&spec);
                });

                receiver
            }
        };

        let outcome = receiver
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ServeError::processing("thumbnail generation was aborted"))?
            .clone();

        outcome.unwrap_or_else(|| Err(ServeError::processing("thumbnail generation was aborted")))
    }
}

// =============================================================================
// Generation
// =============================================================================

/// One detached generation: resolve, decode, resize, crop, encode, persist.
struct GenerationJob {
    raw_root: PathBuf,
    store: ThumbStore,
    encoder: ThumbEncoder,
    spec: ThumbSpec,
}

impl GenerationJob {
    async fn run(self) -> GenerationResult {
        let started = Instant::now();
        let source = resolve_source(&self.raw_root, &self.spec.identity).await?;

        let GenerationJob {
            store,
            encoder,
            spec,
            ..
        } = self;

        tokio::task::spawn_blocking(move || {
            let name = spec.identity.as_str();
            let bytes = std::fs::read(&source).map_err(|e| ServeError::from_open(name, &e))?;
            let data = encoder.generate(&bytes, name, spec.format)?;

            // a failed write still serves the bytes we just made
            match store.persist(&spec.identity, &data) {
                Ok(path) => debug!(path = %path.display(), "Persisted thumbnail"),
                Err(e) => error!(identity = %spec.identity, "Failed to cache thumbnail: {}", e),
            }

            info!(
                identity = %spec.identity,
                format = %spec.format,
                bytes = data.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Generated thumbnail"
            );

            Ok(Generated {
                data,
                generated_at: SystemTime::now(),
            })
        })
        .await
        .map_err(|e| ServeError::processing(format!("thumbnail task failed: {}", e)))?
    }
}

/// Find the source file for `identity`.
///
/// The exact path wins. Failing that, a regular file in the same directory
/// whose stem equals the identity's last segment is used, so a request for
/// `cats/tabby` (from `/thumb/cats/tabby.jpg`) finds `cats/tabby.png`.
pub async fn resolve_source(raw_root: &Path, identity: &ImageIdentity) -> Result<PathBuf, ServeError> {
    let direct = identity.under(raw_root);
    if let Ok(metadata) = tokio::fs::metadata(&direct).await {
        if metadata.is_file() {
            return Ok(direct);
        }
    }

    let parent = raw_root.join(identity.parent());
    let mut entries = match tokio::fs::read_dir(&parent).await {
        Ok(entries) => entries,
        Err(_) => return Err(ServeError::not_found(identity.as_str())),
    };

    let mut candidates = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let stem_matches = path
            .file_stem()
            .map(|stem| stem == identity.file_name())
            .unwrap_or(false);
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if stem_matches && is_file {
            candidates.push(path);
        }
    }

    candidates.sort();
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| ServeError::not_found(identity.as_str()))
}

async fn source_modified(raw_root: &Path, identity: &ImageIdentity) -> Option<SystemTime> {
    let source = resolve_source(raw_root, identity).await.ok()?;
    tokio::fs::metadata(source).await.ok()?.modified().ok()
}

// =============================================================================
// Tests
// =============================================================================
