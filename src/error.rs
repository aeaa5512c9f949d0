use thiserror::Error;

/// Errors raised while serving files, listings and thumbnails.
///
/// Every variant maps onto exactly one HTTP status; see the `IntoResponse`
/// implementation in [`crate::server::handlers`].
#[derive(Debug, Clone, Error)]
pub enum ServeError {
    /// The requested file, directory or thumbnail source does not exist (404)
    #[error("Not found: {path}")]
    NotFound { path: String },

    /// The target exists but may not be served (403)
    #[error("Forbidden: {path} ({reason})")]
    Forbidden { path: String, reason: String },

    /// Source bytes are not a recognized raster format (500)
    #[error("Failed to decode {path}: {message}")]
    Decode { path: String, message: String },

    /// Resize/crop geometry violation, encode failure or cache write failure (500)
    #[error("Processing error: {message}")]
    Processing { message: String },

    /// The configured thumbnail format has no encoder (500)
    #[error("Unsupported thumbnail format: {symbol}")]
    UnsupportedFormat { symbol: String },

    /// Listing template execution failed (500)
    #[error("Render error: {message}")]
    Render { message: String },

    /// Any other filesystem failure (500)
    #[error("I/O error: {0}")]
    Io(String),
}

impl ServeError {
    pub(crate) fn not_found(path: impl Into<String>) -> Self {
        ServeError::NotFound { path: path.into() }
    }

    pub(crate) fn forbidden(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ServeError::Forbidden {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn processing(message: impl Into<String>) -> Self {
        ServeError::Processing {
            message: message.into(),
        }
    }

    /// Classify an error from opening `path`.
    ///
    /// Missing files become `NotFound`, permission problems become
    /// `Forbidden`, everything else is an opaque I/O failure.
    pub(crate) fn from_open(path: &str, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ServeError::not_found(path),
            std::io::ErrorKind::PermissionDenied => ServeError::forbidden(path, err.to_string()),
            _ => ServeError::Io(format!("{}: {}", path, err)),
        }
    }
}

/// Errors raised while starting the directory tracker.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The watched root is missing or not a directory
    #[error("Cannot watch {path}: not a directory")]
    NotADirectory { path: String },

    /// The platform watcher could not be created or attached
    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),
}
