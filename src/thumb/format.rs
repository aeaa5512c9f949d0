use std::fmt;

use crate::error::ServeError;

/// Output encodings the thumbnail engine can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThumbFormat {
    Jpeg,
    Png,
}

impl ThumbFormat {
    /// Resolve a format symbol such as `jpg`, `jpeg` or `png`.
    ///
    /// Unknown symbols are rejected here, when a thumbnail is requested, not
    /// at startup.
    pub fn from_symbol(symbol: &str) -> Result<Self, ServeError> {
        match symbol.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(ThumbFormat::Jpeg),
            "png" => Ok(ThumbFormat::Png),
            _ => Err(ServeError::UnsupportedFormat {
                symbol: symbol.to_string(),
            }),
        }
    }

    /// Canonical media type, as produced by the content sniffer.
    pub const fn media_type(&self) -> &'static str {
        match self {
            ThumbFormat::Jpeg => "image/jpeg",
            ThumbFormat::Png => "image/png",
        }
    }

    pub(crate) fn image_format(&self) -> image::ImageFormat {
        match self {
            ThumbFormat::Jpeg => image::ImageFormat::Jpeg,
            ThumbFormat::Png => image::ImageFormat::Png,
        }
    }
}

impl fmt::Display for ThumbFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ThumbFormat::Jpeg => "jpeg",
            ThumbFormat::Png => "png",
        })
    }
}
