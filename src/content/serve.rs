//! Conditional and ranged content delivery.
//!
//! [`serve_content`] turns a body, an explicit media type and a modification
//! time into a response that honors the standard validators
//! (`If-Match`, `If-Unmodified-Since`, `If-None-Match`, `If-Modified-Since`)
//! and single byte ranges (`Range`, `If-Range`).
//!
//! The media type is always supplied by the caller; nothing here looks at a
//! file name.

use std::io::SeekFrom;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::error::ServeError;

// =============================================================================
// Content
// =============================================================================

/// Where the bytes of a response come from.
#[derive(Debug)]
pub enum ContentBody {
    /// Bytes already in memory (freshly generated thumbnails).
    Bytes(Bytes),
    /// An open file, streamed from disk.
    File(File),
}

/// Everything needed to answer a content request.
#[derive(Debug)]
pub struct Content {
    pub body: ContentBody,
    pub len: u64,
    pub content_type: String,
    pub last_modified: SystemTime,
}

impl Content {
    /// In-memory content.
    pub fn from_bytes(
        data: Bytes,
        content_type: impl Into<String>,
        last_modified: SystemTime,
    ) -> Self {
        Self {
            len: data.len() as u64,
            body: ContentBody::Bytes(data),
            content_type: content_type.into(),
            last_modified,
        }
    }

    /// Content streamed from an open file positioned anywhere.
    pub fn from_file(
        file: File,
        len: u64,
        content_type: impl Into<String>,
        last_modified: SystemTime,
    ) -> Self {
        Self {
            body: ContentBody::File(file),
            len,
            content_type: content_type.into(),
            last_modified,
        }
    }

    /// Weak validator derived from length and modification second.
    pub fn etag(&self) -> String {
        format!("W/\"{:x}-{:x}\"", self.len, unix_seconds(self.last_modified))
    }
}

// =============================================================================
// Byte Ranges
// =============================================================================

/// Outcome of interpreting a `Range` header against a representation length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// Serve the whole representation.
    Full,
    /// Serve bytes `start..=end`.
    Partial { start: u64, end: u64 },
    /// No requested range overlaps the representation.
    Unsatisfiable,
}

/// Parse a `Range` header value for a representation of `len` bytes.
///
/// Malformed headers and multi-range requests fall back to [`ByteRange::Full`].
pub fn parse_range(value: &str, len: u64) -> ByteRange {
    let Some(spec) = value.trim().strip_prefix("bytes=") else {
        return ByteRange::Full;
    };
    if spec.contains(',') {
        return ByteRange::Full;
    }
    let Some((first, last)) = spec.trim().split_once('-') else {
        return ByteRange::Full;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        // suffix range: last N bytes
        let Ok(suffix) = last.parse::<u64>() else {
            return ByteRange::Full;
        };
        if suffix == 0 || len == 0 {
            return ByteRange::Unsatisfiable;
        }
        let start = len.saturating_sub(suffix);
        return ByteRange::Partial {
            start,
            end: len - 1,
        };
    }

    let Ok(start) = first.parse::<u64>() else {
        return ByteRange::Full;
    };
    let end = if last.is_empty() {
        len.saturating_sub(1)
    } else {
        match last.parse::<u64>() {
            Ok(end) if end >= start => end.min(len.saturating_sub(1)),
            _ => return ByteRange::Full,
        }
    };
    if start >= len {
        return ByteRange::Unsatisfiable;
    }
    ByteRange::Partial { start, end }
}

// =============================================================================
// Serving
// =============================================================================

/// Build the response for `content`, applying conditional and range rules
/// from the request `headers`.
pub async fn serve_content(headers: &HeaderMap, content: Content) -> Result<Response, ServeError> {
    let etag = content.etag();
    let modified = unix_seconds(content.last_modified);

    if let Some(status) = check_preconditions(headers, &etag, modified) {
        return Ok(not_modified_or_failed(status, &content, &etag));
    }

    let range = match header_str(headers, header::RANGE) {
        Some(value) if if_range_allows(headers, &etag, modified) => parse_range(value, content.len),
        _ => ByteRange::Full,
    };

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, &content.content_type)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::ETAG, &etag)
        .header(
            header::LAST_MODIFIED,
            httpdate::fmt_http_date(content.last_modified),
        );

    let (status, start, count) = match range {
        ByteRange::Full => (StatusCode::OK, 0, content.len),
        ByteRange::Partial { start, end } => {
            builder = builder.header(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", start, end, content.len),
            );
            (StatusCode::PARTIAL_CONTENT, start, end - start + 1)
        }
        ByteRange::Unsatisfiable => {
            return Ok(Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{}", content.len))
                .body(Body::empty())
                .map_err(|e| ServeError::Io(e.to_string()))?);
        }
    };

    let body = match content.body {
        ContentBody::Bytes(data) => {
            let start = start as usize;
            Body::from(data.slice(start..start + count as usize))
        }
        ContentBody::File(mut file) => {
            if start > 0 {
                file.seek(SeekFrom::Start(start))
                    .await
                    .map_err(|e| ServeError::Io(format!("seek failed: {}", e)))?;
            }
            Body::from_stream(ReaderStream::new(file.take(count)))
        }
    };

    builder
        .status(status)
        .header(header::CONTENT_LENGTH, count)
        .body(body)
        .map_err(|e| ServeError::Io(e.to_string()))
}

/// Evaluate validators in RFC 9110 order. Returns the short-circuit status,
/// if any.
fn check_preconditions(headers: &HeaderMap, etag: &str, modified: u64) -> Option<StatusCode> {
    if let Some(value) = header_str(headers, header::IF_MATCH) {
        if !etag_list_matches(value, etag, true) {
            return Some(StatusCode::PRECONDITION_FAILED);
        }
    } else if let Some(since) = header_date(headers, header::IF_UNMODIFIED_SINCE) {
        if modified > since {
            return Some(StatusCode::PRECONDITION_FAILED);
        }
    }

    if let Some(value) = header_str(headers, header::IF_NONE_MATCH) {
        if etag_list_matches(value, etag, false) {
            return Some(StatusCode::NOT_MODIFIED);
        }
    } else if let Some(since) = header_date(headers, header::IF_MODIFIED_SINCE) {
        if modified <= since {
            return Some(StatusCode::NOT_MODIFIED);
        }
    }

    None
}

/// `If-Range` holds either a validator or a date; the range only applies
/// when it still describes the current representation.
fn if_range_allows(headers: &HeaderMap, etag: &str, modified: u64) -> bool {
    let Some(value) = header_str(headers, header::IF_RANGE) else {
        return true;
    };
    let value = value.trim();
    if value.starts_with('"') || value.starts_with("W/") {
        // weak validators never satisfy If-Range
        return !etag.starts_with("W/") && value == etag;
    }
    match httpdate::parse_http_date(value) {
        Ok(date) => unix_seconds(date) == modified,
        Err(_) => false,
    }
}

fn etag_list_matches(list: &str, etag: &str, strong: bool) -> bool {
    if list.trim() == "*" {
        return true;
    }
    if strong && etag.starts_with("W/") {
        return false;
    }
    let opaque = etag.trim_start_matches("W/");
    list.split(',')
        .map(|candidate| candidate.trim())
        .any(|candidate| candidate.trim_start_matches("W/") == opaque)
}

fn not_modified_or_failed(status: StatusCode, content: &Content, etag: &str) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    if status == StatusCode::NOT_MODIFIED {
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(etag) {
            headers.insert(header::ETAG, value);
        }
        if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(content.last_modified))
        {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }
    response
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn header_date(headers: &HeaderMap, name: header::HeaderName) -> Option<u64> {
    header_str(headers, name)
        .and_then(|v| httpdate::parse_http_date(v).ok())
        .map(unix_seconds)
}

fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}
