//! Media type detection from file content.
//!
//! Looks at a fixed-size prefix of the data and matches it against known
//! signatures, ignoring whatever name the file carries. The table follows
//! the WHATWG MIME sniffing algorithm for the types a gallery server will
//! realistically see.

/// Number of leading bytes consulted when sniffing.
pub const SNIFF_LEN: usize = 512;

/// Fallback for content that contains binary bytes.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Fallback for content that looks like text.
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

// =============================================================================
// Signatures
// =============================================================================

/// A byte signature: `pattern` is compared against the data after applying
/// `mask` to each byte (`None` means an all-0xFF mask).
struct Signature {
    pattern: &'static [u8],
    mask: Option<&'static [u8]>,
    media_type: &'static str,
}

const fn exact(pattern: &'static [u8], media_type: &'static str) -> Signature {
    Signature {
        pattern,
        mask: None,
        media_type,
    }
}

const fn masked(
    pattern: &'static [u8],
    mask: &'static [u8],
    media_type: &'static str,
) -> Signature {
    Signature {
        pattern,
        mask: Some(mask),
        media_type,
    }
}

impl Signature {
    fn matches(&self, data: &[u8]) -> bool {
        if data.len() < self.pattern.len() {
            return false;
        }
        match self.mask {
            None => data.starts_with(self.pattern),
            Some(mask) => self
                .pattern
                .iter()
                .zip(mask)
                .zip(data)
                .all(|((p, m), d)| d & m == *p),
        }
    }
}

/// HTML tags recognised after leading whitespace, matched case-insensitively
/// and followed by a space or `>`.
const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

const BINARY_SIGNATURES: &[Signature] = &[
    exact(b"%PDF-", "application/pdf"),
    exact(b"%!PS-Adobe-", "application/postscript"),
    exact(b"\xFE\xFF", "text/plain; charset=utf-16be"),
    exact(b"\xFF\xFE", "text/plain; charset=utf-16le"),
    exact(b"\xEF\xBB\xBF", TEXT_PLAIN),
    exact(b"\x00\x00\x01\x00", "image/x-icon"),
    exact(b"\x00\x00\x02\x00", "image/x-icon"),
    exact(b"BM", "image/bmp"),
    exact(b"GIF87a", "image/gif"),
    exact(b"GIF89a", "image/gif"),
    masked(
        b"RIFF\x00\x00\x00\x00WEBPVP",
        b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF\xFF\xFF",
        "image/webp",
    ),
    exact(b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    exact(b"\xFF\xD8\xFF", "image/jpeg"),
    exact(b"II*\x00", "image/tiff"),
    exact(b"MM\x00*", "image/tiff"),
    masked(
        b"FORM\x00\x00\x00\x00AIFF",
        b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        "audio/aiff",
    ),
    exact(b"ID3", "audio/mpeg"),
    exact(b"OggS\x00", "application/ogg"),
    exact(b"MThd\x00\x00\x00\x06", "audio/midi"),
    masked(
        b"RIFF\x00\x00\x00\x00AVI ",
        b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        "video/avi",
    ),
    masked(
        b"RIFF\x00\x00\x00\x00WAVE",
        b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        "audio/wave",
    ),
    exact(b"\x1A\x45\xDF\xA3", "video/webm"),
    exact(b"wOFF", "font/woff"),
    exact(b"wOF2", "font/woff2"),
    exact(b"\x00\x01\x00\x00", "font/ttf"),
    exact(b"OTTO", "font/otf"),
    exact(b"ttcf", "font/collection"),
    exact(b"\x1F\x8B\x08", "application/x-gzip"),
    exact(b"PK\x03\x04", "application/zip"),
    exact(b"Rar!\x1A\x07\x00", "application/x-rar-compressed"),
    exact(b"Rar!\x1A\x07\x01\x00", "application/x-rar-compressed"),
    exact(b"7z\xBC\xAF\x27\x1C", "application/x-7z-compressed"),
    exact(b"\x00\x61\x73\x6D", "application/wasm"),
];

// =============================================================================
// Detection
// =============================================================================

/// Determine the media type of `data` from its content alone.
///
/// Only the first [`SNIFF_LEN`] bytes are consulted. Always returns a valid
/// media type: unknown text becomes [`TEXT_PLAIN`] and unknown binary data
/// becomes [`OCTET_STREAM`].
pub fn detect_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];

    let first_non_ws = data
        .iter()
        .position(|b| !is_whitespace(*b))
        .unwrap_or(data.len());
    let trimmed = &data[first_non_ws..];

    if HTML_TAGS.iter().any(|tag| matches_html_tag(trimmed, tag)) {
        return "text/html; charset=utf-8";
    }
    if trimmed.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }

    if let Some(sig) = BINARY_SIGNATURES.iter().find(|sig| sig.matches(data)) {
        return sig.media_type;
    }

    if is_mp4(data) {
        return "video/mp4";
    }

    if data.iter().any(|b| is_binary(*b)) {
        OCTET_STREAM
    } else {
        TEXT_PLAIN
    }
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | 0x0C | b'\r' | b' ')
}

fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

fn matches_html_tag(data: &[u8], tag: &[u8]) -> bool {
    if data.len() < tag.len() + 1 {
        return false;
    }
    let head_matches = tag
        .iter()
        .zip(data)
        .all(|(t, d)| d.to_ascii_uppercase() == *t);
    head_matches && matches!(data[tag.len()], b' ' | b'>')
}

/// ISO base media file: a leading `ftyp` box whose brand list contains `mp4`.
fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if box_size > data.len() || box_size % 4 != 0 || &data[4..8] != b"ftyp" {
        return false;
    }
    (8..box_size)
        .step_by(4)
        .filter(|&offset| offset != 12)
        .any(|offset| data.get(offset..offset + 3) == Some(&b"mp4"[..]))
}
