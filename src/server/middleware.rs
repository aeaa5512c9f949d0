//! Response and request middleware.
//!
//! - [`expires_range`]: browser cache lifetime drawn from a range, so a page
//!   full of thumbnails does not expire all at once
//! - [`canonical_host`]: permanent redirect of requests that arrive under a
//!   different host, port or scheme than the configured one

use std::time::{Duration, SystemTime};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::{header, HeaderValue, StatusCode};
use tracing::debug;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

// =============================================================================
// Expiry Range
// =============================================================================

/// Range of browser cache lifetimes: `[min, min + variation]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiresRange {
    min: Duration,
    variation: Duration,
}

impl ExpiresRange {
    pub fn new(min: Duration, variation: Duration) -> Self {
        Self { min, variation }
    }

    /// Build a range from whole days.
    pub fn from_days(min_days: u64, variation_days: u64) -> Self {
        Self::new(
            Duration::from_secs(min_days.saturating_mul(SECONDS_PER_DAY)),
            Duration::from_secs(variation_days.saturating_mul(SECONDS_PER_DAY)),
        )
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.min.saturating_add(self.variation)
    }

    /// Draw a lifetime uniformly from the range, in whole seconds.
    pub fn pick(&self) -> Duration {
        let extra = fastrand::u64(0..=self.variation.as_secs());
        Duration::from_secs(self.min.as_secs().saturating_add(extra))
    }
}

/// Stamp successful responses with `Cache-Control` and `Expires`.
///
/// Errors are left uncached.
pub async fn expires_range(
    State(range): State<ExpiresRange>,
    req: Request,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;

    let status = response.status();
    if !(status.is_success() || status == StatusCode::NOT_MODIFIED) {
        return response;
    }

    let lifetime = range.pick();
    let expires = httpdate::fmt_http_date(SystemTime::now() + lifetime);
    let headers = response.headers_mut();

    if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={}", lifetime.as_secs())) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    if let Ok(value) = HeaderValue::from_str(&expires) {
        headers.insert(header::EXPIRES, value);
    }

    response
}

// =============================================================================
// Canonical Host
// =============================================================================

/// The one origin the site should be reached under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalHost {
    host: String,
    port: Option<u16>,
    scheme: Option<String>,
}

impl CanonicalHost {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            scheme: None,
        }
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    /// Force `http` or `https`; `None` keeps whatever the request used.
    pub fn with_scheme(mut self, scheme: Option<String>) -> Self {
        self.scheme = scheme.map(|s| s.to_ascii_lowercase());
        self
    }

    /// `host[:port]`, omitting the port when it is the scheme default.
    pub fn authority(&self, scheme: &str) -> String {
        match (self.port, scheme) {
            (None, _) | (Some(80), "http") | (Some(443), "https") => self.host.clone(),
            (Some(port), _) => format!("{}:{}", self.host, port),
        }
    }

    /// Where `req` should be sent instead, or `None` if it is already canonical.
    pub fn redirect_target(&self, req: &Request) -> Option<String> {
        let current_scheme = request_scheme(req);
        let scheme = self.scheme.as_deref().unwrap_or(&current_scheme);
        let authority = self.authority(scheme);

        let current_host = req
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| req.uri().authority().map(|a| a.as_str()))
            .unwrap_or("");

        if current_host.eq_ignore_ascii_case(&authority) && current_scheme == scheme {
            return None;
        }

        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        Some(format!("{}://{}{}", scheme, authority, path_and_query))
    }
}

/// Scheme the client used, as reported by a proxy or the request URI.
fn request_scheme(req: &Request) -> String {
    if let Some(proto) = req
        .headers()
        .get("x-forwarded-proto")
        .and_then(|p| p.to_str().ok())
    {
        return proto.to_ascii_lowercase();
    }
    req.uri().scheme_str().unwrap_or("http").to_ascii_lowercase()
}

/// Redirect (301) requests that are not addressed to the canonical origin.
pub async fn canonical_host(
    State(canonical): State<CanonicalHost>,
    req: Request,
    next: Next,
) -> Response {
    match canonical.redirect_target(&req) {
        Some(target) => {
            debug!(target = %target, "Redirecting to canonical host");
            match HeaderValue::from_str(&target) {
                Ok(location) => {
                    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
                }
                Err(_) => next.run(req).await,
            }
        }
        None => next.run(req).await,
    }
}
