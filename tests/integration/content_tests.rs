//! Raw file integration tests.
//!
//! Tests verify:
//! - Media types come from file content, not names
//! - Conditional requests (If-None-Match, If-Modified-Since)
//! - Byte ranges (single, suffix, unsatisfiable)

use axum::http::StatusCode;

use super::test_utils::{body_bytes, header, png, Fixture};

#[tokio::test]
async fn test_raw_file_served_with_sniffed_type() {
    let fixture = Fixture::new();
    let data = png(32, 32);
    fixture.add_image("cats/accidentally_saved.gif", &data);
    let app = fixture.app();

    let response = app.get("/cats/accidentally_saved.gif").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "image/png");
    assert_eq!(header(&response, "accept-ranges"), "bytes");
    assert_eq!(
        header(&response, "content-length"),
        data.len().to_string()
    );
    assert_eq!(body_bytes(response).await.as_ref(), data.as_slice());
}

#[tokio::test]
async fn test_raw_text_file() {
    let fixture = Fixture::new();
    fixture.add_image("notes.jpg", b"these are not pixels\n");
    let app = fixture.app();

    let response = app.get("/notes.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "text/plain; charset=utf-8");
}

#[tokio::test]
async fn test_raw_file_with_encoded_name() {
    let fixture = Fixture::new();
    fixture.add_image("my cats/tabby.png", &png(8, 8));
    let app = fixture.app();

    let response = app.get("/my%20cats/tabby.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "image/png");
}

#[tokio::test]
async fn test_raw_file_missing() {
    let fixture = Fixture::new();
    let app = fixture.app();

    let response = app.get("/nope.png").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_raw_file_has_no_expiry_headers() {
    let fixture = Fixture::new();
    fixture.add_image("tabby.png", &png(8, 8));
    let app = fixture.app();

    let response = app.get("/tabby.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("expires"));
}

// =============================================================================
// Conditional Requests
// =============================================================================

#[tokio::test]
async fn test_if_none_match_returns_not_modified() {
    let fixture = Fixture::new();
    fixture.add_image("tabby.png", &png(16, 16));
    let app = fixture.app();

    let first = app.get("/tabby.png").await;
    let etag = header(&first, "etag").to_string();

    let response = app
        .get_with("/tabby.png", &[("if-none-match", etag.as_str())])
        .await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(header(&response, "etag"), etag);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_if_modified_since_returns_not_modified() {
    let fixture = Fixture::new();
    fixture.add_image("tabby.png", &png(16, 16));
    let app = fixture.app();

    let first = app.get("/tabby.png").await;
    let last_modified = header(&first, "last-modified").to_string();

    let response = app
        .get_with("/tabby.png", &[("if-modified-since", last_modified.as_str())])
        .await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

    let stale = app
        .get_with(
            "/tabby.png",
            &[("if-modified-since", "Thu, 01 Jan 1970 00:00:00 GMT")],
        )
        .await;
    assert_eq!(stale.status(), StatusCode::OK);
}

// =============================================================================
// Byte Ranges
// =============================================================================

#[tokio::test]
async fn test_range_request() {
    let fixture = Fixture::new();
    let data = png(16, 16);
    fixture.add_image("tabby.png", &data);
    let app = fixture.app();

    let response = app.get_with("/tabby.png", &[("range", "bytes=0-9")]).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header(&response, "content-range"),
        format!("bytes 0-9/{}", data.len())
    );
    assert_eq!(header(&response, "content-type"), "image/png");
    assert_eq!(body_bytes(response).await.as_ref(), &data[..10]);
}

#[tokio::test]
async fn test_suffix_range_request() {
    let fixture = Fixture::new();
    let data = png(16, 16);
    fixture.add_image("tabby.png", &data);
    let app = fixture.app();

    let response = app.get_with("/tabby.png", &[("range", "bytes=-4")]).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(body_bytes(response).await.as_ref(), &data[data.len() - 4..]);
}

#[tokio::test]
async fn test_unsatisfiable_range() {
    let fixture = Fixture::new();
    let data = png(16, 16);
    fixture.add_image("tabby.png", &data);
    let app = fixture.app();

    let range = format!("bytes={}-", data.len() + 10);
    let response = app.get_with("/tabby.png", &[("range", range.as_str())]).await;
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(
        header(&response, "content-range"),
        format!("bytes */{}", data.len())
    );
}
