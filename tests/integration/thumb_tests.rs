//! Thumbnail integration tests.
//!
//! Tests verify:
//! - Generation on first request and disk cache hits afterwards
//! - Error mapping for missing, undecodable and degenerate sources
//! - Single-flight generation under concurrent requests
//! - Atomic cache writes and regeneration of mismatched entries

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use thumbserve::PAGE_TEMPLATE;

use super::test_utils::{
    body_bytes, body_text, count_files, dimensions, header, is_valid_jpeg, is_valid_png, png,
    Fixture,
};

// =============================================================================
// Generation and Cache Hits
// =============================================================================

#[tokio::test]
async fn test_thumbnail_miss_then_hit() {
    let fixture = Fixture::new();
    fixture.add_image("cats/tabby.png", &png(640, 480));
    let app = fixture.app();

    let first = app.get("/thumb/cats/tabby.png.jpg").await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(header(&first, "content-type"), "image/jpeg");
    assert_eq!(header(&first, "x-thumb-cache-hit"), "false");
    let first_body = body_bytes(first).await;
    assert!(is_valid_jpeg(&first_body));
    assert_eq!(dimensions(&first_body), (310, 200));

    let entry = fixture.thumbs().join("cats/tabby.png.jpg");
    assert!(entry.is_file(), "thumbnail should be persisted");

    let second = app.get("/thumb/cats/tabby.png.jpg").await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(header(&second, "x-thumb-cache-hit"), "true");

    let mtime = std::fs::metadata(&entry).unwrap().modified().unwrap();
    assert_eq!(
        header(&second, "last-modified"),
        httpdate::fmt_http_date(mtime)
    );

    let second_body = body_bytes(second).await;
    assert_eq!(first_body, second_body);
    assert_eq!(app.generation_count(), 1);
}

#[tokio::test]
async fn test_thumbnail_carries_expiry_headers() {
    let fixture = Fixture::new();
    fixture.add_image("tabby.png", &png(400, 300));
    let app = fixture.app();

    let response = app.get("/thumb/tabby.png.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(header(&response, "cache-control").starts_with("public, max-age="));
    assert!(response.headers().contains_key("expires"));
}

#[tokio::test]
async fn test_thumbnail_stem_fallback() {
    let fixture = Fixture::new();
    fixture.add_image("cats/tabby.png", &png(400, 300));
    let app = fixture.app();

    let response = app.get("/thumb/cats/tabby.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(is_valid_jpeg(&body_bytes(response).await));
}

#[tokio::test]
async fn test_thumbnail_png_output() {
    let fixture = Fixture::new();
    fixture.add_image("tabby.png", &png(400, 300));
    let app = fixture.app_with(
        fixture.settings().with_format("png").with_dimensions(64, 64),
        PAGE_TEMPLATE,
    );

    let response = app.get("/thumb/tabby.png.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "image/png");

    let body = body_bytes(response).await;
    assert!(is_valid_png(&body));
    assert_eq!(dimensions(&body), (64, 64));
}

#[tokio::test]
async fn test_thumbnail_conditional_request() {
    let fixture = Fixture::new();
    fixture.add_image("tabby.png", &png(400, 300));
    let app = fixture.app();

    let _ = body_bytes(app.get("/thumb/tabby.png.jpg").await).await;
    let hit = app.get("/thumb/tabby.png.jpg").await;
    let etag = header(&hit, "etag").to_string();

    let response = app
        .get_with("/thumb/tabby.png.jpg", &[("if-none-match", etag.as_str())])
        .await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert!(body_bytes(response).await.is_empty());
}

// =============================================================================
// Error Cases
// =============================================================================

#[tokio::test]
async fn test_thumbnail_missing_source() {
    let fixture = Fixture::new();
    let app = fixture.app();

    let response = app.get("/thumb/missing.jpg").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let error: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(error["error"], "not_found");
    assert_eq!(count_files(fixture.thumbs()), 0);
}

#[tokio::test]
async fn test_thumbnail_traversal_stays_in_root() {
    let fixture = Fixture::new();
    let app = fixture.app();

    let response = app.get("/thumb/../../etc/passwd.jpg").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_thumbnail_undecodable_source() {
    let fixture = Fixture::new();
    fixture.add_image("notes.txt", b"just some text, not an image");
    let app = fixture.app();

    let response = app.get("/thumb/notes.txt.jpg").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let error: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(error["error"], "decode_error");
    assert_eq!(count_files(fixture.thumbs()), 0);
}

#[tokio::test]
async fn test_thumbnail_degenerate_geometry() {
    let fixture = Fixture::new();
    fixture.add_image("strip.png", &png(1, 2000));
    let app = fixture.app();

    let response = app.get("/thumb/strip.png.jpg").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let error: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(error["error"], "processing_error");
    assert_eq!(count_files(fixture.thumbs()), 0);
}

#[tokio::test]
async fn test_thumbnail_unsupported_format() {
    let fixture = Fixture::new();
    fixture.add_image("tabby.png", &png(400, 300));
    let app = fixture.app_with(fixture.settings().with_format("tiff"), PAGE_TEMPLATE);

    let response = app.get("/thumb/tabby.png.tiff").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let error: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(error["error"], "unsupported_format");
}

// =============================================================================
// Concurrency and Cache Integrity
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_generate_once() {
    let fixture = Fixture::new();
    fixture.add_image("cats/tabby.png", &png(1200, 900));
    let app = fixture.app();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let router = app.router.clone();
        handles.push(tokio::spawn(async move {
            let request = Request::builder()
                .uri("/thumb/cats/tabby.png.jpg")
                .body(Body::empty())
                .unwrap();
            router.oneshot(request).await.unwrap()
        }));
    }

    let mut bodies = Vec::new();
    for handle in handles {
        let response = handle.await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        bodies.push(body_bytes(response).await);
    }

    assert_eq!(app.generation_count(), 1);
    for body in &bodies {
        assert_eq!(body, &bodies[0]);
        assert_eq!(dimensions(body), (310, 200));
    }
}

#[tokio::test]
async fn test_no_temporary_files_left_behind() {
    let fixture = Fixture::new();
    fixture.add_image("a.png", &png(400, 300));
    fixture.add_image("nested/b.png", &png(300, 400));
    let app = fixture.app();

    for uri in ["/thumb/a.png.jpg", "/thumb/nested/b.png.jpg"] {
        let response = app.get(uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        let _ = body_bytes(response).await;
    }

    assert_eq!(count_files(fixture.thumbs()), 2);
    assert!(fixture.thumbs().join("a.png.jpg").is_file());
    assert!(fixture.thumbs().join("nested/b.png.jpg").is_file());
}

#[tokio::test]
async fn test_mismatched_cache_entry_is_regenerated() {
    let fixture = Fixture::new();
    fixture.add_image("tabby.png", &png(400, 300));
    // a PNG sitting where a JPEG thumbnail belongs
    let entry = fixture.add_cache_entry("tabby.png.jpg", &png(10, 10));
    let app = fixture.app();

    let response = app.get("/thumb/tabby.png.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-thumb-cache-hit"), "false");
    assert!(is_valid_jpeg(&body_bytes(response).await));

    let persisted = std::fs::read(&entry).unwrap();
    assert!(is_valid_jpeg(&persisted));
    assert_eq!(app.generation_count(), 1);
}

#[tokio::test]
async fn test_wrong_size_cache_entry_is_regenerated() {
    let fixture = Fixture::new();
    fixture.add_image("tabby.png", &png(400, 300));
    // left behind by a run with a different thumbnail size
    let entry = fixture.add_cache_entry(
        "tabby.png.jpg",
        &super::test_utils::encode_image(150, 100, image::ImageFormat::Jpeg),
    );
    let app = fixture.app();

    let response = app.get("/thumb/tabby.png.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-thumb-cache-hit"), "false");
    assert_eq!(dimensions(&body_bytes(response).await), (310, 200));

    assert_eq!(dimensions(&std::fs::read(&entry).unwrap()), (310, 200));
    assert_eq!(app.generation_count(), 1);

    let response = app.get("/thumb/tabby.png.jpg").await;
    assert_eq!(header(&response, "x-thumb-cache-hit"), "true");
}

#[tokio::test]
async fn test_existing_cache_entry_is_served_without_source() {
    let fixture = Fixture::new();
    let cached = super::test_utils::encode_image(310, 200, image::ImageFormat::Jpeg);
    fixture.add_cache_entry("gone.png.jpg", &cached);
    let app = fixture.app();

    let response = app.get("/thumb/gone.png.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-thumb-cache-hit"), "true");
    assert_eq!(body_bytes(response).await.as_ref(), cached.as_slice());
    assert_eq!(app.generation_count(), 0);
}
