//! Routing integration tests.
//!
//! Tests verify:
//! - Bare prefixes redirect home
//! - Static assets are served with expiry headers, templates are refused
//! - Canonical host redirects
//! - Textual responses are gzipped, images and ranges are not
//! - Health check

use axum::http::StatusCode;

use thumbserve::{CanonicalHost, RouterConfig};

use super::test_utils::{body_text, header, png, Fixture};

#[tokio::test]
async fn test_bare_prefixes_redirect_home() {
    let fixture = Fixture::new();
    let app = fixture.app();

    for uri in ["/thumb", "/static"] {
        let response = app.get(uri).await;
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY, "{}", uri);
        assert_eq!(header(&response, "location"), "/");
    }
}

#[tokio::test]
async fn test_embedded_stylesheet() {
    let fixture = Fixture::new();
    let app = fixture.app();

    let response = app.get("/static/page.css").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "text/css; charset=utf-8");
    assert!(header(&response, "cache-control").starts_with("public, max-age="));
    assert!(response.headers().contains_key("expires"));
    assert!(body_text(response).await.contains("image-container"));
}

#[tokio::test]
async fn test_template_is_not_served() {
    let fixture = Fixture::new();
    let app = fixture.app();

    let response = app.get("/static/page.template").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    // refusals are not cacheable
    assert!(!response.headers().contains_key("expires"));
}

#[tokio::test]
async fn test_unknown_static_asset() {
    let fixture = Fixture::new();
    let app = fixture.app();

    let response = app.get("/static/missing.js").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_without_expires() {
    let fixture = Fixture::new();
    let app = fixture.app_with_config(RouterConfig::new().without_expires().with_tracing(false));

    let response = app.get("/static/page.js").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("expires"));
    assert!(!response.headers().contains_key("cache-control"));
}

#[tokio::test]
async fn test_file_named_like_a_directory_prefix() {
    let fixture = Fixture::new();
    fixture.add_image("thumbnails.png", &png(8, 8));
    let app = fixture.app();

    let response = app.get("/thumbnails.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "image/png");
}

#[tokio::test]
async fn test_canonical_host_redirect() {
    let fixture = Fixture::new();
    fixture.add_image("tabby.png", &png(8, 8));
    let app = fixture.app_with_config(
        RouterConfig::new()
            .with_canonical_host(CanonicalHost::new("pics.example.com"))
            .with_tracing(false),
    );

    let response = app
        .get_with("/tabby.png?size=1", &[("host", "www.example.com")])
        .await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        header(&response, "location"),
        "http://pics.example.com/tabby.png?size=1"
    );

    let response = app
        .get_with("/tabby.png", &[("host", "pics.example.com")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_text_responses_are_gzipped() {
    let fixture = Fixture::new();
    let app = fixture.app();

    let response = app
        .get_with("/static/page.css", &[("accept-encoding", "gzip")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-encoding"), "gzip");

    // clients that do not ask get the stored bytes
    let response = app.get("/static/page.css").await;
    assert!(!response.headers().contains_key("content-encoding"));
    assert!(body_text(response).await.contains("image-container"));
}

#[tokio::test]
async fn test_images_and_ranges_are_not_gzipped() {
    let fixture = Fixture::new();
    fixture.add_image("tabby.png", &png(400, 300));
    fixture.add_image("notes.txt", "whiskers and paws ".repeat(64).as_bytes());
    let app = fixture.app();
    let gzip = [("accept-encoding", "gzip")];

    let response = app.get_with("/thumb/tabby.png.jpg", &gzip).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("content-encoding"));

    let response = app.get_with("/tabby.png", &gzip).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("content-encoding"));

    let response = app
        .get_with("/notes.txt", &[("accept-encoding", "gzip"), ("range", "bytes=0-99")])
        .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert!(!response.headers().contains_key("content-encoding"));
    assert_eq!(body_text(response).await.len(), 100);
}

#[tokio::test]
async fn test_compression_can_be_disabled() {
    let fixture = Fixture::new();
    let app = fixture.app_with_config(
        RouterConfig::new()
            .with_compression(false)
            .with_tracing(false),
    );

    let response = app
        .get_with("/static/page.css", &[("accept-encoding", "gzip")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("content-encoding"));
}

#[tokio::test]
async fn test_health_check() {
    let fixture = Fixture::new();
    let app = fixture.app();

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let health: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["version"].is_string());
}
