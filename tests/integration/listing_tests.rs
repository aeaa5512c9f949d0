//! Directory listing integration tests.
//!
//! Tests verify:
//! - Known directories render through the listing template
//! - Subdirectories come before files, each sorted
//! - Hidden files and directories never appear
//! - A cache directory inside the image root never appears

use axum::http::StatusCode;

use super::test_utils::{body_text, header, png, Fixture};

const ENTRIES_TEMPLATE: &str = "{% for e in entries %}{{ e | safe }}\n{% endfor %}";

#[tokio::test]
async fn test_root_listing_with_builtin_template() {
    let fixture = Fixture::new();
    fixture.add_image("tabby.png", &png(8, 8));
    fixture.add_dir("cats");
    let app = fixture.app();

    let response = app.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "text/html; charset=utf-8");

    let html = body_text(response).await;
    assert!(html.contains("alt=\"tabby.png\""));
    assert!(html.contains("class=\"dir\""));
    assert!(html.contains(">cats</a>"));
    assert!(html.contains("page.js"));
}

#[tokio::test]
async fn test_listing_orders_dirs_before_files() {
    let fixture = Fixture::new();
    fixture.add_image("zebra.png", &png(8, 8));
    fixture.add_image("alpaca.png", &png(8, 8));
    fixture.add_dir("dogs");
    fixture.add_dir("cats");
    let app = fixture.app_with(fixture.settings(), ENTRIES_TEMPLATE);

    let response = app.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_text(response).await,
        "/cats\n/dogs\n/alpaca.png\n/zebra.png\n"
    );
}

#[tokio::test]
async fn test_nested_listing() {
    let fixture = Fixture::new();
    fixture.add_image("cats/tabby.png", &png(8, 8));
    fixture.add_image("cats/kittens/ginger.png", &png(8, 8));
    let app = fixture.app_with(fixture.settings(), ENTRIES_TEMPLATE);

    let response = app.get("/cats").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_text(response).await,
        "/cats/kittens\n/cats/tabby.png\n"
    );

    // trailing slash names the same directory
    let response = app.get("/cats/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_text(response).await,
        "/cats/kittens\n/cats/tabby.png\n"
    );
}

#[tokio::test]
async fn test_hidden_entries_excluded() {
    let fixture = Fixture::new();
    fixture.add_image("tabby.png", &png(8, 8));
    fixture.add_image(".secret.png", &png(8, 8));
    fixture.add_image(".cache/thumb.png", &png(8, 8));
    let app = fixture.app_with(fixture.settings(), ENTRIES_TEMPLATE);

    let response = app.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "/tabby.png\n");

    // hidden directories are not tracked, so they fall through to files
    let response = app.get("/.cache").await;
    assert_ne!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_listing_links_thumbnails_with_configured_suffix() {
    let fixture = Fixture::new();
    fixture.add_image("tabby.png", &png(8, 8));
    let app = fixture.app_with(
        fixture.settings().with_format("png"),
        "{% for f in files %}/thumb{{ f | safe }}.{{ thumb_suffix }}\n{% endfor %}",
    );

    let response = app.get("/").await;
    assert_eq!(body_text(response).await, "/thumb/tabby.png.png\n");
}

#[tokio::test]
async fn test_listed_links_reach_awkward_names() {
    let fixture = Fixture::new();
    fixture.add_image("cat#1.png", &png(400, 300));
    fixture.add_image("a%41.png", &png(400, 300));
    fixture.add_image("aA.png", b"not the file you asked for");
    let app = fixture.app_with(
        fixture.settings(),
        "{% for f in files %}{{ f | safe }}\n{% endfor %}",
    );

    let links = body_text(app.get("/").await).await;
    let links: Vec<&str> = links.lines().collect();
    assert_eq!(links, vec!["/a%2541.png", "/aA.png", "/cat%231.png"]);

    for link in ["/a%2541.png", "/cat%231.png"] {
        let raw = app.get(link).await;
        assert_eq!(raw.status(), StatusCode::OK, "{}", link);
        assert_eq!(header(&raw, "content-type"), "image/png");

        let thumb = app.get(&format!("/thumb{}.jpg", link)).await;
        assert_eq!(thumb.status(), StatusCode::OK, "{}", link);
        assert_eq!(header(&thumb, "content-type"), "image/jpeg");
    }
}

#[tokio::test]
async fn test_builtin_template_shows_decoded_names() {
    let fixture = Fixture::new();
    fixture.add_image("my cats/cat#1.png", &png(8, 8));
    let app = fixture.app();

    let html = body_text(app.get("/my%20cats").await).await;
    assert!(html.contains("alt=\"cat#1.png\""));
    assert!(html.contains("cat%231.png.jpg"));

    let root = body_text(app.get("/").await).await;
    assert!(root.contains(">my cats</a>"));
}

#[tokio::test]
async fn test_nested_cache_is_not_listed() {
    let fixture = Fixture::with_nested_cache("thumbs");
    fixture.add_image("tabby.png", &png(400, 300));
    fixture.add_dir("cats");
    let app = fixture.app_with(fixture.settings(), ENTRIES_TEMPLATE);

    let response = app.get("/thumb/tabby.png.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(fixture.thumbs().join("tabby.png.jpg").is_file());

    let response = app.get("/").await;
    assert_eq!(body_text(response).await, "/cats\n/tabby.png\n");

    let response = app.get("/thumbs").await;
    assert_ne!(response.status(), StatusCode::OK);
}
