// QR rendering: determinism, decodability and Starter gating

mod common;

use axum::http::StatusCode;
use common::{setup_test_app, TestApp};
use reviews_backend::services::qr::{render_png, render_svg};

fn decode_png(bytes: &[u8]) -> String {
    let image = image::load_from_memory(bytes).unwrap().to_luma8();
    let (width, height) = image.dimensions();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        width as usize,
        height as usize,
        |x, y| image.get_pixel(x as u32, y as u32)[0],
    );
    let grids = prepared.detect_grids();
    assert_eq!(grids.len(), 1, "expected exactly one QR grid");
    let (_, content) = grids[0].decode().unwrap();
    content
}

async fn pro_app() -> (TestApp, String) {
    let app = setup_test_app().await;
    let cookie = app.sign_in("owner-1", "owner@example.com").await;
    app.grant_pro("owner-1").await;
    (app, cookie)
}

#[test]
fn test_png_round_trips_through_decoder() {
    let data = "https://app.example.com/r/aB3dE9xZ";
    let png = render_png(data, 8, 4).unwrap();
    assert_eq!(decode_png(&png), data);

    let dense = format!("https://example.com/{}", "x".repeat(300));
    assert_eq!(decode_png(&render_png(&dense, 4, 4).unwrap()), dense);
}

#[test]
fn test_rendering_is_deterministic() {
    let data = "https://search.google.com/local/writereview?placeid=ChIJ123";
    assert_eq!(render_png(data, 8, 1).unwrap(), render_png(data, 8, 1).unwrap());
    assert_eq!(render_svg(data, 8, 1).unwrap(), render_svg(data, 8, 1).unwrap());
    assert_ne!(render_png(data, 8, 1).unwrap(), render_png(data, 9, 1).unwrap());
}

#[tokio::test]
async fn test_qr_endpoint_formats_and_clamping() {
    let (app, cookie) = pro_app().await;

    let png = app
        .get("/api/qr?data=hello")
        .cookie(&cookie)
        .send()
        .await;
    assert_eq!(png.status(), StatusCode::OK);
    assert_eq!(png.content_type().as_deref(), Some("image/png"));
    let bytes = png.bytes().await;
    assert_eq!(bytes, render_png("hello", 8, 1).unwrap());

    let svg = app
        .get("/api/qr?data=hello&format=svg&scale=999&margin=-3")
        .cookie(&cookie)
        .send()
        .await;
    assert_eq!(svg.status(), StatusCode::OK);
    assert_eq!(svg.content_type().as_deref(), Some("image/svg+xml"));
    // Scale clamps to 40 and margin to 0
    assert_eq!(svg.text().await, render_svg("hello", 40, 0).unwrap());

    // Unparseable numbers fall back to the defaults
    let fallback = app
        .get("/api/qr?data=hello&scale=abc&margin=1.5x")
        .cookie(&cookie)
        .send()
        .await;
    assert_eq!(fallback.status(), StatusCode::OK);
    assert_eq!(fallback.bytes().await, bytes);

    let missing = app.get("/api/qr").cookie(&cookie).send().await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let anonymous = app.get("/api/qr?data=hello").send().await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_starter_may_only_encode_saved_review_link() {
    let app = setup_test_app().await;
    let cookie = app.sign_in("owner-1", "owner@example.com").await;
    let business = app.create_business("owner-1", "ChIJ123").await;
    let saved = business.review_link.clone().unwrap();

    let custom = app
        .get("/api/qr?data=https%3A%2F%2Fexample.com")
        .cookie(&cookie)
        .send()
        .await;
    assert_eq!(custom.status(), StatusCode::FORBIDDEN);

    let encoded: String = url::form_urlencoded::byte_serialize(saved.as_bytes()).collect();
    let allowed = app
        .get(&format!("/api/qr?data={}", encoded))
        .cookie(&cookie)
        .send()
        .await;
    assert_eq!(allowed.status(), StatusCode::OK);
    assert_eq!(allowed.bytes().await, render_png(&saved, 8, 1).unwrap());

    // Pro lifts the restriction
    app.grant_pro("owner-1").await;
    let custom = app
        .get("/api/qr?data=https%3A%2F%2Fexample.com")
        .cookie(&cookie)
        .send()
        .await;
    assert_eq!(custom.status(), StatusCode::OK);
}
