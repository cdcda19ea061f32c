//! Product image uploads.

#![allow(clippy::unwrap_used)]

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use fernleaf_integration_tests::TestEnv;

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([40, 120, 60])));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Jpeg).unwrap();
    bytes.into_inner()
}

fn file(name: &str, content_type: &str, bytes: Vec<u8>) -> Part {
    Part::bytes(bytes)
        .file_name(name.to_string())
        .mime_str(content_type)
        .unwrap()
}

#[tokio::test]
async fn test_upload_stores_resized_primary_image() {
    let env = TestEnv::start().await;
    let admin = env.admin_client("owner@example.com").await;
    let product = env.seed_product("Fern Pot", 1000);

    let form = Form::new().part("files", file("pot.jpg", "image/jpeg", jpeg(1600, 900)));
    let response = admin
        .post(env.admin(&format!("/admin/api/products/{}/media", product.id)))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let media: Value = response.json().await.unwrap();
    let media = media.as_array().unwrap();
    assert_eq!(media.len(), 1);
    assert_eq!(media[0]["is_primary"], true);
    assert!(
        media[0]["url"]
            .as_str()
            .unwrap()
            .starts_with("memory://product-images/")
    );

    let paths = env.storage.paths();
    assert_eq!(paths.len(), 1);
    let (stored, content_type) = env.storage.object(&paths[0]).unwrap();
    assert_eq!(content_type, "image/jpeg");
    let decoded = image::load_from_memory(&stored).unwrap();
    assert_eq!(decoded.width(), 1200);
}

#[tokio::test]
async fn test_oversized_file_rejects_whole_batch_before_storage() {
    let env = TestEnv::start().await;
    let admin = env.admin_client("owner@example.com").await;
    let product = env.seed_product("Fern Pot", 1000);

    let form = Form::new()
        .part("files", file("ok.jpg", "image/jpeg", jpeg(10, 10)))
        .part("files", file("huge.png", "image/png", vec![0; 6 * 1024 * 1024]));
    let response = admin
        .post(env.admin(&format!("/admin/api/products/{}/media", product.id)))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(env.storage.call_count(), 0);
    assert!(env.storage.paths().is_empty());
}

#[tokio::test]
async fn test_unsupported_type_is_rejected() {
    let env = TestEnv::start().await;
    let admin = env.admin_client("owner@example.com").await;
    let product = env.seed_product("Fern Pot", 1000);

    let form = Form::new().part("files", file("notes.txt", "text/plain", b"hello".to_vec()));
    let response = admin
        .post(env.admin(&format!("/admin/api/products/{}/media", product.id)))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(env.storage.call_count(), 0);
}
