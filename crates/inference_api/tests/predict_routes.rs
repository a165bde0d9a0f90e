use std::io::Cursor;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use image::{Rgb, RgbImage};
use inference::{AgeEstimator, InferenceError};
use inference_api::{create_router, ApiConfig, AppState};
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "age-test-boundary";

/// Answers a fixed age for anything that decodes as an image.
struct FixedAge(f32);

impl AgeEstimator for FixedAge {
    fn estimate(&self, _image: &RgbImage) -> Result<f32, InferenceError> {
        Ok(self.0)
    }
}

fn app_with(age: f32, config: ApiConfig) -> Router {
    create_router(AppState::new(config, Arc::new(FixedAge(age))))
}

fn app(age: f32) -> Router {
    app_with(age, ApiConfig::default())
}

fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_fn(20, 12, |x, y| Rgb([x as u8 * 10, y as u8 * 20, 128]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .expect("encode png");
    buf.into_inner()
}

fn push_part(body: &mut Vec<u8>, name: &str, file_name: Option<&str>, data: &[u8]) {
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    let disposition = match file_name {
        Some(file_name) => format!(
            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        ),
        None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"),
    };
    body.extend_from_slice(disposition.as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(b"\r\n");
}

/// Every field is sent as a file part named `<name>.bin`.
fn multipart_body(fields: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, data) in fields {
        push_part(&mut body, name, Some(&format!("{name}.bin")), data);
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn predict_request(fields: &[(&str, &[u8])]) -> Request<Body> {
    multipart_request(multipart_body(fields))
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn valid_image_returns_age() {
    let png = png_bytes();
    let response = app(31.5)
        .oneshot(predict_request(&[("image", png.as_slice())]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["age"].as_f64(), Some(31.5));
}

#[tokio::test]
async fn image_field_is_found_among_other_fields() {
    let png = png_bytes();
    let response = app(12.0)
        .oneshot(predict_request(&[("note", &b"hello"[..]), ("image", png.as_slice())]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_image_field_is_400_with_fixed_message() {
    let png = png_bytes();
    let response = app(20.0)
        .oneshot(predict_request(&[("photo", png.as_slice())]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body, serde_json::json!({ "error": "No image uploaded" }));
}

#[tokio::test]
async fn text_image_field_without_filename_is_400() {
    let png = png_bytes();
    let mut body = Vec::new();
    push_part(&mut body, "image", None, png.as_slice());
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    let response = app(20.0).oneshot(multipart_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body, serde_json::json!({ "error": "No image uploaded" }));
}

#[tokio::test]
async fn file_part_after_a_text_image_field_is_used() {
    let png = png_bytes();
    let mut body = Vec::new();
    push_part(&mut body, "image", None, b"just text");
    push_part(&mut body, "image", Some("face.png"), png.as_slice());
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    let response = app(27.0).oneshot(multipart_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["age"].as_f64(), Some(27.0));
}

#[tokio::test]
async fn non_multipart_body_is_treated_as_missing_image() {
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"image":"nope"}"#))
        .unwrap();
    let response = app(20.0).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "No image uploaded");
}

#[tokio::test]
async fn undecodable_image_is_500_with_error_text() {
    let response = app(20.0)
        .oneshot(predict_request(&[("image", &b"not an image at all"[..])]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    let text = body["error"].as_str().unwrap_or_default();
    assert!(!text.is_empty());
}

#[tokio::test]
async fn non_finite_estimate_is_500() {
    let png = png_bytes();
    let response = app(f32::NAN)
        .oneshot(predict_request(&[("image", png.as_slice())]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn health_reports_ok() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app(1.0).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn any_origin_is_allowed_by_default() {
    let png = png_bytes();
    let mut request = predict_request(&[("image", png.as_slice())]);
    request.headers_mut().insert(
        header::ORIGIN,
        "https://frontend.example".parse().unwrap(),
    );
    let response = app(40.0).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn preflight_for_configured_origin_is_answered() {
    let config = ApiConfig {
        cors_origins: vec!["https://frontend.example".to_string()],
        ..ApiConfig::default()
    };
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/predict")
        .header(header::ORIGIN, "https://frontend.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app_with(40.0, config).oneshot(request).await.unwrap();
    assert!(response.status().is_success());
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://frontend.example"
    );
}

fn small_limit() -> ApiConfig {
    ApiConfig {
        max_body_size: 64,
        ..ApiConfig::default()
    }
}

async fn assert_json_413(response: axum::response::Response) {
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = json_body(response).await;
    assert_eq!(body, serde_json::json!({ "error": "Request body too large" }));
}

#[tokio::test]
async fn streamed_oversized_body_is_413_json() {
    let mut big = png_bytes();
    big.extend_from_slice(&[0u8; 256]);
    let response = app_with(10.0, small_limit())
        .oneshot(predict_request(&[("image", big.as_slice())]))
        .await
        .unwrap();
    assert_json_413(response).await;
}

#[tokio::test]
async fn declared_oversized_body_is_413_json() {
    let mut big = png_bytes();
    big.extend_from_slice(&[0u8; 256]);
    let body = multipart_body(&[("image", big.as_slice())]);
    let mut request = multipart_request(body.clone());
    request
        .headers_mut()
        .insert(header::CONTENT_LENGTH, body.len().into());
    let response = app_with(10.0, small_limit()).oneshot(request).await.unwrap();
    assert_json_413(response).await;
}
