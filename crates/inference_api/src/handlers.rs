//! Request handlers.

use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::extract::{Multipart, State};
use axum::Json;
use data_contracts::{PredictionResponse, IMAGE_FIELD};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// `POST /predict`: estimate an age from the multipart `image` field.
///
/// A non-multipart body is treated the same as a form without the field.
pub async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<PredictionResponse>> {
    let multipart = multipart.map_err(|rejection| {
        debug!(reason = %rejection.body_text(), "predict called without a multipart body");
        ApiError::NoImage
    })?;
    let bytes = read_image_field(multipart).await?;

    let estimator = state.estimator.clone();
    let age = tokio::task::spawn_blocking(move || estimator.estimate_bytes(&bytes))
        .await
        .map_err(|e| ApiError::Internal(format!("inference task failed: {e}")))?
        .map_err(|e| {
            warn!(error = %e, "prediction failed");
            ApiError::from(e)
        })?;
    if !age.is_finite() {
        return Err(ApiError::Internal(format!(
            "model produced a non-finite estimate ({age})"
        )));
    }
    Ok(Json(PredictionResponse { age }))
}

/// First file part named `image`, fully buffered. Other fields, and a plain
/// text field that happens to be called `image`, are skipped.
async fn read_image_field(mut multipart: Multipart) -> ApiResult<Bytes> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(ApiError::NoImage),
            Err(e) if is_too_large(&e) => return Err(ApiError::PayloadTooLarge),
            Err(e) => {
                debug!(error = %e.body_text(), "malformed multipart body");
                return Err(ApiError::NoImage);
            }
        };
        if field.name() == Some(IMAGE_FIELD) && field.file_name().is_some() {
            return field.bytes().await.map_err(|e| {
                if is_too_large(&e) {
                    ApiError::PayloadTooLarge
                } else {
                    ApiError::Internal(e.body_text())
                }
            });
        }
    }
}

fn is_too_large(err: &MultipartError) -> bool {
    err.status() == StatusCode::PAYLOAD_TOO_LARGE
}
