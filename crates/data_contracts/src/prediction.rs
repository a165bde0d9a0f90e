use serde::{Deserialize, Serialize};

/// Multipart field carrying the uploaded image.
pub const IMAGE_FIELD: &str = "image";

/// Fixed message for requests without an image field.
pub const NO_IMAGE_MESSAGE: &str = "No image uploaded";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub age: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
