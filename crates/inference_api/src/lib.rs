//! HTTP surface for the age estimator.
//!
//! `POST /predict` takes a multipart upload in the `image` field and answers with
//! `{"age": f}`; `GET /health` reports liveness.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::{cors_layer, create_router};
pub use state::AppState;
