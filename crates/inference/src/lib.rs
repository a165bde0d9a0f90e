#![recursion_limit = "256"]

pub mod error;
pub mod estimator;
pub mod factory;

#[cfg(feature = "backend-wgpu")]
pub type InferenceBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type InferenceBackend = burn_ndarray::NdArray<f32>;

pub type InferenceModel<B> = models::AgeRegressor<B>;

pub use error::InferenceError;
pub use estimator::{AgeEstimator, BurnAgeEstimator};
pub use factory::InferenceFactory;

pub mod prelude {
    pub use crate::error::InferenceError;
    pub use crate::estimator::{AgeEstimator, BurnAgeEstimator};
    pub use crate::factory::InferenceFactory;
    pub use crate::{InferenceBackend, InferenceModel};
}
