#![recursion_limit = "256"]

pub mod early_stopping;
pub mod metrics;
pub mod util;

pub use early_stopping::{run_monitored, EarlyStopping, EarlyStoppingDecision, MonitoredRun};
pub use metrics::{evaluate_mae, mae_loss};
pub use models::{AgeRegressor, AgeRegressorConfig};
pub use util::{fine_tune_start, load_regressor_from_checkpoint, run_train, TrainArgs};
/// Backend alias for training/eval (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn_ndarray::NdArray<f32>;
