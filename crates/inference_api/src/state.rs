//! Application state.

use std::sync::Arc;

use inference::AgeEstimator;

use crate::config::ApiConfig;

/// Shared application state. The estimator is loaded once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub estimator: Arc<dyn AgeEstimator>,
}

impl AppState {
    pub fn new(config: ApiConfig, estimator: Arc<dyn AgeEstimator>) -> Self {
        Self { config, estimator }
    }
}
