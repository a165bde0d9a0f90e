//! Server configuration.

use std::path::PathBuf;

use cli_support::PipelineConfig;

/// Default cap on request bodies (16 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// `*` allows any origin.
    pub cors_origins: Vec<String>,
    pub max_body_size: usize,
    /// Checkpoint to serve; its model card is read from `<model_path>.card.json`.
    pub model_path: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            cors_origins: vec!["*".to_string()],
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            model_path: PipelineConfig::default().checkpoint,
        }
    }
}

impl ApiConfig {
    /// Read `API_HOST`, `API_PORT`, `CORS_ORIGINS`, `MAX_BODY_SIZE` and `MODEL_PATH`.
    /// The model path falls back to the pipeline config's checkpoint.
    pub fn from_env(pipeline: &PipelineConfig) -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| parse_origins(&s))
                .unwrap_or(defaults.cors_origins),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            model_path: std::env::var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| pipeline.checkpoint.clone()),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if origins.is_empty() {
        vec!["*".to_string()]
    } else {
        origins
    }
}
