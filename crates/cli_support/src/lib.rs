pub mod common;
pub mod config;
pub mod logging;

pub use common::{CheckpointArgs, DatasetRootArgs};
pub use config::PipelineConfig;
pub use logging::init_tracing;
