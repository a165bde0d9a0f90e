//! Age estimation HTTP server.

use anyhow::Context;
use tracing::{error, info};

use inference::InferenceFactory;
use inference_api::{create_router, ApiConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    cli_support::init_tracing();

    let pipeline = cli_support::PipelineConfig::load();
    let config = ApiConfig::from_env(&pipeline);
    info!(model = %config.model_path.display(), "loading age model");

    let model_path = config.model_path.clone();
    let estimator = match tokio::task::spawn_blocking(move || InferenceFactory.build(&model_path))
        .await
        .context("model loading task panicked")?
    {
        Ok(estimator) => estimator,
        Err(e) => {
            error!(error = %e, "failed to load age model");
            std::process::exit(1);
        }
    };

    let addr = config.bind_addr();
    let app = create_router(AppState::new(config, estimator));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "age_api listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
