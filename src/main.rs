use anyhow::Context;
use tracing_subscriber::EnvFilter;

use car_price_predictor::config::ServerConfig;
use car_price_predictor::model::ModelLoader;
use car_price_predictor::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = ServerConfig::from_env()?;

    // No prediction can run without the model: a load failure ends startup.
    let mdl = ModelLoader::new()
        .unseen_categories(cfg.unseen_category)
        .log_rows(cfg.log_predictions)
        .load(&cfg.model_path, &cfg.meta_path)
        .with_context(|| format!("failed to load model from {}", cfg.model_path.display()))?;

    // Warmup on an all-missing row
    let _ = mdl
        .predict_row(&vec![f32::NAN; mdl.features().len()])
        .context("warmup prediction failed")?;
    tracing::info!("warmup forward ok");

    tracing::info!(
        "loaded model; features[{}]: {:?}",
        mdl.features().len(),
        mdl.features().iter().map(|c| c.name()).collect::<Vec<_>>()
    );

    let app = server::router(AppState::new(mdl));

    tracing::info!("listening on http://{}", cfg.bind);
    let listener = tokio::net::TcpListener::bind(cfg.bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
