use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use food_detector_rs::{
    config::Config,
    inference::InferenceContext,
    labels::LabelRegistry,
    model::Classifier,
    server::{router, AppState},
    utils::ensure_model_exists,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    info!(?config, "starting food detector");

    if !config.temp_dir.is_dir() {
        bail!(
            "upload directory {} does not exist",
            config.temp_dir.display()
        );
    }

    let labels = LabelRegistry::from_dataset_dir(&config.dataset_dir)
        .context("failed to load class labels")?;
    info!(count = labels.len(), "labels loaded");

    ensure_model_exists(&config.model_path, config.model_url.as_deref()).await?;
    let classifier = load_classifier(&config)?;
    let inference =
        InferenceContext::new(classifier, labels).context("model does not match labels")?;
    info!(path = %config.model_path.display(), "model loaded");

    let state = Arc::new(AppState {
        inference,
        temp_dir: config.temp_dir.clone(),
    });
    let app = router(state, config.body_limit_bytes);

    let addr = config.listen_addr();
    info!("listening on http://{addr}");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .context("server error")?;

    Ok(())
}

#[cfg(feature = "tensorflow")]
fn load_classifier(config: &Config) -> Result<Arc<dyn Classifier>> {
    use food_detector_rs::model::{FrozenGraphModel, FrozenGraphOptions};

    let model = FrozenGraphModel::load(
        &config.model_path,
        FrozenGraphOptions {
            input_op: config.input_op.clone(),
            output_op: config.output_op.clone(),
            layout: config.input_layout,
        },
    )
    .context("failed to load model")?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "tensorflow"))]
fn load_classifier(_config: &Config) -> Result<Arc<dyn Classifier>> {
    bail!("built without a model backend; enable the `tensorflow` feature")
}
