//! Offline trainer: fits a model on the CSV exports and publishes the
//! artifact the server loads at startup.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

use sales_forecaster::{
    config::Config,
    ml::{ArtifactStore, TrainingPipeline},
    telemetry::init_tracing,
};

#[derive(Parser, Debug)]
#[command(name = "train", about = "Train the weekly sales model", version)]
struct Cli {
    /// Number of boosting rounds
    #[arg(long)]
    n_estimators: Option<usize>,

    /// Shrinkage per round, in (0, 1]
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Seed for row subsampling
    #[arg(long)]
    random_state: Option<u64>,

    /// Configuration file
    #[arg(long, default_value = "config/default.toml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let cfg = Config::load_from(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    let mut params = cfg.training.default_hyperparameters();
    if let Some(n) = cli.n_estimators {
        params.n_estimators = n;
    }
    if let Some(lr) = cli.learning_rate {
        params.learning_rate = lr;
    }
    if let Some(seed) = cli.random_state {
        params.random_state = seed;
    }

    let store = ArtifactStore::from_config(&cfg.model);
    let model = TrainingPipeline::new(cfg.data.clone())
        .run_and_publish(&params, &CancellationToken::new(), &store)
        .context("training failed")?;

    info!(
        model_id = %model.metadata.model_id,
        samples = model.metadata.training_samples,
        path = %store.model_path().display(),
        "model saved"
    );
    Ok(())
}
