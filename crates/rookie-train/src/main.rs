// Training entry point.
//
// 1. Initialize tracing (stderr)
// 2. Load config (config/predictor.toml, optional)
// 3. Load and filter the historical dataset
// 4. Cross-validate, fit on the full dataset, save the artifact
//
// Progress and the CV summary go to stdout.

use std::path::Path;

use anyhow::Context;
use rookie_core::config;
use rookie_core::training;
use tracing::info;

fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: {} trees, seed {}, {}-fold CV",
        config.training.n_estimators, config.training.seed, config.training.cv_folds
    );

    let stdout = std::io::stdout();
    let summary = training::train_and_save(
        Path::new(&config.paths.dataset),
        Path::new(&config.paths.model),
        &config.training,
        &mut stdout.lock(),
    )
    .context("training failed")?;

    info!(
        "Training finished: {} samples, CV R2 {:.3} +/- {:.3}, artifact at {}",
        summary.n_samples,
        summary.cv.mean,
        summary.cv.std,
        summary.model_path.display()
    );
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rookie_core=info,train=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
