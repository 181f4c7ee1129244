//! ChurnForge: customer churn prediction CLI
//!
//! Entrypoint that sets up logging, resolves the configuration and runs the
//! pipeline with a PNG report sink and a JSON model store.

use anyhow::{Context, Result};
use churnforge::{run_pipeline_with, Args, JsonModelStore, PlotSink, RunOptions};
use clap::Parser;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref(), args.verbose)?;

    let config = args.pipeline_config().context("invalid configuration")?;
    tracing::info!(
        input = %config.data_path.display(),
        images = %config.image_dir.display(),
        models = %config.model_dir.display(),
        seed = config.seed,
        "starting churn pipeline"
    );

    let mut sink = PlotSink::new(&config.image_dir, config.plot.clone());
    let store = JsonModelStore::new(&config.model_dir);
    let options = RunOptions {
        skip_eda: args.skip_eda,
    };

    let summary = run_pipeline_with(&config, options, &mut sink, &store)
        .with_context(|| format!("pipeline failed for {}", config.data_path.display()))?;

    tracing::info!(
        rows = summary.rows,
        train = summary.train_rows,
        test = summary.test_rows,
        "data partitioned"
    );
    tracing::info!(params = ?summary.best_params, cv_score = summary.cv_score, "best forest");
    for score in [&summary.forest, &summary.logistic] {
        tracing::info!(
            model = %score.name,
            test_accuracy = score.test_accuracy,
            auc = score.test_auc,
            "test results"
        );
    }
    tracing::info!(
        forest = %summary.forest_path.display(),
        logistic = %summary.logistic_path.display(),
        "models saved"
    );

    Ok(())
}

/// Install the global subscriber; `RUST_LOG` wins over the defaults
fn init_logging(log_file: Option<&Path>, verbose: bool) -> Result<()> {
    let default_directive = if verbose { "churnforge=debug" } else { "churnforge=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive.into());

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("cannot create log directory {}", parent.display()))?;
            }
            let file = File::create(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}
