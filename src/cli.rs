//! Command-line interface definitions and argument parsing

use crate::config::PipelineConfig;
use crate::error::Result;
use clap::Parser;
use std::path::PathBuf;

/// Customer churn pipeline: EDA, target encoding, random forest and
/// logistic regression training
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON configuration file; absent fields take their defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to the input CSV file
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Directory for EDA and result images
    #[arg(long)]
    pub image_dir: Option<PathBuf>,

    /// Directory for persisted models
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    /// Seed for the train/test split and the forest
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Share of rows held out for testing
    #[arg(short, long)]
    pub test_fraction: Option<f64>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Skip exploratory data analysis
    #[arg(long)]
    pub skip_eda: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Build the run configuration: the config file (or defaults) with
    /// command-line overrides applied on top
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Overwrite the fields given on the command line
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(input) = &self.input {
            config.data_path = input.clone();
        }
        if let Some(dir) = &self.image_dir {
            config.image_dir = dir.clone();
        }
        if let Some(dir) = &self.model_dir {
            config.model_dir = dir.clone();
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(fraction) = self.test_fraction {
            config.test_fraction = fraction;
        }
    }
}
