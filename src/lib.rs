//! ChurnForge: customer churn prediction on bank customer records
//!
//! The pipeline derives a binary churn label, target-encodes categorical
//! columns, splits the table reproducibly, trains a grid-searched random
//! forest and a logistic regression, and publishes EDA and evaluation
//! artifacts through a pluggable report sink.

pub mod cli;
pub mod config;
pub mod data;
pub mod eda;
pub mod encoding;
pub mod error;
pub mod features;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use config::{PipelineConfig, PlotConfig};
pub use data::{derive_label, load_table};
pub use eda::perform_eda;
pub use encoding::{encode_categoricals, encoded_column_name};
pub use error::{PipelineError, Result};
pub use features::{select_and_split, TrainTestSplit};
pub use metrics::{ClassificationReport, RocCurve};
pub use model::{
    grid_search, Classifier, Criterion, FeatureImportance, ForestGrid, ForestParams, LogisticModel,
    MaxFeatures, RandomForest,
};
pub use pipeline::{run_pipeline, run_pipeline_with, PipelineSummary, RunOptions};
pub use report::{Artifact, MemorySink, ReportSink};
pub use store::{JsonModelStore, ModelManifest, ModelStore};
pub use viz::PlotSink;
