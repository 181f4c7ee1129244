//! Pipeline configuration

use crate::error::{PipelineError, Result};
use crate::model::{Criterion, ForestGrid, MaxFeatures};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Raw numeric columns kept as model features, in output order
pub const NUMERIC_FEATURES: [&str; 14] = [
    "Customer_Age",
    "Dependent_count",
    "Months_on_book",
    "Total_Relationship_Count",
    "Months_Inactive_12_mon",
    "Contacts_Count_12_mon",
    "Credit_Limit",
    "Total_Revolving_Bal",
    "Avg_Open_To_Buy",
    "Total_Amt_Chng_Q4_Q1",
    "Total_Trans_Amt",
    "Total_Trans_Ct",
    "Total_Ct_Chng_Q4_Q1",
    "Avg_Utilization_Ratio",
];

/// Categorical columns replaced by their churn proportion
pub const CATEGORY_COLUMNS: [&str; 5] = [
    "Gender",
    "Education_Level",
    "Marital_Status",
    "Income_Category",
    "Card_Category",
];

/// Rendering options handed to the plotting sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    /// Bitmap width in pixels
    pub width: u32,
    /// Bitmap height in pixels
    pub height: u32,
    /// Font family for captions and axis labels
    pub font_family: String,
    /// Caption font size
    pub caption_size: u32,
    /// Font size for text reports
    pub text_size: u32,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: 1600,
            height: 800,
            font_family: "sans-serif".to_string(),
            caption_size: 30,
            text_size: 18,
        }
    }
}

/// Everything a pipeline run needs to know up front
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Delimited input file with a header row
    pub data_path: PathBuf,
    /// Raw status column the label is derived from
    pub status_column: String,
    /// Status value meaning the customer was retained
    pub retained_value: String,
    /// Name of the derived binary label column
    pub label_column: String,
    /// Categorical columns to target-encode, in order
    pub category_columns: Vec<String>,
    /// Feature allow-list, in model input order
    pub feature_columns: Vec<String>,
    /// Share of rows held out for testing
    pub test_fraction: f64,
    /// Seed for the split and for model randomness
    pub seed: u64,
    /// Folds used to score grid candidates
    pub cv_folds: usize,
    /// Random forest hyperparameter grid
    pub forest_grid: ForestGrid,
    /// Iteration cap for the logistic regression solver
    pub logistic_max_iterations: u64,
    /// Root directory for rendered artifacts
    pub image_dir: PathBuf,
    /// Directory for persisted models
    pub model_dir: PathBuf,
    /// Rendering options
    pub plot: PlotConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let label_column = "Churn".to_string();
        let category_columns: Vec<String> =
            CATEGORY_COLUMNS.iter().map(|c| c.to_string()).collect();
        let feature_columns = NUMERIC_FEATURES
            .iter()
            .map(|c| c.to_string())
            .chain(
                category_columns
                    .iter()
                    .map(|c| crate::encoding::encoded_column_name(c, &label_column)),
            )
            .collect();

        Self {
            data_path: PathBuf::from("data/bank_data.csv"),
            status_column: "Attrition_Flag".to_string(),
            retained_value: "Existing Customer".to_string(),
            label_column,
            category_columns,
            feature_columns,
            test_fraction: 0.3,
            seed: 42,
            cv_folds: 5,
            forest_grid: ForestGrid {
                n_estimators: vec![200, 500],
                max_features: vec![MaxFeatures::Sqrt],
                max_depth: vec![Some(4), Some(5), Some(100)],
                criterion: vec![Criterion::Gini, Criterion::Entropy],
            },
            logistic_max_iterations: 3000,
            image_dir: PathBuf::from("images"),
            model_dir: PathBuf::from("models"),
            plot: PlotConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file; absent fields take defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        Ok(config)
    }

    /// Reject settings no stage can honour
    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(PipelineError::invalid(
                "test_fraction",
                self.test_fraction,
                "must lie strictly between 0 and 1",
            ));
        }
        if self.cv_folds < 2 {
            return Err(PipelineError::invalid(
                "cv_folds",
                self.cv_folds,
                "at least two folds are required",
            ));
        }
        if self.forest_grid.is_empty() {
            return Err(PipelineError::invalid(
                "forest_grid",
                "[]",
                "every hyperparameter needs at least one value",
            ));
        }
        if self.feature_columns.is_empty() {
            return Err(PipelineError::invalid(
                "feature_columns",
                "[]",
                "at least one feature is required",
            ));
        }
        Ok(())
    }
}
