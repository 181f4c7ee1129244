//! Error types for the churn pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised by pipeline stages.
///
/// Every variant that concerns the record table names the stage that
/// detected it, so a propagated error is enough to locate the failure.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{stage}: required column '{column}' is missing")]
    MissingColumn { stage: &'static str, column: String },

    #[error("{stage}: column '{column}' has unsupported type {dtype}")]
    UnsupportedType {
        stage: &'static str,
        column: String,
        dtype: String,
    },

    #[error("{stage}: no rows to process")]
    EmptyInput { stage: &'static str },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Model error: {0}")]
    Model(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub(crate) fn missing(stage: &'static str, column: impl Into<String>) -> Self {
        PipelineError::MissingColumn {
            stage,
            column: column.into(),
        }
    }

    pub(crate) fn unsupported(
        stage: &'static str,
        column: impl Into<String>,
        dtype: impl ToString,
    ) -> Self {
        PipelineError::UnsupportedType {
            stage,
            column: column.into(),
            dtype: dtype.to_string(),
        }
    }

    pub(crate) fn invalid(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        PipelineError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_stage_and_column() {
        let err = PipelineError::missing("encode_categoricals", "Gender");
        assert_eq!(
            err.to_string(),
            "encode_categoricals: required column 'Gender' is missing"
        );

        let err = PipelineError::unsupported("derive_label", "Attrition_Flag", "i64");
        assert!(err.to_string().contains("Attrition_Flag"));
        assert!(err.to_string().contains("i64"));
    }
}
