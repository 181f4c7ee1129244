//! Feature selection and the seeded train/test split

use crate::data::is_numeric;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const STAGE: &str = "select_and_split";

/// Train and test partitions of the feature matrix and label vector
///
/// Rows keep their pairing: row `i` of `train_features` belongs with
/// element `i` of `train_labels`, and both came from source row
/// `train_indices[i]`.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train_features: DataFrame,
    pub test_features: DataFrame,
    pub train_labels: Series,
    pub test_labels: Series,
    /// Source row of each training row
    pub train_indices: Vec<usize>,
    /// Source row of each test row
    pub test_indices: Vec<usize>,
}

impl TrainTestSplit {
    /// Feature names in model input order
    pub fn feature_names(&self) -> Vec<String> {
        self.train_features
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }
}

/// Restrict the table to the allow-listed features and split it row-wise
///
/// # Arguments
/// * `table` - Fully encoded record table (not modified)
/// * `feature_columns` - Allow-list, in output order
/// * `label_column` - Outcome column
/// * `test_fraction` - Share of rows for the test partition, in (0, 1)
/// * `seed` - Seed of the row permutation
///
/// # Returns
/// * The four partitions; `ceil(test_fraction * rows)` rows go to test
pub fn select_and_split(
    table: &DataFrame,
    feature_columns: &[String],
    label_column: &str,
    test_fraction: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::invalid(
            "test_fraction",
            test_fraction,
            "must lie strictly between 0 and 1",
        ));
    }

    for name in feature_columns {
        if table.column(name).is_err() {
            return Err(PipelineError::missing(STAGE, name.as_str()));
        }
    }
    let labels = table
        .column(label_column)
        .map_err(|_| PipelineError::missing(STAGE, label_column))?
        .as_materialized_series()
        .clone();
    let features = table.select(feature_columns.iter().map(String::as_str))?;

    let (train_indices, test_indices) = shuffled_partition(table.height(), test_fraction, seed)?;
    let train_idx = index_chunk(&train_indices);
    let test_idx = index_chunk(&test_indices);

    Ok(TrainTestSplit {
        train_features: features.take(&train_idx)?,
        test_features: features.take(&test_idx)?,
        train_labels: labels.take(&train_idx)?,
        test_labels: labels.take(&test_idx)?,
        train_indices,
        test_indices,
    })
}

/// Permute `0..n_rows` with a seeded RNG; the head becomes the test rows
fn shuffled_partition(
    n_rows: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let n_test = (test_fraction * n_rows as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_rows {
        return Err(PipelineError::EmptyInput { stage: STAGE });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut permutation: Vec<usize> = (0..n_rows).collect();
    permutation.shuffle(&mut rng);

    let train = permutation.split_off(n_test);
    Ok((train, permutation))
}

fn index_chunk(indices: &[usize]) -> IdxCa {
    IdxCa::from_vec(
        "idx".into(),
        indices.iter().map(|&i| i as IdxSize).collect(),
    )
}

/// Convert every column of a numeric table into a row-major matrix
pub fn feature_matrix(features: &DataFrame) -> Result<Array2<f64>> {
    let n_rows = features.height();
    let columns = features
        .get_columns()
        .iter()
        .map(|column| -> Result<Vec<f64>> {
            let name = column.name().to_string();
            if !is_numeric(column.dtype()) {
                return Err(PipelineError::unsupported("feature_matrix", name, column.dtype()));
            }
            if column.null_count() > 0 {
                return Err(PipelineError::unsupported(
                    "feature_matrix",
                    name,
                    format!("{} with nulls", column.dtype()),
                ));
            }
            let values: Vec<f64> = column
                .cast(&DataType::Float64)?
                .f64()?
                .into_no_null_iter()
                .collect();
            Ok(values)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(Array2::from_shape_fn((n_rows, columns.len()), |(r, c)| {
        columns[c][r]
    }))
}

/// Convert a non-negative integer label series into class indices
pub fn label_vector(labels: &Series) -> Result<Array1<usize>> {
    let name = labels.name().to_string();
    if labels.null_count() > 0 || !is_numeric(labels.dtype()) {
        return Err(PipelineError::unsupported("label_vector", name, labels.dtype()));
    }
    labels
        .cast(&DataType::Int64)?
        .i64()?
        .into_no_null_iter()
        .map(|value| {
            usize::try_from(value).map_err(|_| {
                PipelineError::invalid(name.as_str(), value, "labels must be non-negative")
            })
        })
        .collect()
}
