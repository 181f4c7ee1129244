//! Exploratory data analysis of the labelled customer table

use crate::data::is_numeric;
use crate::error::{PipelineError, Result};
use crate::report::{Artifact, ReportSink};
use ndarray::Array2;
use polars::prelude::*;

const STAGE: &str = "eda";

/// Number of evaluation points of the density curve
const KDE_POINTS: usize = 200;

/// Publish the five EDA artifacts for a labelled table
///
/// # Arguments
/// * `table` - Record table with the label column already derived
/// * `label_column` - Binary outcome column
/// * `sink` - Receives `eda/Churn.png`, `eda/Customer_Age.png`,
///   `eda/Marital_Status.png`, `eda/Total_Trans.png` and `eda/Heatmap.png`
pub fn perform_eda(table: &DataFrame, label_column: &str, sink: &mut dyn ReportSink) -> Result<()> {
    let churn = numeric_values(table, label_column)?;
    sink.publish(
        &Artifact::Histogram {
            title: label_column.to_string(),
            x_label: label_column.to_string(),
            values: churn,
            bins: 10,
            density: false,
            kde: None,
        },
        "eda/Churn.png",
    )?;

    let ages = numeric_values(table, "Customer_Age")?;
    sink.publish(
        &Artifact::Histogram {
            title: "Customer_Age".to_string(),
            x_label: "Customer_Age".to_string(),
            values: ages,
            bins: 10,
            density: false,
            kde: None,
        },
        "eda/Customer_Age.png",
    )?;

    let shares = value_shares(table, "Marital_Status")?;
    sink.publish(
        &Artifact::Bar {
            title: "Marital_Status".to_string(),
            y_label: "Share of customers".to_string(),
            labels: shares.iter().map(|(value, _)| value.clone()).collect(),
            values: shares.iter().map(|&(_, share)| share).collect(),
        },
        "eda/Marital_Status.png",
    )?;

    let transactions = numeric_values(table, "Total_Trans_Ct")?;
    let bins = ((transactions.len() as f64).sqrt().ceil() as usize).clamp(10, 50);
    let kde = gaussian_kde(&transactions, KDE_POINTS);
    sink.publish(
        &Artifact::Histogram {
            title: "Total_Trans_Ct".to_string(),
            x_label: "Total_Trans_Ct".to_string(),
            values: transactions,
            bins,
            density: true,
            kde: Some(kde),
        },
        "eda/Total_Trans.png",
    )?;

    let (labels, matrix) = correlation_matrix(table)?;
    sink.publish(
        &Artifact::Heatmap {
            title: "Correlation".to_string(),
            labels,
            matrix,
        },
        "eda/Heatmap.png",
    )?;

    Ok(())
}

/// Non-null values of a numeric column as f64
pub fn numeric_values(table: &DataFrame, column: &str) -> Result<Vec<f64>> {
    let series = table
        .column(column)
        .map_err(|_| PipelineError::missing(STAGE, column))?;
    if !is_numeric(series.dtype()) {
        return Err(PipelineError::unsupported(STAGE, column, series.dtype()));
    }
    Ok(series
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .flatten()
        .collect())
}

/// Share of rows holding each distinct value, largest first, ties by value
///
/// Nulls are not counted, matching a normalized value count.
pub fn value_shares(table: &DataFrame, column: &str) -> Result<Vec<(String, f64)>> {
    if table.column(column).is_err() {
        return Err(PipelineError::missing(STAGE, column));
    }

    let counts = table
        .clone()
        .lazy()
        .filter(col(column).is_not_null())
        .group_by([col(column)])
        .agg([len().alias("count")])
        .sort_by_exprs(
            [col("count"), col(column)],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .select([
            col(column).cast(DataType::String).alias("value"),
            (col("count").cast(DataType::Float64) / col("count").sum().cast(DataType::Float64))
                .alias("share"),
        ])
        .collect()?;
    if counts.height() == 0 {
        return Err(PipelineError::EmptyInput { stage: STAGE });
    }

    let values = counts.column("value")?.str()?;
    let shares = counts.column("share")?.f64()?;
    Ok(values
        .into_iter()
        .zip(shares.into_iter())
        .filter_map(|(value, share)| Some((value?.to_string(), share?)))
        .collect())
}

/// Gaussian kernel density estimate with Scott's bandwidth, evaluated at
/// `points` evenly spaced positions across the data range
pub fn gaussian_kde(values: &[f64], points: usize) -> Vec<(f64, f64)> {
    let n = values.len();
    if n < 2 || points == 0 {
        return Vec::new();
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let bandwidth = variance.sqrt() * (n as f64).powf(-0.2);
    if bandwidth <= 0.0 || !bandwidth.is_finite() {
        return Vec::new();
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let step = (max - min) / (points.max(2) - 1) as f64;
    let norm = 1.0 / (n as f64 * bandwidth * (2.0 * std::f64::consts::PI).sqrt());

    (0..points)
        .map(|i| {
            let x = min + step * i as f64;
            let density = values
                .iter()
                .map(|v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
                .sum::<f64>()
                * norm;
            (x, density)
        })
        .collect()
}

/// Pearson correlation between every pair of numeric columns
///
/// Each pair uses the rows where both values are present; a pair with zero
/// variance gets NaN.
pub fn correlation_matrix(table: &DataFrame) -> Result<(Vec<String>, Array2<f64>)> {
    let mut names = Vec::new();
    let mut columns: Vec<Vec<Option<f64>>> = Vec::new();
    for column in table.get_columns() {
        if !is_numeric(column.dtype()) {
            continue;
        }
        names.push(column.name().to_string());
        columns.push(column.cast(&DataType::Float64)?.f64()?.into_iter().collect());
    }
    if names.is_empty() {
        return Err(PipelineError::EmptyInput { stage: STAGE });
    }

    let n = names.len();
    let mut matrix = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in i..n {
            let r = pearson(&columns[i], &columns[j]);
            matrix[[i, j]] = r;
            matrix[[j, i]] = r;
        }
    }
    Ok((names, matrix))
}

fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    sxy / (sxx * syy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemorySink;

    fn eda_table() -> DataFrame {
        df!(
            "Customer_Age" => [45i64, 49, 51, 40, 40, 44],
            "Marital_Status" => ["Married", "Single", "Married", "Unknown", "Married", "Single"],
            "Total_Trans_Ct" => [42i64, 33, 20, 20, 28, 24],
            "Gender" => ["M", "F", "M", "F", "M", "M"],
            "Churn" => [0i64, 0, 1, 0, 1, 0]
        )
        .unwrap()
    }

    #[test]
    fn test_perform_eda_publishes_all_artifacts() {
        let table = eda_table();
        let mut sink = MemorySink::new();

        perform_eda(&table, "Churn", &mut sink).unwrap();

        assert_eq!(
            sink.destinations(),
            vec![
                "eda/Churn.png",
                "eda/Customer_Age.png",
                "eda/Marital_Status.png",
                "eda/Total_Trans.png",
                "eda/Heatmap.png"
            ]
        );
        match sink.get("eda/Heatmap.png") {
            Some(Artifact::Heatmap { labels, matrix, .. }) => {
                assert_eq!(labels, &vec!["Customer_Age", "Total_Trans_Ct", "Churn"]);
                assert_eq!(matrix.shape(), &[3, 3]);
            }
            other => panic!("unexpected artifact: {other:?}"),
        }
    }

    #[test]
    fn test_perform_eda_missing_column() {
        let table = eda_table().drop("Total_Trans_Ct").unwrap();
        let mut sink = MemorySink::new();

        let result = perform_eda(&table, "Churn", &mut sink);

        assert!(matches!(
            result,
            Err(PipelineError::MissingColumn { stage: "eda", column }) if column == "Total_Trans_Ct"
        ));
    }

    #[test]
    fn test_value_shares_order() {
        let shares = value_shares(&eda_table(), "Marital_Status").unwrap();

        assert_eq!(shares[0], ("Married".to_string(), 0.5));
        assert_eq!(shares[1].0, "Single");
        assert_eq!(shares[2].0, "Unknown");
        let total: f64 = shares.iter().map(|(_, s)| s).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_value_shares_ties_and_nulls() {
        let table = df!(
            "Marital_Status" => [Some("Single"), Some("Divorced"), None, Some("Single"), Some("Divorced"), Some("Married")]
        )
        .unwrap();

        let shares = value_shares(&table, "Marital_Status").unwrap();

        assert_eq!(
            shares,
            vec![
                ("Divorced".to_string(), 0.4),
                ("Single".to_string(), 0.4),
                ("Married".to_string(), 0.2),
            ]
        );
    }

    #[test]
    fn test_correlation_matrix() {
        let table = df!(
            "a" => [1.0, 2.0, 3.0, 4.0],
            "b" => [2.0, 4.0, 6.0, 8.0],
            "c" => [4.0, 3.0, 2.0, 1.0],
            "flat" => [5.0, 5.0, 5.0, 5.0]
        )
        .unwrap();

        let (names, matrix) = correlation_matrix(&table).unwrap();

        assert_eq!(names.len(), 4);
        assert!((matrix[[0, 1]] - 1.0).abs() < 1e-12);
        assert!((matrix[[0, 2]] + 1.0).abs() < 1e-12);
        assert!((matrix[[0, 0]] - 1.0).abs() < 1e-12);
        assert!(matrix[[0, 3]].is_nan());
    }

    #[test]
    fn test_kde_integrates_to_about_one() {
        let values: Vec<f64> = (0..200).map(|i| (i % 20) as f64).collect();
        let curve = gaussian_kde(&values, 400);

        assert_eq!(curve.len(), 400);
        let step = curve[1].0 - curve[0].0;
        let area: f64 = curve.iter().map(|(_, y)| y * step).sum();
        // mass beyond the data range is not evaluated
        assert!(area > 0.85 && area < 1.05);

        assert!(gaussian_kde(&[3.0, 3.0], 10).is_empty());
    }
}
