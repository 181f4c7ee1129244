//! Mean-target encoding of categorical columns
//!
//! Each categorical column is replaced, for modeling purposes, by a numeric
//! column holding the mean label of the rows that share its category. The
//! statistic is computed over the whole table it is applied to, so every
//! category always has a value.

use crate::data::is_numeric;
use crate::error::{PipelineError, Result};
use polars::prelude::*;

const STAGE: &str = "encode_categoricals";

/// Name of the column holding the encoding of `category` against `label`
pub fn encoded_column_name(category: &str, label: &str) -> String {
    format!("{category}_{label}")
}

/// Add one encoded column per categorical column, in the given order
///
/// # Arguments
/// * `table` - Record table, mutated in place
/// * `category_columns` - Categorical columns to encode
/// * `label_column` - Numeric label the group means are taken over
///
/// The label column is only read, so the order of `category_columns` affects
/// output column order and nothing else. All columns are checked before the
/// first encoded column is added.
pub fn encode_categoricals(
    table: &mut DataFrame,
    category_columns: &[String],
    label_column: &str,
) -> Result<()> {
    check_label(table, label_column)?;
    for category in category_columns {
        check_category(table, category)?;
    }
    if table.height() == 0 {
        return Err(PipelineError::EmptyInput { stage: STAGE });
    }

    let encoded: Vec<Expr> = category_columns
        .iter()
        .map(|category| {
            col(label_column)
                .cast(DataType::Float64)
                .mean()
                .over([col(category.as_str())])
                .alias(encoded_column_name(category, label_column))
        })
        .collect();

    *table = table.clone().lazy().with_columns(encoded).collect()?;
    tracing::debug!(columns = category_columns.len(), "encoded categories");
    Ok(())
}

/// Mean label per distinct category value of one column
///
/// Returns a frame with the category column, in its own dtype, and the
/// encoded column, sorted by category.
pub fn category_means(table: &DataFrame, category: &str, label_column: &str) -> Result<DataFrame> {
    check_label(table, label_column)?;
    check_category(table, category)?;

    let grouped = table
        .clone()
        .lazy()
        .group_by([col(category)])
        .agg([col(label_column)
            .cast(DataType::Float64)
            .mean()
            .alias(encoded_column_name(category, label_column))])
        .sort([category], SortMultipleOptions::default())
        .collect()?;
    Ok(grouped)
}

fn check_label(table: &DataFrame, label_column: &str) -> Result<()> {
    let label = table
        .column(label_column)
        .map_err(|_| PipelineError::missing(STAGE, label_column))?;
    if !is_numeric(label.dtype()) {
        return Err(PipelineError::unsupported(STAGE, label_column, label.dtype()));
    }
    if label.null_count() > 0 {
        return Err(PipelineError::unsupported(
            STAGE,
            label_column,
            format!("{} with nulls", label.dtype()),
        ));
    }
    Ok(())
}

/// Any hashable dtype is a valid key; nested values cannot be grouped
fn check_category(table: &DataFrame, category: &str) -> Result<()> {
    let column = table
        .column(category)
        .map_err(|_| PipelineError::missing(STAGE, category))?;
    let dtype = column.dtype();
    if dtype.is_nested() || matches!(dtype, DataType::Null | DataType::Unknown(_)) {
        return Err(PipelineError::unsupported(STAGE, category, dtype));
    }
    if column.null_count() > 0 {
        return Err(PipelineError::unsupported(
            STAGE,
            category,
            format!("{dtype} with nulls"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(table: &DataFrame, name: &str) -> Vec<f64> {
        table
            .column(name)
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_gender_scenario() {
        let mut table = df!(
            "Gender" => ["M", "F", "M"],
            "Churn" => [1i64, 0, 1]
        )
        .unwrap();

        let means = category_means(&table, "Gender", "Churn").unwrap();
        let keys: Vec<&str> = means.column("Gender").unwrap().str().unwrap().into_no_null_iter().collect();
        assert_eq!(keys, vec!["F", "M"]);
        assert_eq!(encoded(&means, "Gender_Churn"), vec![0.0, 1.0]);

        encode_categoricals(&mut table, &columns(&["Gender"]), "Churn").unwrap();
        assert_eq!(encoded(&table, "Gender_Churn"), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_same_category_same_value() {
        let mut table = df!(
            "Card_Category" => ["Blue", "Gold", "Blue", "Blue", "Gold", "Silver"],
            "Churn" => [1i64, 0, 0, 1, 1, 0]
        )
        .unwrap();

        encode_categoricals(&mut table, &columns(&["Card_Category"]), "Churn").unwrap();

        let values = encoded(&table, "Card_Category_Churn");
        let blue = 2.0 / 3.0;
        assert!((values[0] - blue).abs() < 1e-12);
        assert!((values[2] - blue).abs() < 1e-12);
        assert!((values[3] - blue).abs() < 1e-12);
        assert_eq!(values[1], 0.5);
        assert_eq!(values[4], 0.5);
        // singleton category leaks its own label
        assert_eq!(values[5], 0.0);
    }

    #[test]
    fn test_columns_added_in_order_label_untouched() {
        let mut table = df!(
            "Gender" => ["M", "F", "F", "M"],
            "Card_Category" => ["Blue", "Blue", "Gold", "Gold"],
            "Churn" => [1i64, 0, 1, 1]
        )
        .unwrap();

        encode_categoricals(&mut table, &columns(&["Card_Category", "Gender"]), "Churn").unwrap();

        let names: Vec<String> = table
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(
            names,
            vec!["Gender", "Card_Category", "Churn", "Card_Category_Churn", "Gender_Churn"]
        );
        assert_eq!(encoded(&table, "Gender_Churn"), vec![1.0, 0.5, 0.5, 1.0]);
        assert_eq!(encoded(&table, "Card_Category_Churn"), vec![0.5, 0.5, 1.0, 1.0]);

        let label: Vec<i64> = table
            .column("Churn")
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(label, vec![1, 0, 1, 1]);
    }

    #[test]
    fn test_integer_categories() {
        let mut table = df!(
            "Dependent_count" => [0i64, 2, 0, 2],
            "Churn" => [1i64, 0, 0, 0]
        )
        .unwrap();

        encode_categoricals(&mut table, &columns(&["Dependent_count"]), "Churn").unwrap();

        assert_eq!(encoded(&table, "Dependent_count_Churn"), vec![0.5, 0.0, 0.5, 0.0]);
    }

    #[test]
    fn test_missing_columns() {
        let mut table = df!(
            "Gender" => ["M", "F"],
            "Churn" => [1i64, 0]
        )
        .unwrap();

        let result = encode_categoricals(&mut table, &columns(&["Gender", "Card_Category"]), "Churn");
        assert!(matches!(
            result,
            Err(PipelineError::MissingColumn { column, .. }) if column == "Card_Category"
        ));
        // nothing was added before the failure was detected
        assert_eq!(table.width(), 2);

        let result = encode_categoricals(&mut table, &columns(&["Gender"]), "Attrition");
        assert!(matches!(result, Err(PipelineError::MissingColumn { .. })));
    }

    #[test]
    fn test_float_and_boolean_categories() {
        let mut table = df!(
            "Score" => [1.5f64, 2.5, 1.5],
            "Active" => [true, true, false],
            "Churn" => [1i64, 0, 1]
        )
        .unwrap();

        encode_categoricals(&mut table, &columns(&["Score", "Active"]), "Churn").unwrap();

        assert_eq!(encoded(&table, "Score_Churn"), vec![1.0, 0.0, 1.0]);
        assert_eq!(encoded(&table, "Active_Churn"), vec![0.5, 0.5, 1.0]);
        // keys keep their dtype
        assert_eq!(table.column("Score").unwrap().dtype(), &DataType::Float64);

        let means = category_means(&table, "Score", "Churn").unwrap();
        let keys: Vec<f64> = means.column("Score").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(keys, vec![1.5, 2.5]);
    }

    #[test]
    fn test_unsupported_types() {
        let list = Series::new(
            "Tags".into(),
            [Series::new("".into(), [1i64, 2]), Series::new("".into(), [3i64])],
        );
        let mut table = DataFrame::new(vec![
            list.into(),
            Series::new("Churn".into(), [1i64, 0]).into(),
        ])
        .unwrap();
        let result = encode_categoricals(&mut table, &columns(&["Tags"]), "Churn");
        assert!(matches!(
            result,
            Err(PipelineError::UnsupportedType { column, .. }) if column == "Tags"
        ));

        let mut table = df!(
            "Gender" => [Some("M"), None],
            "Churn" => [1i64, 0]
        )
        .unwrap();
        let result = encode_categoricals(&mut table, &columns(&["Gender"]), "Churn");
        assert!(matches!(result, Err(PipelineError::UnsupportedType { .. })));

        let mut table = df!(
            "Gender" => ["M", "F"],
            "Churn" => ["yes", "no"]
        )
        .unwrap();
        let result = encode_categoricals(&mut table, &columns(&["Gender"]), "Churn");
        assert!(matches!(result, Err(PipelineError::UnsupportedType { .. })));
    }

    #[test]
    fn test_empty_table() {
        let mut table = df!(
            "Gender" => Vec::<&str>::new(),
            "Churn" => Vec::<i64>::new()
        )
        .unwrap();

        let result = encode_categoricals(&mut table, &columns(&["Gender"]), "Churn");
        assert!(matches!(result, Err(PipelineError::EmptyInput { .. })));
    }
}
