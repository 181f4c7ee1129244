//! Data loading and churn label derivation using Polars

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::path::Path;

/// Load a delimited file with a header row into a record table
///
/// # Arguments
/// * `file_path` - Path to the CSV file
///
/// # Returns
/// * The table with inferred column types, in file order
pub fn load_table(file_path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))?
        .finish()?;

    if df.height() == 0 || df.width() == 0 {
        return Err(PipelineError::EmptyInput { stage: "load_table" });
    }

    tracing::debug!(
        path = %file_path.display(),
        rows = df.height(),
        columns = df.width(),
        "table loaded"
    );
    Ok(df)
}

/// Add a binary label column derived from a raw status column
///
/// Each row gets `0` when its status equals `reference_value` exactly and
/// `1` otherwise; a null status counts as not retained. The raw column is
/// left in place.
///
/// # Arguments
/// * `table` - Record table, mutated in place
/// * `raw_column` - String column holding the status
/// * `reference_value` - Status meaning "retained"
/// * `label_column` - Name of the new integer column
pub fn derive_label(
    table: &mut DataFrame,
    raw_column: &str,
    reference_value: &str,
    label_column: &str,
) -> Result<()> {
    const STAGE: &str = "derive_label";

    let raw = table
        .column(raw_column)
        .map_err(|_| PipelineError::missing(STAGE, raw_column))?;
    let statuses = raw
        .str()
        .map_err(|_| PipelineError::unsupported(STAGE, raw_column, raw.dtype()))?;

    let labels: Vec<i64> = statuses
        .into_iter()
        .map(|status| if status == Some(reference_value) { 0 } else { 1 })
        .collect();

    table.with_column(Series::new(label_column.into(), labels))?;
    Ok(())
}

/// Integer dtypes, the only discrete numeric keys a grouping accepts
pub(crate) fn is_integer(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

pub(crate) fn is_numeric(dtype: &DataType) -> bool {
    is_integer(dtype) || matches!(dtype, DataType::Float32 | DataType::Float64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn label_values(table: &DataFrame) -> Vec<i64> {
        table
            .column("Churn")
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    #[test]
    fn test_derive_label_exact_match() {
        let mut table = df!(
            "Attrition_Flag" => ["Existing Customer", "Attrited Customer", "existing customer", "Existing Customer "]
        )
        .unwrap();

        derive_label(&mut table, "Attrition_Flag", "Existing Customer", "Churn").unwrap();

        assert_eq!(label_values(&table), vec![0, 1, 1, 1]);
        // raw column is kept
        assert_eq!(table.width(), 2);
    }

    #[test]
    fn test_derive_label_null_is_churn() {
        let mut table = df!("Attrition_Flag" => [Some("Existing Customer"), None]).unwrap();

        derive_label(&mut table, "Attrition_Flag", "Existing Customer", "Churn").unwrap();

        assert_eq!(label_values(&table), vec![0, 1]);
    }

    #[test]
    fn test_derive_label_missing_column() {
        let mut table = df!("Status" => ["Existing Customer"]).unwrap();

        let result = derive_label(&mut table, "Attrition_Flag", "Existing Customer", "Churn");

        assert!(matches!(
            result,
            Err(PipelineError::MissingColumn { column, .. }) if column == "Attrition_Flag"
        ));
        assert_eq!(table.width(), 1);
    }

    #[test]
    fn test_derive_label_requires_strings() {
        let mut table = df!("Attrition_Flag" => [1i64, 0]).unwrap();

        let result = derive_label(&mut table, "Attrition_Flag", "Existing Customer", "Churn");

        assert!(matches!(result, Err(PipelineError::UnsupportedType { .. })));
    }

    #[test]
    fn test_load_table() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "CLIENTNUM,Attrition_Flag,Customer_Age").unwrap();
        writeln!(file, "768805383,Existing Customer,45").unwrap();
        writeln!(file, "818770008,Attrited Customer,49").unwrap();

        let table = load_table(file.path()).unwrap();

        assert_eq!(table.shape(), (2, 3));
        assert_eq!(table.column("Customer_Age").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_load_table_header_only() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "CLIENTNUM,Attrition_Flag").unwrap();

        let result = load_table(file.path());

        assert!(matches!(result, Err(PipelineError::EmptyInput { .. })));
    }
}
