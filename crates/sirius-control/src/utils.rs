//! Shared utilities for controls, reports and indicators.
//!
//! Small helpers for reading columns out of a [`DataFrame`] in the shapes
//! the rest of the crate needs: identifiers, numeric values and group keys.

use crate::error::{ControlError, Result};
use crate::types::{ObservationId, whole_i64};
use polars::io::csv::read::{CsvParseOptions, CsvReadOptions};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is an integer type.
#[inline]
pub fn is_integer_dtype(dtype: &DataType) -> bool {
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

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    is_integer_dtype(dtype) || matches!(dtype, DataType::Float32 | DataType::Float64)
}

// =============================================================================
// Column Access
// =============================================================================

/// Check whether the frame has a column with this name.
#[inline]
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

/// Get a column as a series, mapping a missing column to
/// [`ControlError::ColumnNotFound`].
pub fn require_series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|col| col.as_materialized_series())
        .map_err(|_| ControlError::ColumnNotFound(name.to_string()))
}

/// Read a numeric column as `f64` values; nulls stay `None`.
pub fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = require_series(df, name)?;
    if !is_numeric_dtype(series.dtype()) {
        return Err(ControlError::InvalidConfig(format!(
            "column '{}' must be numeric, found {}",
            name,
            series.dtype()
        )));
    }
    let float_series = series.cast(&DataType::Float64)?;
    Ok(float_series.f64()?.into_iter().collect())
}

// =============================================================================
// Value Conversion
// =============================================================================

/// Convert a cell value into an [`ObservationId`].
///
/// Integers and whole floats within `i64` range become
/// [`ObservationId::Int`], everything else its text form. Returns `None`
/// for null cells.
pub fn observation_id_from(value: &AnyValue) -> Option<ObservationId> {
    if value.is_null() {
        return None;
    }
    if let Some(text) = value.get_str() {
        return Some(ObservationId::Text(text.to_string()));
    }
    match value {
        AnyValue::Float64(f) => return Some(ObservationId::from_f64(*f)),
        AnyValue::Float32(f) => {
            return Some(match whole_i64(f64::from(*f)) {
                Some(int) => ObservationId::Int(int),
                None => ObservationId::Text(f.to_string()),
            });
        }
        _ => {}
    }
    if is_integer_dtype(&value.dtype())
        && let Some(int) = value.extract::<i64>()
    {
        return Some(ObservationId::Int(int));
    }
    Some(ObservationId::Text(value.to_string()))
}

/// Text form of a non-null cell value used as a grouping key.
pub fn group_key_from(value: &AnyValue) -> Option<String> {
    if value.is_null() {
        return None;
    }
    Some(match value.get_str() {
        Some(text) => text.to_string(),
        None => value.to_string(),
    })
}

/// Build one composite group key per row from the given columns.
///
/// A row with a null in any grouping column gets `None` and belongs to no
/// group.
pub fn row_group_keys(df: &DataFrame, groups: &[&str]) -> Result<Vec<Option<Vec<String>>>> {
    let series: Vec<&Series> = groups
        .iter()
        .map(|name| require_series(df, name))
        .collect::<Result<_>>()?;

    (0..df.height())
        .map(|row| {
            let mut key = Vec::with_capacity(series.len());
            for s in &series {
                match group_key_from(&s.get(row)?) {
                    Some(part) => key.push(part),
                    None => return Ok(None),
                }
            }
            Ok(Some(key))
        })
        .collect()
}

/// Percentage `part / whole * 100`, `None` when `whole` is zero.
#[inline]
pub fn percentage(part: f64, whole: f64) -> Option<f64> {
    if whole == 0.0 {
        None
    } else {
        Some(part / whole * 100.0)
    }
}

// =============================================================================
// CSV Exchange
// =============================================================================

/// Read a CSV file with a header row.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    read_csv_with_dtypes(path, &[])
}

/// Read a CSV file, forcing the given columns to a data type instead of
/// inferring it. Keeps identifiers such as `"0301"` as text.
pub fn read_csv_with_dtypes(path: &Path, dtypes: &[(&str, DataType)]) -> Result<DataFrame> {
    let overwrite = (!dtypes.is_empty()).then(|| {
        Arc::new(Schema::from_iter(
            dtypes
                .iter()
                .map(|(name, dtype)| (PlSmallStr::from(*name), dtype.clone())),
        ))
    });

    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_schema_overwrite(overwrite)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Write a frame as CSV with a header row.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float32));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_integer_dtype(&DataType::Float64));
    }

    #[test]
    fn test_require_series_missing_column() {
        let df = df!["a" => [1, 2]].unwrap();
        assert!(require_series(&df, "a").is_ok());
        assert!(matches!(
            require_series(&df, "b"),
            Err(ControlError::ColumnNotFound(name)) if name == "b"
        ));
    }

    #[test]
    fn test_numeric_values_keeps_nulls() {
        let df = df!["x" => [Some(1i64), None, Some(3)]].unwrap();
        let values = numeric_values(&df, "x").unwrap();
        assert_eq!(values, vec![Some(1.0), None, Some(3.0)]);
    }

    #[test]
    fn test_numeric_values_rejects_text() {
        let df = df!["x" => ["a", "b"]].unwrap();
        assert!(numeric_values(&df, "x").is_err());
    }

    #[test]
    fn test_observation_id_from_values() {
        assert_eq!(
            observation_id_from(&AnyValue::Int32(7)),
            Some(ObservationId::Int(7))
        );
        assert_eq!(
            observation_id_from(&AnyValue::String("974760673")),
            Some(ObservationId::Text("974760673".to_string()))
        );
        assert_eq!(
            observation_id_from(&AnyValue::Float64(2.0)),
            Some(ObservationId::Int(2))
        );
        assert_eq!(observation_id_from(&AnyValue::Null), None);
    }

    #[test]
    fn test_observation_id_from_floats() {
        assert_eq!(
            observation_id_from(&AnyValue::Float32(2.0)),
            Some(ObservationId::Int(2))
        );
        assert_eq!(
            observation_id_from(&AnyValue::Float32(1.5)),
            Some(ObservationId::Text("1.5".to_string()))
        );
        assert_eq!(
            observation_id_from(&AnyValue::Float64(1e20)),
            Some(ObservationId::Text("100000000000000000000".to_string()))
        );
        assert_ne!(
            observation_id_from(&AnyValue::Float64(1e20)),
            observation_id_from(&AnyValue::Float64(1e21))
        );
    }

    #[test]
    fn test_row_group_keys() {
        let df = df![
            "nace" => ["47", "47", "56"],
            "fylke" => [3, 3, 46]
        ]
        .unwrap();
        let keys = row_group_keys(&df, &["nace", "fylke"]).unwrap();
        assert_eq!(keys[0], Some(vec!["47".to_string(), "3".to_string()]));
        assert_eq!(keys[2], Some(vec!["56".to_string(), "46".to_string()]));
    }

    #[test]
    fn test_row_group_keys_null_key_has_no_group() {
        let df = df![
            "nace" => [Some("47"), None],
            "fylke" => [3, 46]
        ]
        .unwrap();
        let keys = row_group_keys(&df, &["nace", "fylke"]).unwrap();
        assert!(keys[0].is_some());
        assert_eq!(keys[1], None);
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let mut df = df![
            "id" => ["a", "b"],
            "x1" => [1.5, 2.0]
        ]
        .unwrap();

        write_csv(&mut df, &path).unwrap();
        let read = read_csv(&path).unwrap();

        assert_eq!(read.shape(), (2, 2));
        assert_eq!(numeric_values(&read, "x1").unwrap(), vec![Some(1.5), Some(2.0)]);
    }

    #[test]
    fn test_csv_dtype_override_keeps_leading_zeros() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kommuner.csv");
        let mut df = df![
            "id" => ["0301", "1103"],
            "x1" => [1.5, 2.0]
        ]
        .unwrap();
        write_csv(&mut df, &path).unwrap();

        let inferred = read_csv(&path).unwrap();
        assert!(is_integer_dtype(inferred.column("id").unwrap().dtype()));

        let read = read_csv_with_dtypes(&path, &[("id", DataType::String)]).unwrap();
        let ids = read.column("id").unwrap();
        assert_eq!(ids.dtype(), &DataType::String);
        assert_eq!(ids.get(0).unwrap().get_str(), Some("0301"));
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(1.0, 4.0), Some(25.0));
        assert_eq!(percentage(1.0, 0.0), None);
    }
}
