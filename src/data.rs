//! Product records, feature coercion and payload loading

use crate::error::{CriticalError, CriticalResult};
use anyhow::Context;
use ndarray::Array2;
use polars::prelude::{CsvReadOptions, DataFrame, DataType, SerReader, Series};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Wire name of the product identifier
pub const NAME_FIELD: &str = "producto";
/// Wire name of the stock level
pub const STOCK_FIELD: &str = "stock";
/// Wire name of the risk score
pub const RISK_FIELD: &str = "riesgo";
/// Wire name of the repetition count
pub const REPETITIONS_FIELD: &str = "repeticiones";

/// Number of clustering features per product
pub const FEATURE_COUNT: usize = 3;
/// Column of the risk feature
pub const RISK: usize = 0;
/// Column of the stock feature
pub const STOCK: usize = 1;
/// Column of the repetitions feature
pub const REPETITIONS: usize = 2;

/// Wire names of the feature columns, indexed by column
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [RISK_FIELD, STOCK_FIELD, REPETITIONS_FIELD];

/// A validated inventory product
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub name: String,
    pub stock: f64,
    pub risk: f64,
    pub repetitions: u64,
}

impl Item {
    pub fn new(name: impl Into<String>, risk: f64, stock: f64, repetitions: u64) -> Self {
        Self {
            name: name.into(),
            stock,
            risk,
            repetitions,
        }
    }

    /// Feature vector in column order (risk, stock, repetitions)
    pub fn features(&self) -> [f64; FEATURE_COUNT] {
        [self.risk, self.stock, self.repetitions as f64]
    }
}

/// A product as received, before numeric coercion.
///
/// Numeric fields are kept as raw JSON values so that strings such as
/// `"0.5"` can be accepted and everything else reported with context.
/// All four fields are required; a missing one fails deserialization.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ItemRecord {
    #[serde(rename = "producto")]
    pub name: String,
    pub stock: Value,
    #[serde(rename = "riesgo")]
    pub risk: Value,
    #[serde(rename = "repeticiones")]
    pub repetitions: Value,
}

impl ItemRecord {
    /// Coerce the raw fields into an [`Item`].
    ///
    /// `row` is the record's position in the payload and is only used for
    /// error reporting.
    pub fn coerce(&self, row: usize) -> CriticalResult<Item> {
        let risk = coerce_real(&self.risk, row, RISK_FIELD)?;
        let stock = coerce_real(&self.stock, row, STOCK_FIELD)?;
        if stock < 0.0 {
            return Err(invalid_feature(
                row,
                STOCK_FIELD,
                format!("stock must be non-negative, got {}", stock),
            ));
        }
        let repetitions = coerce_count(&self.repetitions, row, REPETITIONS_FIELD)?;

        Ok(Item {
            name: self.name.clone(),
            stock,
            risk,
            repetitions,
        })
    }
}

impl From<&Item> for ItemRecord {
    fn from(item: &Item) -> Self {
        Self {
            name: item.name.clone(),
            stock: Value::from(item.stock),
            risk: Value::from(item.risk),
            repetitions: Value::from(item.repetitions),
        }
    }
}

/// Coerce every record, failing on the first invalid one
pub fn coerce_records(records: &[ItemRecord]) -> CriticalResult<Vec<Item>> {
    records
        .iter()
        .enumerate()
        .map(|(row, record)| record.coerce(row))
        .collect()
}

fn invalid_feature(row: usize, field: &'static str, reason: String) -> CriticalError {
    CriticalError::InvalidFeature { row, field, reason }
}

/// Accepts JSON numbers and numeric strings; rejects NaN and infinities.
fn coerce_real(value: &Value, row: usize, field: &'static str) -> CriticalResult<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(invalid_feature(
            row,
            field,
            format!("expected a number, got {}", value),
        )),
    }
}

/// Accepts non-negative integers, integer strings, and non-negative floats
/// (truncated toward zero).
fn coerce_count(value: &Value, row: usize, field: &'static str) -> CriticalResult<u64> {
    let parsed = match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v.trunc() as u64)
        }),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };

    parsed.ok_or_else(|| {
        invalid_feature(
            row,
            field,
            format!("expected a non-negative integer, got {}", value),
        )
    })
}

/// Build the (n_items, 3) feature matrix in raw, unscaled units
pub fn feature_matrix(items: &[Item]) -> Array2<f64> {
    Array2::from_shape_fn((items.len(), FEATURE_COUNT), |(row, col)| {
        items[row].features()[col]
    })
}

/// Output projection of a product in the critical cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "producto")]
    pub name: String,
    #[serde(rename = "riesgo")]
    pub risk: f64,
    pub stock: f64,
    #[serde(rename = "repeticiones")]
    pub repetitions: u64,
}

impl From<&Item> for Suggestion {
    fn from(item: &Item) -> Self {
        Self {
            name: item.name.clone(),
            risk: item.risk,
            stock: item.stock,
            repetitions: item.repetitions,
        }
    }
}

/// Response body: `{"sugerencias": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionResponse {
    #[serde(rename = "sugerencias")]
    pub suggestions: Vec<Suggestion>,
}

/// Payload encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum InputFormat {
    /// Pick by file extension, defaulting to JSON
    #[default]
    Auto,
    Json,
    Csv,
}

impl InputFormat {
    /// Resolve `Auto` against the file extension
    pub fn resolve(self, path: &Path) -> InputFormat {
        match self {
            InputFormat::Auto => match path.extension().and_then(|ext| ext.to_str()) {
                Some(ext) if ext.eq_ignore_ascii_case("csv") => InputFormat::Csv,
                _ => InputFormat::Json,
            },
            other => other,
        }
    }
}

/// Load product records from a JSON or CSV file
pub fn load_records(path: &Path, format: InputFormat) -> crate::Result<Vec<ItemRecord>> {
    match format.resolve(path) {
        InputFormat::Csv => load_csv(path),
        _ => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read '{}'", path.display()))?;
            parse_json_payload(&text)
        }
    }
}

/// Parse a JSON payload.
///
/// Accepts either `{"productos": [...]}` or a bare array of records.
pub fn parse_json_payload(text: &str) -> crate::Result<Vec<ItemRecord>> {
    let payload: Value = serde_json::from_str(text).context("Payload is not valid JSON")?;

    let records = match payload {
        Value::Object(mut object) => object.remove("productos").ok_or_else(|| {
            anyhow::anyhow!("Invalid format: expected {{\"productos\": [...]}}")
        })?,
        array @ Value::Array(_) => array,
        _ => anyhow::bail!("Invalid format: expected {{\"productos\": [...]}}"),
    };

    serde_json::from_value(records).context(
        "Every product needs the fields: producto, stock, riesgo, repeticiones",
    )
}

/// Load product records from a CSV file with a header row
pub fn load_csv(path: &Path) -> crate::Result<Vec<ItemRecord>> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .with_context(|| format!("Failed to read CSV '{}'", path.display()))?;

    records_from_frame(&df)
}

/// Convert a DataFrame with the four wire columns into records
fn records_from_frame(df: &DataFrame) -> crate::Result<Vec<ItemRecord>> {
    let names = text_column(column(df, NAME_FIELD)?)?;
    let stock = value_column(column(df, STOCK_FIELD)?)?;
    let risk = value_column(column(df, RISK_FIELD)?)?;
    let repetitions = value_column(column(df, REPETITIONS_FIELD)?)?;

    let mut records = Vec::with_capacity(df.height());
    for (row, name) in names.into_iter().enumerate() {
        let name = name.ok_or_else(|| anyhow::anyhow!("Missing product name in row {}", row))?;
        records.push(ItemRecord {
            name,
            stock: stock[row].clone(),
            risk: risk[row].clone(),
            repetitions: repetitions[row].clone(),
        });
    }

    Ok(records)
}

fn column<'a>(df: &'a DataFrame, name: &str) -> crate::Result<&'a Series> {
    df.column(name)
        .map_err(|_| anyhow::anyhow!("Missing required column: {}", name))
}

fn text_column(series: &Series) -> crate::Result<Vec<Option<String>>> {
    let strings = series.cast(&DataType::String)?;
    Ok(strings
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Numeric columns become JSON numbers, anything else stays text so the
/// coercion step can accept or reject it.
fn value_column(series: &Series) -> crate::Result<Vec<Value>> {
    if series.dtype().is_numeric() {
        let floats = series.cast(&DataType::Float64)?;
        Ok(floats
            .f64()?
            .into_iter()
            .map(|v| v.map(Value::from).unwrap_or(Value::Null))
            .collect())
    } else {
        Ok(text_column(series)?
            .into_iter()
            .map(|v| v.map(Value::String).unwrap_or(Value::Null))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn record(risk: Value, stock: Value, repetitions: Value) -> ItemRecord {
        ItemRecord {
            name: "P1".to_string(),
            stock,
            risk,
            repetitions,
        }
    }

    #[test]
    fn test_coerce_numbers_and_numeric_strings() {
        let item = record(json!("0.75"), json!(12), json!("4")).coerce(0).unwrap();
        assert_eq!(item, Item::new("P1", 0.75, 12.0, 4));

        // Floats are truncated like an integer cast
        let item = record(json!(0.1), json!(3.5), json!(2.9)).coerce(0).unwrap();
        assert_eq!(item.repetitions, 2);
        assert_eq!(item.stock, 3.5);
    }

    #[test]
    fn test_non_numeric_risk_is_invalid_feature() {
        let err = record(json!("high"), json!(1), json!(1)).coerce(3).unwrap_err();
        match err {
            CriticalError::InvalidFeature { row, field, .. } => {
                assert_eq!(row, 3);
                assert_eq!(field, RISK_FIELD);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_null_negative_and_fractional_counts() {
        assert!(record(json!(0.5), json!(null), json!(1)).coerce(0).is_err());
        assert!(record(json!(0.5), json!(-1.0), json!(1)).coerce(0).is_err());
        assert!(record(json!(0.5), json!(1), json!(-2)).coerce(0).is_err());
        assert!(record(json!(0.5), json!(1), json!("2.5")).coerce(0).is_err());
        assert!(record(json!(true), json!(1), json!(1)).coerce(0).is_err());
        assert!(record(json!("NaN"), json!(1), json!(1)).coerce(0).is_err());
    }

    #[test]
    fn test_coerce_records_reports_first_bad_row() {
        let records = vec![
            record(json!(0.5), json!(1), json!(1)),
            record(json!(0.5), json!("lots"), json!(1)),
        ];
        let err = coerce_records(&records).unwrap_err();
        assert_eq!(
            err,
            CriticalError::InvalidFeature {
                row: 1,
                field: STOCK_FIELD,
                reason: "expected a number, got \"lots\"".to_string(),
            }
        );
    }

    #[test]
    fn test_feature_matrix_column_order() {
        let items = vec![Item::new("A", 0.9, 0.0, 10), Item::new("B", 0.1, 100.0, 0)];
        let features = feature_matrix(&items);
        assert_eq!(features.shape(), &[2, 3]);
        assert_eq!(features[[0, RISK]], 0.9);
        assert_eq!(features[[0, STOCK]], 0.0);
        assert_eq!(features[[0, REPETITIONS]], 10.0);
        assert_eq!(features[[1, STOCK]], 100.0);
    }

    #[test]
    fn test_parse_wrapped_and_bare_payloads() {
        let wrapped = r#"{"productos": [{"producto": "A", "stock": 1, "riesgo": 0.5, "repeticiones": 2}]}"#;
        let bare = r#"[{"producto": "A", "stock": 1, "riesgo": 0.5, "repeticiones": 2}]"#;
        assert_eq!(
            parse_json_payload(wrapped).unwrap(),
            parse_json_payload(bare).unwrap()
        );
    }

    #[test]
    fn test_parse_rejects_missing_key_and_fields() {
        assert!(parse_json_payload(r#"{"items": []}"#).is_err());
        assert!(parse_json_payload(r#"{"productos": [{"producto": "A", "stock": 1}]}"#).is_err());
        assert!(parse_json_payload("42").is_err());
        assert!(parse_json_payload("not json").is_err());
    }

    #[test]
    fn test_suggestion_serializes_wire_names_in_order() {
        let suggestion = Suggestion::from(&Item::new("A", 0.5, 2.0, 3));
        let text = serde_json::to_string(&suggestion).unwrap();
        assert_eq!(
            text,
            r#"{"producto":"A","riesgo":0.5,"stock":2.0,"repeticiones":3}"#
        );
    }

    #[test]
    fn test_input_format_resolution() {
        assert_eq!(InputFormat::Auto.resolve(Path::new("a.CSV")), InputFormat::Csv);
        assert_eq!(InputFormat::Auto.resolve(Path::new("a.json")), InputFormat::Json);
        assert_eq!(InputFormat::Auto.resolve(Path::new("a")), InputFormat::Json);
        assert_eq!(InputFormat::Json.resolve(Path::new("a.csv")), InputFormat::Json);
    }

    #[test]
    fn test_load_csv_matches_json() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "producto,stock,riesgo,repeticiones").unwrap();
        writeln!(file, "P1,0,0.9,10").unwrap();
        writeln!(file, "P2,100,0.1,0").unwrap();
        file.flush().unwrap();

        let from_csv = coerce_records(&load_records(file.path(), InputFormat::Auto).unwrap()).unwrap();
        assert_eq!(
            from_csv,
            vec![Item::new("P1", 0.9, 0.0, 10), Item::new("P2", 0.1, 100.0, 0)]
        );
    }

    #[test]
    fn test_load_csv_keeps_text_for_coercion() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "producto,stock,riesgo,repeticiones").unwrap();
        writeln!(file, "P1,0,high,10").unwrap();
        writeln!(file, "P2,100,0.1,0").unwrap();
        file.flush().unwrap();

        let records = load_records(file.path(), InputFormat::Csv).unwrap();
        assert_eq!(records[0].risk, Value::String("high".to_string()));
        assert!(matches!(
            coerce_records(&records),
            Err(CriticalError::InvalidFeature { row: 0, field: RISK_FIELD, .. })
        ));
    }

    #[test]
    fn test_load_csv_missing_column() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "producto,stock,riesgo").unwrap();
        writeln!(file, "P1,0,0.9").unwrap();
        file.flush().unwrap();

        assert!(load_records(file.path(), InputFormat::Csv).is_err());
    }
}
