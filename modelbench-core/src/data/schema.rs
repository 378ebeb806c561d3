//! Schema definition and type inference for datasets.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    String,
    Boolean,
    Null,
    Unknown,
}

impl ColumnType {
    /// SQLite column affinity used when the column is persisted.
    pub fn sql_affinity(self) -> &'static str {
        match self {
            ColumnType::Integer | ColumnType::Boolean => "INTEGER",
            ColumnType::Float => "REAL",
            ColumnType::String => "TEXT",
            ColumnType::Null | ColumnType::Unknown => "",
        }
    }
}

/// Schema definition for a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub columns: Vec<ColumnSchema>,
}

/// Schema for a single column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub dtype: ColumnType,
}

/// Infer column type from a sample of values.
pub fn infer_column_type(values: &[Value]) -> ColumnType {
    let non_null: Vec<_> = values.iter().filter(|v| !v.is_null()).collect();
    if non_null.is_empty() {
        return ColumnType::Null;
    }

    let mut has_int = false;
    let mut has_float = false;
    let mut has_bool = false;
    let mut has_string = false;

    for v in &non_null {
        match v {
            Value::Number(n) => {
                if n.is_f64() {
                    has_float = true;
                } else {
                    has_int = true;
                }
            }
            Value::Bool(_) => has_bool = true,
            Value::String(_) => has_string = true,
            _ => {}
        }
    }

    if has_string {
        return ColumnType::String;
    }
    if has_float {
        return ColumnType::Float;
    }
    if has_int {
        return ColumnType::Integer;
    }
    if has_bool {
        return ColumnType::Boolean;
    }
    ColumnType::Unknown
}

/// Infer schema from a data batch.
pub fn infer_schema(columns: &[String], rows: &[Vec<Value>]) -> SchemaDefinition {
    let mut schema_columns = Vec::new();

    for (i, col_name) in columns.iter().enumerate() {
        let values: Vec<Value> = rows.iter().filter_map(|row| row.get(i).cloned()).collect();

        schema_columns.push(ColumnSchema {
            name: col_name.clone(),
            dtype: infer_column_type(&values),
        });
    }

    SchemaDefinition {
        columns: schema_columns,
    }
}

/// Parse a raw text cell. Tokens listed in `na_values` become null.
pub fn parse_cell(raw: &str, na_values: &[String]) -> Value {
    let s = raw.trim().trim_matches('"');
    if na_values.iter().any(|na| na == s) {
        return Value::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        Value::Number(i.into())
    } else if let Ok(f) = s.parse::<f64>() {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    } else if s == "true" || s == "false" {
        Value::Bool(s == "true")
    } else {
        Value::String(s.to_string())
    }
}
