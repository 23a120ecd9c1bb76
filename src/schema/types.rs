//! Schema types

use crate::error::{Error, Result};
use crate::types::{JsonObject, Row};
use arrow::datatypes::{DataType, Field, Schema};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Primitive type of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// 64-bit signed integer
    Integer,
    /// 64-bit float (integers accepted)
    Float,
    /// Boolean
    Boolean,
    /// UTF-8 string
    String,
    /// List of strings
    StringList,
    /// Arbitrary nested JSON, stored as text
    Json,
}

impl FieldType {
    /// Whether a non-null JSON value fits this type
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::String => value.is_string(),
            Self::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            Self::Json => true,
        }
    }

    /// Arrow data type used by the Parquet sink
    pub fn arrow_type(self) -> DataType {
        match self {
            Self::Integer => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::Boolean => DataType::Boolean,
            Self::String | Self::Json => DataType::Utf8,
            Self::StringList => DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
        }
    }

    /// Column type used by the DuckDB sink
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::Integer => "BIGINT",
            Self::Float => "DOUBLE",
            Self::Boolean => "BOOLEAN",
            // lists and nested values are stored as JSON text
            Self::String | Self::StringList | Self::Json => "VARCHAR",
        }
    }

    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::StringList => "string_list",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    /// Column name
    pub name: &'static str,
    /// Primitive type
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether null (or absence) is allowed
    pub nullable: bool,
}

impl FieldDef {
    /// A field that must be present and non-null
    pub const fn required(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            nullable: false,
        }
    }

    /// A field that may be missing or null
    pub const fn optional(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            nullable: true,
        }
    }
}

/// Ordered set of declared fields for one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    fields: &'static [FieldDef],
}

impl TableSchema {
    /// Create a schema from a static field list
    pub const fn new(fields: &'static [FieldDef]) -> Self {
        Self { fields }
    }

    /// Declared fields, in column order
    pub fn fields(&self) -> &'static [FieldDef] {
        self.fields
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check if a field is declared
    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Coerce a mapped record to exactly the declared fields
    pub fn normalize(&self, mut record: JsonObject) -> Result<Row> {
        let mut row = Row::new();

        for field in self.fields {
            let value = record.remove(field.name).unwrap_or(Value::Null);

            if value.is_null() {
                if !field.nullable {
                    return Err(Error::mapping(
                        field.name,
                        "required field is missing or null",
                    ));
                }
            } else if !field.field_type.accepts(&value) {
                return Err(Error::mapping(
                    field.name,
                    format!("expected {}, got {}", field.field_type, json_kind(&value)),
                ));
            }

            row.insert(field.name.to_string(), value);
        }

        Ok(row)
    }

    /// Arrow schema for this table
    pub fn arrow_schema(&self) -> Schema {
        let fields: Vec<Field> = self
            .fields
            .iter()
            .map(|f| Field::new(f.name, f.field_type.arrow_type(), f.nullable))
            .collect();
        Schema::new(fields)
    }

    /// JSON description of the fields, as listed by the CLI
    pub fn describe(&self) -> Value {
        json!(self.fields)
    }
}

/// Name of a JSON value's kind, for error messages
fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
