//! Row to Arrow conversion
//!
//! Converts normalized rows to Arrow RecordBatches laid out by the
//! resource's declared schema, and back.

use crate::error::{Error, Result};
use crate::schema::{FieldType, TableSchema};
use crate::types::{JsonValue, Row};
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, ListArray, StringArray,
};
use arrow::buffer::OffsetBuffer;
use arrow::datatypes::{DataType, Field};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Convert rows to a RecordBatch with the table's column layout
///
/// `Json` fields are stored as their JSON text.
pub fn rows_to_batch(rows: &[Row], schema: &TableSchema) -> Result<RecordBatch> {
    let arrow_schema = Arc::new(schema.arrow_schema());

    if rows.is_empty() {
        return Ok(RecordBatch::new_empty(arrow_schema));
    }

    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            let values: Vec<Option<&JsonValue>> = rows
                .iter()
                .map(|row| row.get(field.name).filter(|v| !v.is_null()))
                .collect();
            build_array(&values, field.field_type)
        })
        .collect::<Result<Vec<_>>>()?;

    RecordBatch::try_new(arrow_schema, columns)
        .map_err(|e| Error::sink(format!("Failed to create RecordBatch: {e}")))
}

/// Build an Arrow array from JSON values
fn build_array(values: &[Option<&JsonValue>], field_type: FieldType) -> Result<ArrayRef> {
    match field_type {
        FieldType::Boolean => {
            let arr: BooleanArray = values
                .iter()
                .map(|v| v.and_then(JsonValue::as_bool))
                .collect();
            Ok(Arc::new(arr))
        }

        FieldType::Integer => {
            let arr: Int64Array = values
                .iter()
                .map(|v| v.and_then(JsonValue::as_i64))
                .collect();
            Ok(Arc::new(arr))
        }

        FieldType::Float => {
            let arr: Float64Array = values
                .iter()
                .map(|v| v.and_then(JsonValue::as_f64))
                .collect();
            Ok(Arc::new(arr))
        }

        FieldType::String => {
            let arr: StringArray = values
                .iter()
                .map(|v| v.and_then(JsonValue::as_str))
                .collect();
            Ok(Arc::new(arr))
        }

        FieldType::Json => {
            let arr: StringArray = values.iter().map(|v| v.map(ToString::to_string)).collect();
            Ok(Arc::new(arr))
        }

        FieldType::StringList => build_list_array(values),
    }
}

/// Build a list-of-strings array; absent lists are null
fn build_list_array(values: &[Option<&JsonValue>]) -> Result<ArrayRef> {
    let mut items: Vec<Option<&str>> = Vec::new();
    let mut offsets: Vec<i32> = vec![0];
    let mut validity = Vec::with_capacity(values.len());

    for value in values {
        match value {
            Some(JsonValue::Array(arr)) => {
                items.extend(arr.iter().map(JsonValue::as_str));
                validity.push(true);
            }
            _ => validity.push(false),
        }
        let offset = i32::try_from(items.len())
            .map_err(|_| Error::sink("List column too large for i32 offsets"))?;
        offsets.push(offset);
    }

    let field = Arc::new(Field::new("item", DataType::Utf8, true));
    let list = ListArray::try_new(
        field,
        OffsetBuffer::new(offsets.into()),
        Arc::new(StringArray::from(items)),
        Some(validity.into()),
    )?;
    Ok(Arc::new(list))
}

/// Convert a RecordBatch written by [`rows_to_batch`] back to rows
///
/// `Json` columns are parsed back into JSON values.
pub fn batch_to_rows(batch: &RecordBatch, schema: &TableSchema) -> Result<Vec<Row>> {
    let mut rows = vec![Row::new(); batch.num_rows()];

    for field in schema.fields() {
        let column = batch
            .column_by_name(field.name)
            .ok_or_else(|| Error::sink(format!("Column '{}' missing from batch", field.name)))?;

        for (row_idx, row) in rows.iter_mut().enumerate() {
            let value = array_value_to_json(column.as_ref(), row_idx, field.field_type)?;
            row.insert(field.name.to_string(), value);
        }
    }

    Ok(rows)
}

/// Convert a single array element to JSON
fn array_value_to_json(array: &dyn Array, row: usize, field_type: FieldType) -> Result<JsonValue> {
    if array.is_null(row) {
        return Ok(JsonValue::Null);
    }

    let value = match field_type {
        FieldType::Boolean => JsonValue::Bool(downcast::<BooleanArray>(array)?.value(row)),
        FieldType::Integer => JsonValue::from(downcast::<Int64Array>(array)?.value(row)),
        FieldType::Float => JsonValue::from(downcast::<Float64Array>(array)?.value(row)),
        FieldType::String => JsonValue::from(downcast::<StringArray>(array)?.value(row)),
        FieldType::Json => serde_json::from_str(downcast::<StringArray>(array)?.value(row))?,
        FieldType::StringList => {
            let inner = downcast::<ListArray>(array)?.value(row);
            let strings = downcast::<StringArray>(inner.as_ref())?;
            JsonValue::Array(
                (0..strings.len())
                    .map(|i| {
                        if strings.is_null(i) {
                            JsonValue::Null
                        } else {
                            JsonValue::from(strings.value(i))
                        }
                    })
                    .collect(),
            )
        }
    };

    Ok(value)
}

fn downcast<T: 'static>(array: &dyn Array) -> Result<&T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        Error::sink(format!(
            "Failed to downcast {} column to {}",
            array.data_type(),
            std::any::type_name::<T>()
        ))
    })
}
