//! Helpers for picking values out of API responses

use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue};

/// Value at a dotted path, or null when any segment is absent
pub(crate) fn pick(value: &JsonValue, path: &str) -> JsonValue {
    let mut current = value;
    for part in path.split('.') {
        match current.get(part) {
            Some(next) => current = next,
            None => return JsonValue::Null,
        }
    }
    current.clone()
}

/// The response body as an object
pub(crate) fn object<'a>(body: &'a JsonValue, what: &str) -> Result<&'a JsonObject> {
    body.as_object()
        .ok_or_else(|| Error::mapping("$", format!("expected {what} to be an object")))
}

/// Items of an optional array field; absent or null yields no items
pub(crate) fn items<'a>(value: &'a JsonValue, key: &str) -> Result<&'a [JsonValue]> {
    match value.get(key) {
        None | Some(JsonValue::Null) => Ok(&[]),
        Some(JsonValue::Array(items)) => Ok(items),
        Some(_) => Err(Error::mapping(key, "expected an array")),
    }
}

/// Names nested in each element of an array: `[{"type": {"name": ..}}]`
///
/// Absent arrays map to null so optional list fields stay null.
pub(crate) fn nested_names(value: &JsonValue, key: &str, inner: &str) -> Result<JsonValue> {
    if value.get(key).map_or(true, JsonValue::is_null) {
        return Ok(JsonValue::Null);
    }

    let path = if inner.is_empty() {
        "name".to_string()
    } else {
        format!("{inner}.name")
    };

    let names = items(value, key)?
        .iter()
        .map(|item| pick(item, &path))
        .filter(|name| !name.is_null())
        .collect();
    Ok(JsonValue::Array(names))
}

/// Object built from `[{ <key_path>: .., <value_path>: .. }]` pairs
pub(crate) fn keyed_map(
    value: &JsonValue,
    key: &str,
    key_path: &str,
    value_path: &str,
) -> Result<JsonValue> {
    if value.get(key).map_or(true, JsonValue::is_null) {
        return Ok(JsonValue::Null);
    }

    let mut map = JsonObject::new();
    for item in items(value, key)? {
        if let JsonValue::String(name) = pick(item, key_path) {
            map.insert(name, pick(item, value_path));
        }
    }
    Ok(JsonValue::Object(map))
}

/// The English entry of a localized list, falling back to the first entry
pub(crate) fn english_entry<'a>(value: &'a JsonValue, key: &str) -> Result<Option<&'a JsonValue>> {
    let entries = items(value, key)?;
    Ok(entries
        .iter()
        .find(|e| e.pointer("/language/name").and_then(JsonValue::as_str) == Some("en"))
        .or_else(|| entries.first()))
}

/// Build a record from `(column, value)` pairs
pub(crate) fn record<const N: usize>(pairs: [(&str, JsonValue); N]) -> JsonObject {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
