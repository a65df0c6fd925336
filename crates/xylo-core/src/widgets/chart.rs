//! Chart widget normalization.
//!
//! Row recovery and axis key inference turn whatever the backend produced
//! into rows plus an x/y key pair that are guaranteed to be usable.

use serde::Serialize;
use serde_json::{Map, Value};

/// Default category key when nothing better can be resolved.
pub const DEFAULT_X_KEY: &str = "label";
/// Default value key when nothing better can be resolved.
pub const DEFAULT_Y_KEY: &str = "value";

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Scatter,
}

impl ChartKind {
    /// Parses a chart type name, case-insensitively. `column` is an alias of `bar`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "bar" | "column" => Some(ChartKind::Bar),
            "line" => Some(ChartKind::Line),
            "pie" => Some(ChartKind::Pie),
            "scatter" => Some(ChartKind::Scatter),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
            ChartKind::Scatter => "scatter",
        }
    }
}

/// A chart ready for drawing: keys are resolved and rows are mappings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartWidget {
    pub kind: ChartKind,
    pub title: Option<String>,
    pub x_key: String,
    pub y_key: String,
    pub rows: Vec<Row>,
}

pub(super) fn normalize_chart(payload: &Value) -> Result<ChartWidget, String> {
    let Some(fields) = payload.as_object() else {
        return Err("Chart payload is not an object".to_string());
    };

    let kind = match fields.get("type").and_then(Value::as_str) {
        None => ChartKind::Bar,
        Some(name) => {
            ChartKind::parse(name).ok_or_else(|| format!("Unsupported chart type: {name}"))?
        }
    };

    let rows_field = fields
        .get("data")
        .or_else(|| fields.get("rows"))
        .filter(|v| !v.is_null())
        .ok_or_else(|| "Chart payload has no data".to_string())?;
    let rows = recover_rows(rows_field)?;

    let declared_x = declared_key(fields, &["x_key", "xKey"]);
    let declared_y = declared_key(fields, &["y_key", "yKey"]);
    let (x_key, y_key) = resolve_keys(rows.first(), declared_x, declared_y);

    let title = fields
        .get("title")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    Ok(ChartWidget {
        kind,
        title,
        x_key,
        y_key,
        rows,
    })
}

/// Turns the rows field into a row sequence.
///
/// Sequences keep only their mapping elements. A mapping is recovered either
/// through its first nested sequence or, if every value is a scalar, as one
/// `{label, value}` row per entry.
fn recover_rows(field: &Value) -> Result<Vec<Row>, String> {
    match field {
        Value::Array(items) => Ok(object_rows(items)),
        Value::Object(map) => {
            if let Some(items) = map.values().find_map(Value::as_array) {
                tracing::debug!("chart rows recovered from nested sequence");
                return Ok(object_rows(items));
            }
            if map.values().all(is_scalar) {
                tracing::debug!(entries = map.len(), "chart rows recovered from flat mapping");
                return Ok(map
                    .iter()
                    .map(|(key, value)| {
                        let mut row = Row::new();
                        row.insert(DEFAULT_X_KEY.to_string(), Value::String(key.clone()));
                        row.insert(DEFAULT_Y_KEY.to_string(), value.clone());
                        row
                    })
                    .collect());
            }
            Err("Chart data is not a sequence".to_string())
        }
        other => Err(format!(
            "Chart data format is invalid (expected a sequence, got {})",
            json_type_name(other)
        )),
    }
}

fn object_rows(items: &[Value]) -> Vec<Row> {
    let rows: Vec<Row> = items
        .iter()
        .filter_map(|item| item.as_object().cloned())
        .collect();
    if rows.len() != items.len() {
        tracing::warn!(
            dropped = items.len() - rows.len(),
            "dropped chart rows that are not mappings"
        );
    }
    rows
}

fn declared_key(fields: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| fields.get(*name).and_then(Value::as_str))
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}

/// Resolves the axis keys against the first row.
///
/// A declared key is kept when the first row has it; otherwise x falls back to
/// the first string field and y to the first number field, then to position.
fn resolve_keys(
    first: Option<&Row>,
    declared_x: Option<String>,
    declared_y: Option<String>,
) -> (String, String) {
    let declared_x = declared_x.unwrap_or_else(|| DEFAULT_X_KEY.to_string());
    let declared_y = declared_y.unwrap_or_else(|| DEFAULT_Y_KEY.to_string());
    let Some(row) = first.filter(|row| !row.is_empty()) else {
        return (declared_x, declared_y);
    };

    let keys: Vec<&String> = row.keys().collect();

    let x_key = if row.contains_key(&declared_x) {
        declared_x
    } else {
        row.iter()
            .find(|(_, v)| v.is_string())
            .map(|(k, _)| k)
            .unwrap_or(keys[0])
            .clone()
    };

    let y_key = if row.contains_key(&declared_y) {
        declared_y
    } else {
        row.iter()
            .find(|(_, v)| v.is_number())
            .map(|(k, _)| k)
            .or_else(|| keys.get(1).copied())
            .unwrap_or(keys[0])
            .clone()
    };

    (x_key, y_key)
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
