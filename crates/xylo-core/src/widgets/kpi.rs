//! KPI widget normalization.

use serde::Serialize;
use serde_json::{Number, Value};

use super::format::NumberFormat;

/// Label used when no label can be found.
pub const UNKNOWN_LABEL: &str = "Unknown";
/// Value used when no value can be found.
pub const MISSING_VALUE: &str = "N/A";

/// A KPI value exactly as received. Formatting happens only at display time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KpiValue {
    Number(Number),
    Text(String),
}

impl KpiValue {
    pub fn display(&self, format: &NumberFormat) -> String {
        match self {
            KpiValue::Number(n) => format.format(n),
            KpiValue::Text(s) => s.clone(),
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(KpiValue::Number(n.clone())),
            Value::String(s) if !s.is_empty() => Some(KpiValue::Text(s.clone())),
            Value::Bool(b) => Some(KpiValue::Text(b.to_string())),
            _ => None,
        }
    }
}

/// Direction a trend string points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendClass {
    Positive,
    Negative,
    Neutral,
}

impl TrendClass {
    /// Case-insensitive substring classification; positive markers win.
    pub fn classify(trend: &str) -> Self {
        let lower = trend.to_lowercase();
        if ["+", "up", "increase"].iter().any(|m| lower.contains(m)) {
            TrendClass::Positive
        } else if ["-", "down", "decrease"].iter().any(|m| lower.contains(m)) {
            TrendClass::Negative
        } else {
            TrendClass::Neutral
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            TrendClass::Positive => "▲",
            TrendClass::Negative => "▼",
            TrendClass::Neutral => "●",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub text: String,
    pub class: TrendClass,
}

/// A fully resolved KPI card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiWidget {
    pub label: String,
    pub value: KpiValue,
    pub trend: Option<Trend>,
}

impl KpiWidget {
    pub fn display_value(&self, format: &NumberFormat) -> String {
        self.value.display(format)
    }
}

/// Resolves a KPI payload. Fails only when the payload is not a mapping.
pub(super) fn normalize_kpi(payload: &Value) -> Result<KpiWidget, String> {
    if !payload.is_object() {
        return Err("Invalid KPI data".to_string());
    }

    let label = first_text(
        payload,
        &[&["label"][..], &["title"], &["kpi", "label"], &["payload", "label"]],
    )
    .unwrap_or_else(|| UNKNOWN_LABEL.to_string());

    let value = [&["value"][..], &["kpi", "value"], &["payload", "value"]]
        .iter()
        .find_map(|path| lookup(payload, path).and_then(KpiValue::from_json))
        .unwrap_or_else(|| KpiValue::Text(MISSING_VALUE.to_string()));

    let trend = first_text(
        payload,
        &[&["trend"][..], &["change"], &["kpi", "trend"], &["payload", "trend"]],
    )
    .map(|text| Trend {
        class: TrendClass::classify(&text),
        text,
    });

    Ok(KpiWidget {
        label,
        value,
        trend,
    })
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(key))
}

/// First non-empty string (or number rendered as text) along the given paths.
fn first_text(payload: &Value, paths: &[&[&str]]) -> Option<String> {
    paths.iter().find_map(|path| match lookup(payload, path)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
