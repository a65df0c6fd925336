//! Widget normalization.
//!
//! Backend widgets are loosely typed JSON. Everything here is total: any input
//! yields either a well-formed [`KpiWidget`] / [`ChartWidget`] or an explicit
//! [`Widget::Invalid`] carrying the reason. Nothing panics and nothing errors.

mod chart;
mod format;
mod kpi;

use serde::Serialize;
use serde_json::{Value, json};

pub use chart::{ChartKind, ChartWidget, DEFAULT_X_KEY, DEFAULT_Y_KEY, Row};
pub use format::NumberFormat;
pub use kpi::{KpiValue, KpiWidget, MISSING_VALUE, Trend, TrendClass, UNKNOWN_LABEL};

/// A renderable widget. Renderers match on the variant and never inspect raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "vis_type", rename_all = "lowercase")]
pub enum Widget {
    Kpi(KpiWidget),
    Chart(ChartWidget),
    Invalid(InvalidWidget),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidWidget {
    pub reason: String,
}

impl Widget {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Widget::Invalid(InvalidWidget {
            reason: reason.into(),
        })
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Widget::Invalid(_))
    }

    /// The `(vis_type, payload)` pair to store with `POST /widget/save`.
    ///
    /// The payload normalizes back to the same widget. Invalid widgets have
    /// nothing worth saving.
    pub fn to_saved(&self) -> Option<(&'static str, Value)> {
        match self {
            Widget::Kpi(kpi) => Some((
                "kpi",
                json!({
                    "label": kpi.label,
                    "value": kpi.value,
                    "trend": kpi.trend.as_ref().map(|t| t.text.as_str()),
                }),
            )),
            Widget::Chart(chart) => Some((
                "chart",
                json!({
                    "type": chart.kind.as_str(),
                    "title": chart.title,
                    "x_key": chart.x_key,
                    "y_key": chart.y_key,
                    "data": chart.rows,
                }),
            )),
            Widget::Invalid(_) => None,
        }
    }
}

/// Normalizes a raw widget object `{vis_type, payload}`.
pub fn normalize_widget(raw: &Value) -> Widget {
    let Some(fields) = raw.as_object() else {
        return Widget::invalid("Widget is not an object");
    };
    let vis_type = fields
        .get("vis_type")
        .or_else(|| fields.get("visType"))
        .and_then(Value::as_str);
    normalize_parts(vis_type, fields.get("payload").unwrap_or(&Value::Null))
}

/// Normalizes a widget given its tag and payload separately.
pub fn normalize_parts(vis_type: Option<&str>, payload: &Value) -> Widget {
    let result = match vis_type.map(str::to_lowercase).as_deref() {
        Some("kpi") => kpi::normalize_kpi(payload).map(Widget::Kpi),
        Some("chart") => chart::normalize_chart(payload).map(Widget::Chart),
        Some(other) => Err(format!("Unknown widget type: {other}")),
        None => Err("Widget has no type".to_string()),
    };
    result.unwrap_or_else(|reason| {
        tracing::warn!(%reason, "invalid widget");
        Widget::invalid(reason)
    })
}

/// Normalizes the `payload` of a dashboard reply into a widget list.
///
/// A sequence maps element-wise, a single object is one widget, null is no
/// widgets and any other scalar is one invalid widget.
pub fn normalize_widget_list(payload: &Value) -> Vec<Widget> {
    match payload {
        Value::Array(items) => items.iter().map(normalize_widget).collect(),
        Value::Object(_) => vec![normalize_widget(payload)],
        Value::Null => Vec::new(),
        _ => vec![Widget::invalid("Widget list is not a sequence")],
    }
}
