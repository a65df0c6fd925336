//! Plain-text rendering of files, messages and widgets.

use std::io::{self, Write};

use comfy_table::{ContentArrangement, Table};
use serde_json::Value;
use xylo_core::chat::Message;
use xylo_core::registry::FileRegistry;
use xylo_core::widgets::{ChartWidget, KpiWidget, NumberFormat, Widget};

const TABLE_WIDTH: u16 = 100;

pub fn files_table(registry: &FileRegistry) -> String {
    let mut table = Table::new();
    table.set_width(TABLE_WIDTH);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(["", "ID", "Filename", "Source"]);

    let selected = registry.selected_id();
    for file in registry.files() {
        let marker = if selected == Some(file.id.as_str()) {
            "*"
        } else {
            ""
        };
        table.add_row([
            marker.to_string(),
            file.id.clone(),
            file.filename.clone(),
            file.source.to_string(),
        ]);
    }
    table.to_string()
}

pub fn message<W: Write>(out: &mut W, message: &Message, format: &NumberFormat) -> io::Result<()> {
    writeln!(out, "{}", message.content)?;
    for widget in &message.widgets {
        self::widget(out, widget, format)?;
    }
    Ok(())
}

pub fn widget<W: Write>(out: &mut W, widget: &Widget, format: &NumberFormat) -> io::Result<()> {
    match widget {
        Widget::Kpi(kpi) => writeln!(out, "{}", kpi_line(kpi, format)),
        Widget::Chart(chart) => writeln!(out, "{}", chart_block(chart, format)),
        Widget::Invalid(invalid) => writeln!(out, "[invalid widget] {}", invalid.reason),
    }
}

fn kpi_line(kpi: &KpiWidget, format: &NumberFormat) -> String {
    let mut line = format!("{}: {}", kpi.label, kpi.display_value(format));
    if let Some(trend) = &kpi.trend {
        line.push_str(&format!(" {} {}", trend.class.icon(), trend.text));
    }
    line
}

fn chart_block(chart: &ChartWidget, format: &NumberFormat) -> String {
    let heading = match &chart.title {
        Some(title) => format!("{title} ({} chart)", chart.kind.as_str()),
        None => format!("{} chart", chart.kind.as_str()),
    };

    if chart.rows.is_empty() {
        return format!("{heading}\n(no data)");
    }

    let mut table = Table::new();
    table.set_width(TABLE_WIDTH);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header([chart.x_key.as_str(), chart.y_key.as_str()]);
    for row in &chart.rows {
        table.add_row([
            cell(row.get(&chart.x_key), format),
            cell(row.get(&chart.y_key), format),
        ]);
    }
    format!("{heading}\n{table}")
}

fn cell(value: Option<&Value>, format: &NumberFormat) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => format.format(n),
        Some(other) => other.to_string(),
    }
}
