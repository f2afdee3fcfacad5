use serde_json::Value;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::core::monitor::{Details, MetricData};

/// Widest a table cell may get before it is truncated
pub const MAX_CELL_WIDTH: usize = 40;

/// Format a JSON value for a table cell or summary line
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "N/A".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format!("{:.2}", f),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => format!("[{} items]", items.len()),
        Value::Object(map) => format!("{{{} fields}}", map.len()),
    }
}

/// Cut `text` to `max` display columns, marking the cut with `…`
pub fn truncate(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut width = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if width + w + 1 > max {
            break;
        }
        width += w;
        out.push(c);
    }
    out.push('…');
    out
}

fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.width());
    format!("{}{}", text, " ".repeat(fill))
}

/// Render a details table as aligned text lines: header, rule, rows
pub fn format_table(details: &Details) -> Vec<String> {
    let cells: Vec<Vec<String>> = details
        .rows
        .iter()
        .map(|row| row.iter().map(|c| truncate(c, MAX_CELL_WIDTH)).collect())
        .collect();

    let mut widths: Vec<usize> = details.columns.iter().map(|c| c.width()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.width());
            }
        }
    }

    let join = |row: &[String]| -> String {
        row.iter()
            .enumerate()
            .map(|(i, cell)| pad(cell, widths.get(i).copied().unwrap_or(0)))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(cells.len() + 2);
    lines.push(join(details.columns.as_slice()));
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in &cells {
        lines.push(join(row.as_slice()));
    }
    lines
}

/// Details for metrics without their own rendering: the first list of
/// records becomes a table, scalar fields become a two-column table.
pub fn generic_details(data: &MetricData) -> Details {
    let records = data.fields().values().find_map(|v| match v {
        Value::Array(items) if items.first().map(Value::is_object).unwrap_or(false) => Some(items),
        _ => None,
    });

    if let Some(records) = records {
        let columns: Vec<String> = records
            .first()
            .and_then(Value::as_object)
            .map(|first| first.keys().cloned().collect())
            .unwrap_or_default();
        let mut details = Details::new(columns.iter().map(String::as_str));
        for record in records {
            details.push_row(
                columns
                    .iter()
                    .map(|c| record.get(c).map(format_value).unwrap_or_default())
                    .collect(),
            );
        }
        return details;
    }

    let mut details = Details::new(["Field", "Value"]);
    for (key, value) in data.fields() {
        details.push_row(vec![key.clone(), format_value(value)]);
    }
    details
}
