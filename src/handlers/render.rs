//! Shared rendering utility for cloud-query handlers: every handler's result is either a pretty
//! JSON document or a fixed-column, truncated table, selected by the caller's `format` argument.

use serde_json::Value;

const MAX_COLUMN_WIDTH: usize = 32;

/// Render a list of uniformly-shaped JSON objects as a fixed-column table.
///
/// Columns are taken from the union of keys across every row, in first-seen order. Cell values
/// longer than [`MAX_COLUMN_WIDTH`] are truncated with a trailing ellipsis.
pub fn render_table(rows: &[Value]) -> String {
    if rows.is_empty() {
        return "(no rows)".to_string();
    }

    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        if let Some(obj) = row.as_object() {
            for key in obj.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
    }

    let cell = |row: &Value, col: &str| -> String {
        let raw = row
            .get(col)
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        if raw.chars().count() > MAX_COLUMN_WIDTH {
            let truncated: String = raw.chars().take(MAX_COLUMN_WIDTH.saturating_sub(1)).collect();
            format!("{}…", truncated)
        } else {
            raw
        }
    };

    let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
    for row in rows {
        for (i, col) in columns.iter().enumerate() {
            widths[i] = widths[i].max(cell(row, col).len());
        }
    }

    let mut out = String::new();
    for (i, col) in columns.iter().enumerate() {
        out.push_str(&format!("{:width$}  ", col, width = widths[i]));
    }
    out.push('\n');
    for row in rows {
        for (i, col) in columns.iter().enumerate() {
            out.push_str(&format!("{:width$}  ", cell(row, col), width = widths[i]));
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// Render a JSON value with the two-space-indented pretty printer used across the handler family.
pub fn render_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Dispatch to [`render_table`] or [`render_json`] based on a caller-supplied `format` string.
pub fn render(rows: &[Value], format: &str) -> String {
    match format {
        "json" => render_json(&Value::Array(rows.to_vec())),
        _ => render_table(rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_rows_render_placeholder() {
        assert_eq!(render_table(&[]), "(no rows)");
    }

    #[test]
    fn table_includes_every_column_header() {
        let rows = vec![json!({"name": "a", "region": "us-east-1"})];
        let table = render_table(&rows);
        assert!(table.contains("name"));
        assert!(table.contains("region"));
        assert!(table.contains("a"));
    }

    #[test]
    fn long_values_are_truncated() {
        let long = "x".repeat(80);
        let rows = vec![json!({"value": long})];
        let table = render_table(&rows);
        assert!(table.lines().nth(1).unwrap().contains('…'));
    }

    #[test]
    fn json_format_is_pretty_printed() {
        let rows = vec![json!({"a": 1})];
        let out = render(&rows, "json");
        assert!(out.contains("\n"));
        assert!(out.contains("\"a\": 1"));
    }
}
