//! Row data to table markup, and back for display.

use serde_json::{Map, Value};
use tracing::warn;

pub const MISSING_VALUE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Columns come from the first record's keys, in order. Later records are
    /// read against those columns; absent or null values become `N/A`.
    pub fn from_records(records: &[Map<String, Value>]) -> Option<Self> {
        let first = records.first()?;
        let headers: Vec<String> = first.keys().cloned().collect();

        let mismatched = records
            .iter()
            .filter(|record| {
                record.len() != headers.len() || !headers.iter().all(|h| record.contains_key(h))
            })
            .count();
        if mismatched > 0 {
            warn!(
                mismatched,
                columns = headers.len(),
                "row data records do not share the first record's columns"
            );
        }

        let rows = records
            .iter()
            .map(|record| {
                headers
                    .iter()
                    .map(|header| cell_text(record.get(header)))
                    .collect()
            })
            .collect();

        Some(Self { headers, rows })
    }

    pub fn to_markup(&self) -> String {
        let mut markup = String::from("<table><tr>");
        for header in &self.headers {
            markup.push_str("<th>");
            markup.push_str(&escape(header));
            markup.push_str("</th>");
        }
        markup.push_str("</tr>");

        for row in &self.rows {
            markup.push_str("<tr>");
            for cell in row {
                markup.push_str("<td>");
                markup.push_str(&escape(cell));
                markup.push_str("</td>");
            }
            markup.push_str("</tr>");
        }

        markup.push_str("</table>");
        markup
    }

    /// Reads markup produced by [`Table::to_markup`]. Anything else is `None`.
    pub fn parse_markup(markup: &str) -> Option<Self> {
        let body = markup
            .trim()
            .strip_prefix("<table>")?
            .strip_suffix("</table>")?;

        let mut rows = body
            .split_terminator("</tr>")
            .map(|row| row.strip_prefix("<tr>"));

        let headers = parse_cells(rows.next()??, "th")?;
        let rows = rows
            .map(|row| row.and_then(|row| parse_cells(row, "td")))
            .collect::<Option<Vec<_>>>()?;

        Some(Self { headers, rows })
    }
}

/// Table markup for a non-empty result set.
pub fn render_table(records: &[Map<String, Value>]) -> Option<String> {
    Table::from_records(records).map(|table| table.to_markup())
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => MISSING_VALUE.to_string(),
        Some(value) => value_text(value),
    }
}

/// Display text of a JSON value: strings raw, anything else as compact JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn parse_cells(row: &str, tag: &str) -> Option<Vec<String>> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    row.split_terminator(close.as_str())
        .map(|cell| cell.strip_prefix(open.as_str()).map(unescape))
        .collect()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}
