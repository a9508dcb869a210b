use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct RecordOutput<'a, T: Serialize> {
    record: &'a str,
    host: &'a str,
    data: &'a T,
}

/// Print one record: a JSON line, a field table, or a `key=value` line.
pub fn print_record<T: Serialize>(record: &str, host: &str, data: &T, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = RecordOutput { record, host, data };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![record.to_uppercase(), host.to_string()]);
            for (field, value) in fields(data) {
                table.add_row(vec![field, value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line = fields(data)
                .into_iter()
                .map(|(field, value)| format!("{field}={value}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("{record} {line}");
        }
    }
}

/// Flatten a record into display rows, sorted by field name.
/// Non-object values become one `value` row.
fn fields<T: Serialize>(data: &T) -> Vec<(String, String)> {
    match serde_json::to_value(data) {
        Ok(Value::Object(map)) => map
            .into_iter()
            .map(|(field, value)| (field, display_value(&value)))
            .collect(),
        Ok(other) => vec![("value".to_string(), display_value(&other))],
        Err(_) => Vec::new(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(text) => text.clone(),
        // Function arrays read better as the list of active indices.
        Value::Array(items) if items.iter().all(Value::is_boolean) => {
            let active = items
                .iter()
                .enumerate()
                .filter(|(_, on)| on.as_bool() == Some(true))
                .map(|(index, _)| format!("F{index}"))
                .collect::<Vec<_>>();
            if active.is_empty() {
                "none".to_string()
            } else {
                active.join(",")
            }
        }
        other => other.to_string(),
    }
}
