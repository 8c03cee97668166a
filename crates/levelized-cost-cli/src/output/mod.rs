pub mod csv_out;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::{Map, Value};

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Pretty-print JSON to stdout.
fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => log::error!("JSON serialization error: {}", e),
    }
}

/// The `result` member of a computation envelope, or the value itself.
pub(crate) fn result_of(value: &Value) -> &Value {
    value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value)
}

/// Flatten nested objects into dotted keys (`breakdown.capex`).
///
/// Arrays are left as leaves for the formatter to render.
pub(crate) fn flatten(map: &Map<String, Value>) -> Vec<(String, Value)> {
    let mut rows = Vec::new();
    flatten_into("", map, &mut rows);
    rows
}

fn flatten_into(prefix: &str, map: &Map<String, Value>, rows: &mut Vec<(String, Value)>) {
    for (key, val) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match val {
            Value::Object(inner) => flatten_into(&path, inner, rows),
            other => rows.push((path, other.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_uses_dotted_paths() {
        let value = json!({
            "lcoe_usd_per_kwh": 0.08,
            "breakdown": {"capex": 50.0, "opex": 30.0},
            "uncertainty": {"p10": null}
        });
        let rows = flatten(value.as_object().unwrap());
        let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["breakdown.capex", "breakdown.opex", "lcoe_usd_per_kwh", "uncertainty.p10"]
        );
    }

    #[test]
    fn test_result_of_unwraps_envelope() {
        let envelope = json!({"result": {"x": 1}, "warnings": []});
        assert_eq!(result_of(&envelope), &json!({"x": 1}));
        let bare = json!({"x": 1});
        assert_eq!(result_of(&bare), &bare);
    }
}
