use serde_json::{Map, Value};
use std::io;

use super::{flatten, result_of};

/// Write output as CSV to stdout.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match result_of(value) {
        Value::Object(result) => {
            if let Some(Value::Array(rows)) = result.get("results") {
                // Sensitivity rows
                write_array_csv(&mut wtr, rows);
            } else if let Some(Value::Array(samples)) = result.get("samples") {
                // Retained Monte Carlo draws, one per line
                let _ = wtr.write_record(["sample"]);
                for s in samples {
                    let _ = wtr.write_record([format_csv_value(s)]);
                }
            } else {
                write_fields_csv(&mut wtr, result);
            }
        }
        Value::Array(arr) => {
            write_array_csv(&mut wtr, arr);
        }
        other => {
            let _ = wtr.write_record([format_csv_value(other)]);
        }
    }

    let _ = wtr.flush();
}

fn write_fields_csv<W: io::Write>(wtr: &mut csv::Writer<W>, map: &Map<String, Value>) {
    let _ = wtr.write_record(["field", "value"]);
    for (key, val) in flatten(map) {
        let _ = wtr.write_record([key, format_csv_value(&val)]);
    }
}

fn write_array_csv<W: io::Write>(wtr: &mut csv::Writer<W>, arr: &[Value]) {
    if arr.is_empty() {
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
        let _ = wtr.write_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(*h).map(format_csv_value).unwrap_or_default())
                    .collect();
                let _ = wtr.write_record(&row);
            }
        }
    } else {
        for item in arr {
            let _ = wtr.write_record([format_csv_value(item)]);
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rows_written_with_header() {
        let rows = json!([
            {"parameter": "capex_per_kw", "elasticity": 0.6},
            {"parameter": "capacity_factor", "elasticity": -1.0}
        ]);
        let mut wtr = csv::Writer::from_writer(Vec::new());
        write_array_csv(&mut wtr, rows.as_array().unwrap());
        let text = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        assert_eq!(
            text,
            "elasticity,parameter\n0.6,capex_per_kw\n-1.0,capacity_factor\n"
        );
    }
}
