use serde_json::Value;

use super::result_of;

/// Headline figures, most specific first.
const PRIORITY_KEYS: [&str; 7] = [
    "lcoe_usd_per_kwh",
    "lcos_usd_per_kwh",
    "combined_lcoe_kwh",
    "p50",
    "base_output",
    "kwh",
    "kw",
];

/// Print just the key answer value from the output.
///
/// Looks for a headline field in the result and then in its nested
/// objects, falling back to the first field.
pub fn print_minimal(value: &Value) {
    let result_obj = result_of(value);

    if let Some(val) = headline(result_obj) {
        println!("{}", format_minimal(val));
        return;
    }

    if let Value::Object(map) = result_obj {
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
}

fn headline(value: &Value) -> Option<&Value> {
    let map = value.as_object()?;
    PRIORITY_KEYS
        .iter()
        .find_map(|key| map.get(*key).filter(|v| !v.is_null()))
        .or_else(|| {
            map.values()
                .filter(|v| v.is_object())
                .find_map(|nested| headline(nested))
        })
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
