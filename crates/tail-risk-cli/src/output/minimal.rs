use serde_json::Value;

/// Headline fields, in priority order.
const PRIORITY_KEYS: [&str; 4] = ["es", "var", "es_historical", "es_student_t"];

/// Row fields that name a line of output.
const LABEL_KEYS: [&str; 4] = ["model", "date", "alpha", "asset"];

/// Print just the key numbers: the headline ES/VaR of a single result, or
/// one `label: value` line per row of a report.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let Value::Object(map) = result_obj else {
        println!("{}", format_minimal(result_obj));
        return;
    };

    for key in PRIORITY_KEYS {
        if let Some(val) = map.get(key) {
            if !val.is_null() {
                println!("{}", format_minimal(val));
                return;
            }
        }
    }

    for field in ["rows", "results"] {
        if let Some(Value::Array(rows)) = map.get(field) {
            for row in rows {
                println!("{}", row_line(row));
            }
            return;
        }
    }

    if let Some((key, val)) = map.iter().next() {
        println!("{}: {}", key, format_minimal(val));
    }
}

fn row_line(row: &Value) -> String {
    let label = LABEL_KEYS
        .iter()
        .filter_map(|k| row.get(*k))
        .map(format_minimal)
        .collect::<Vec<_>>()
        .join(" ");
    let headline = ["es", "es_historical", "kupiec"]
        .iter()
        .find_map(|k| row.get(*k))
        .map(|v| match v.get("p_value") {
            Some(p) => format!("kupiec_p={}", format_minimal(p)),
            None => format_minimal(v),
        })
        .unwrap_or_default();
    format!("{label}: {headline}")
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
