use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Format output as tables: scalar result fields first, then one table per
/// nested record or list of records.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => match map.get("result") {
            Some(result) => print_result_table(result, map),
            None => print_object(map),
        },
        Value::Array(arr) => print_array_table(arr),
        _ => println!("{value}"),
    }
}

fn print_result_table(result: &Value, envelope: &Map<String, Value>) {
    match result {
        Value::Object(res_map) => print_object(res_map),
        other => println!("{}", format_value(other)),
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {s}");
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {meth}");
    }
}

fn print_object(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    let mut has_scalars = false;
    for (key, val) in map {
        if !is_record_like(val) {
            builder.push_record([key.as_str(), &format_value(val)]);
            has_scalars = true;
        }
    }
    if has_scalars {
        println!("{}", Table::from(builder));
    }

    for (key, val) in map {
        match val {
            Value::Object(inner) => {
                println!("\n{key}:");
                print_object(inner);
            }
            Value::Array(arr) if is_record_like(val) => {
                println!("\n{key}:");
                print_array_table(arr);
            }
            _ => {}
        }
    }
}

/// Nested objects and non-empty arrays of objects get their own table.
fn is_record_like(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(arr) => matches!(arr.first(), Some(Value::Object(_))),
        _ => false,
    }
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers = flat_keys(first);
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| lookup(map, h).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }

        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

/// Column names of a record, one level of nesting flattened as `outer.inner`.
pub(crate) fn flat_keys(map: &Map<String, Value>) -> Vec<String> {
    let mut keys = Vec::new();
    for (key, val) in map {
        match val {
            Value::Object(inner) => {
                keys.extend(inner.keys().map(|k| format!("{key}.{k}")));
            }
            _ => keys.push(key.clone()),
        }
    }
    keys
}

/// Value at a possibly dotted column name.
pub(crate) fn lookup<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    match key.split_once('.') {
        Some((outer, inner)) => map.get(outer).and_then(|v| v.get(inner)),
        None => map.get(key),
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(x) if n.is_f64() => format!("{x:.6}"),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Null => "n/a".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_flat_keys_expand_nested_statistics() {
        let row = json!({"model": "gaussian", "kupiec": {"lr": 0.1, "p_value": 0.7}});
        let map = row.as_object().unwrap();
        assert_eq!(flat_keys(map), vec!["kupiec.lr", "kupiec.p_value", "model"]);
        assert_eq!(lookup(map, "kupiec.p_value"), Some(&json!(0.7)));
    }

    #[test]
    fn test_null_renders_as_not_available() {
        assert_eq!(format_value(&Value::Null), "n/a");
        assert_eq!(format_value(&json!(0.5)), "0.500000");
        assert_eq!(format_value(&json!(60)), "60");
    }
}
