//! Dotted-path access into JSON bodies (`order.items.0.price`).

use serde_json::Value;

/// Resolves a dotted path. Numeric segments index into arrays.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Resolves a path to a number. Numeric strings count.
pub fn lookup_f64(value: &Value, path: &str) -> Option<f64> {
    lookup(value, path).and_then(as_f64)
}

pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Renders a scalar for use inside a URL or string template.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_nested_and_indexed() {
        let body = json!({"order": {"items": [{"price": 10.5}, {"price": "2"}]}});
        assert_eq!(lookup_f64(&body, "order.items.0.price"), Some(10.5));
        assert_eq!(lookup_f64(&body, "order.items.1.price"), Some(2.0));
        assert!(lookup(&body, "order.items.5").is_none());
        assert!(lookup(&body, "order.missing").is_none());
        assert_eq!(lookup(&body, ""), Some(&body));
    }

    #[test]
    fn test_scalar_to_string() {
        assert_eq!(scalar_to_string(&json!(42)), "42");
        assert_eq!(scalar_to_string(&json!("abc")), "abc");
        assert_eq!(scalar_to_string(&Value::Null), "");
    }
}
