use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use probe_proto::{Check, EntitySchema, FieldKind, FieldSpec, Finding};
use serde_json::Value;

use super::CheckOutcome;

/// Parses RFC 3339, naive `YYYY-MM-DDTHH:MM:SS[.f]`, or a bare date.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ts.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

enum FieldVerdict {
    Ok,
    Warning(String),
    Error(String),
}

pub(crate) fn check(
    body: &Value,
    entity: Option<&str>,
    schemas: &BTreeMap<String, EntitySchema>,
) -> CheckOutcome {
    let Some(entity) = entity else {
        return CheckOutcome::perfect();
    };

    let Some(schema) = schemas.get(entity) else {
        return CheckOutcome::new(
            5.0,
            vec![Finding::warning(
                Check::Structural,
                format!("no schema registered for entity '{entity}'"),
            )],
        );
    };

    match body {
        Value::Object(_) => check_entity(body, schema, None),
        Value::Array(items) if items.is_empty() => CheckOutcome::perfect(),
        Value::Array(items) => {
            let mut findings = Vec::new();
            let mut total = 0.0;
            for (index, item) in items.iter().enumerate() {
                let outcome = check_entity(item, schema, Some(index));
                total += outcome.score;
                findings.extend(outcome.findings);
            }
            CheckOutcome::new(total / items.len() as f64, findings)
        }
        other => CheckOutcome::new(
            0.0,
            vec![Finding::error(
                Check::Structural,
                format!(
                    "expected {entity} object, got {}",
                    json_type(other)
                ),
            )],
        ),
    }
}

fn check_entity(value: &Value, schema: &EntitySchema, index: Option<usize>) -> CheckOutcome {
    let prefix = index.map(|i| format!("[{i}] ")).unwrap_or_default();

    let Value::Object(map) = value else {
        return CheckOutcome::new(
            0.0,
            vec![Finding::error(
                Check::Structural,
                format!("{prefix}expected {} object, got {}", schema.name, json_type(value)),
            )],
        );
    };

    if schema.fields.is_empty() {
        return CheckOutcome::perfect();
    }

    let mut credit = 0.0;
    let mut findings = Vec::new();
    for field in &schema.fields {
        match check_field(field, map.get(&field.name)) {
            FieldVerdict::Ok => credit += 1.0,
            FieldVerdict::Warning(message) => {
                credit += 0.5;
                findings.push(Finding::warning(Check::Structural, format!("{prefix}{message}")));
            }
            FieldVerdict::Error(message) => {
                findings.push(Finding::error(Check::Structural, format!("{prefix}{message}")));
            }
        }
    }

    CheckOutcome::new(10.0 * credit / schema.fields.len() as f64, findings)
}

fn check_field(field: &FieldSpec, value: Option<&Value>) -> FieldVerdict {
    let name = &field.name;
    let value = match value {
        None if field.required => {
            return FieldVerdict::Error(format!("missing required field '{name}'"));
        }
        None => return FieldVerdict::Ok,
        Some(Value::Null) if field.nullable || !field.required => return FieldVerdict::Ok,
        Some(Value::Null) => return FieldVerdict::Error(format!("required field '{name}' is null")),
        Some(value) => value,
    };

    let type_ok = match field.kind {
        FieldKind::String | FieldKind::Enum | FieldKind::Timestamp => value.is_string(),
        FieldKind::Number => value.is_number(),
        FieldKind::Integer => value.is_i64() || value.is_u64(),
        FieldKind::Boolean => value.is_boolean(),
        FieldKind::Object => value.is_object(),
        FieldKind::Array => value.is_array(),
    };

    if !type_ok {
        let message = format!(
            "field '{name}' expected {}, got {}",
            field.kind.as_str(),
            json_type(value)
        );
        // Timestamps get the softer treatment regardless of requiredness.
        return if field.required && field.kind != FieldKind::Timestamp {
            FieldVerdict::Error(message)
        } else {
            FieldVerdict::Warning(message)
        };
    }

    match field.kind {
        FieldKind::Enum if !field.values.is_empty() => {
            let raw = value.as_str().unwrap_or_default();
            if field.values.iter().any(|v| v == raw) {
                FieldVerdict::Ok
            } else {
                FieldVerdict::Warning(format!(
                    "field '{name}' has value '{raw}' outside [{}]",
                    field.values.join(", ")
                ))
            }
        }
        FieldKind::Timestamp => {
            let raw = value.as_str().unwrap_or_default();
            if parse_timestamp(raw).is_some() {
                FieldVerdict::Ok
            } else {
                FieldVerdict::Warning(format!("field '{name}' has malformed timestamp '{raw}'"))
            }
        }
        _ => FieldVerdict::Ok,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
