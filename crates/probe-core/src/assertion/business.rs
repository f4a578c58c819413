use probe_proto::{BusinessRule, Check, Finding};
use serde_json::Value;

use super::{CheckOutcome, parse_timestamp};
use crate::value_path::{as_f64, lookup, lookup_f64};

/// Allowed drift between summed line items and the declared total.
const TOTAL_TOLERANCE: f64 = 0.01;

enum RuleVerdict {
    Holds,
    Violated(String),
    /// Fields the rule needs are absent.
    NotApplicable(String),
}

pub(crate) fn check(body: &Value, rules: &[BusinessRule]) -> CheckOutcome {
    if rules.is_empty() {
        return CheckOutcome::perfect();
    }

    let targets: Vec<&Value> = match body {
        Value::Array(items) if !items.is_empty() => items.iter().collect(),
        other => vec![other],
    };

    let mut credit = 0.0;
    let mut evaluated = 0usize;
    let mut findings = Vec::new();

    for (index, target) in targets.iter().enumerate() {
        let prefix = if targets.len() > 1 {
            format!("[{index}] ")
        } else {
            String::new()
        };
        for rule in rules {
            evaluated += 1;
            match evaluate(target, rule) {
                RuleVerdict::Holds => credit += 1.0,
                RuleVerdict::Violated(message) => {
                    findings.push(Finding::error(Check::Business, format!("{prefix}{message}")));
                }
                RuleVerdict::NotApplicable(message) => {
                    credit += 0.5;
                    findings.push(Finding::warning(
                        Check::Business,
                        format!("{prefix}{message}"),
                    ));
                }
            }
        }
    }

    CheckOutcome::new(10.0 * credit / evaluated as f64, findings)
}

fn evaluate(body: &Value, rule: &BusinessRule) -> RuleVerdict {
    match rule {
        BusinessRule::TotalMatchesItems {
            items,
            subtotal,
            total,
        } => {
            let Some(Value::Array(lines)) = lookup(body, items) else {
                return RuleVerdict::NotApplicable(format!("no '{items}' array to total"));
            };
            let Some(declared) = lookup_f64(body, total) else {
                return RuleVerdict::NotApplicable(format!("no numeric '{total}' to compare"));
            };
            let mut sum = 0.0;
            for (i, line) in lines.iter().enumerate() {
                match lookup(line, subtotal).and_then(as_f64) {
                    Some(value) => sum += value,
                    None => {
                        return RuleVerdict::NotApplicable(format!(
                            "line {i} has no numeric '{subtotal}'"
                        ));
                    }
                }
            }
            if (sum - declared).abs() <= TOTAL_TOLERANCE {
                RuleVerdict::Holds
            } else {
                RuleVerdict::Violated(format!(
                    "sum of line subtotals {sum:.2} does not match {total} {declared:.2}"
                ))
            }
        }
        BusinessRule::NonNegative { field } => match lookup_f64(body, field) {
            Some(value) if value < 0.0 => {
                RuleVerdict::Violated(format!("'{field}' is negative ({value})"))
            }
            Some(_) => RuleVerdict::Holds,
            None => RuleVerdict::NotApplicable(format!("no numeric '{field}'")),
        },
        BusinessRule::NonNegativeMargin { price, cost } => {
            match (lookup_f64(body, price), lookup_f64(body, cost)) {
                (Some(p), Some(c)) if p - c < 0.0 => RuleVerdict::Violated(format!(
                    "negative margin: '{price}' {p} below '{cost}' {c}"
                )),
                (Some(_), Some(_)) => RuleVerdict::Holds,
                _ => RuleVerdict::NotApplicable(format!("no numeric '{price}'/'{cost}' pair")),
            }
        }
        BusinessRule::DateOrder { earlier, later } => {
            let first = lookup(body, earlier)
                .and_then(Value::as_str)
                .and_then(parse_timestamp);
            let second = lookup(body, later)
                .and_then(Value::as_str)
                .and_then(parse_timestamp);
            match (first, second) {
                (Some(a), Some(b)) if a > b => RuleVerdict::Violated(format!(
                    "'{earlier}' ({a}) comes after '{later}' ({b})"
                )),
                (Some(_), Some(_)) => RuleVerdict::Holds,
                // An unset later date (not yet delivered, not yet closed) is fine.
                (Some(_), None) if lookup(body, later).is_none_or(Value::is_null) => {
                    RuleVerdict::Holds
                }
                _ => RuleVerdict::NotApplicable(format!("no '{earlier}'/'{later}' dates")),
            }
        }
    }
}
