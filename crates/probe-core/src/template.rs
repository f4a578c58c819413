//! `{placeholder}` substitution for endpoints and payloads.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::value_path::scalar_to_string;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// Result of filling a template.
#[derive(Debug, Clone, PartialEq)]
pub struct Filled<T> {
    pub value: T,

    /// Placeholder names that had no variable, in first-seen order.
    pub unresolved: Vec<String>,
}

impl<T> Filled<T> {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Placeholder names appearing in `template`.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let name = caps[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Replaces `{name}` tokens with variable values. Unknown tokens are left intact.
pub fn fill_str(template: &str, vars: &BTreeMap<String, Value>) -> Filled<String> {
    let mut unresolved = Vec::new();
    let value = PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures<'_>| match vars.get(&caps[1]) {
            Some(value) => scalar_to_string(value),
            None => {
                let name = caps[1].to_string();
                if !unresolved.contains(&name) {
                    unresolved.push(name);
                }
                caps[0].to_string()
            }
        })
        .into_owned();
    Filled { value, unresolved }
}

/// Same as [`fill_str`] over string-valued parameters.
pub fn fill_params(template: &str, params: &BTreeMap<String, String>) -> Filled<String> {
    let vars = params
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    fill_str(template, &vars)
}

/// Walks a JSON payload and fills every string leaf.
///
/// A leaf that is exactly one placeholder takes the variable's JSON value,
/// so `"{produto_id}"` becomes the number `42` rather than the string `"42"`.
pub fn fill_json(template: &Value, vars: &BTreeMap<String, Value>) -> Filled<Value> {
    let mut unresolved = Vec::new();
    let value = fill_json_inner(template, vars, &mut unresolved);
    Filled { value, unresolved }
}

fn fill_json_inner(
    template: &Value,
    vars: &BTreeMap<String, Value>,
    unresolved: &mut Vec<String>,
) -> Value {
    match template {
        Value::String(text) => {
            if let Some(caps) = PLACEHOLDER_RE.captures(text)
                && caps[0].len() == text.len()
                && let Some(value) = vars.get(&caps[1])
            {
                return value.clone();
            }
            let filled = fill_str(text, vars);
            for name in filled.unresolved {
                if !unresolved.contains(&name) {
                    unresolved.push(name);
                }
            }
            Value::String(filled.value)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| fill_json_inner(item, vars, unresolved))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), fill_json_inner(v, vars, unresolved)))
                .collect(),
        ),
        other => other.clone(),
    }
}
