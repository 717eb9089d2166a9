// JSON object-graph walk.
//
// Collects every number (or numeric-looking string) whose key contains
// one of the profile keywords. Keys that match nothing are dropped, so
// portal bookkeeping that is not solar-related never reaches the
// classifier. Array elements are matched against their parent's key.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::config::ExtractionProfile;
use crate::model::{ExtractionMethod, RawExtractionRecord};

static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)").expect("valid regex")
});

/// Walk `value`, inserting matches as `<prefix>.<path>` keys.
pub(crate) fn walk(
    value: &Value,
    prefix: &str,
    profile: &ExtractionProfile,
    method: ExtractionMethod,
    record: &mut RawExtractionRecord,
) {
    let mut walker = Walker {
        profile,
        method,
        record,
    };
    walker.visit(value, prefix, None, 0);
}

struct Walker<'a> {
    profile: &'a ExtractionProfile,
    method: ExtractionMethod,
    record: &'a mut RawExtractionRecord,
}

impl Walker<'_> {
    // `depth` counts enclosing containers; leaves of the deepest allowed
    // container are still collected.
    fn visit(&mut self, value: &Value, path: &str, key: Option<&str>, depth: usize) {
        match value {
            Value::Object(_) | Value::Array(_) if depth > self.profile.max_depth => {}
            Value::Object(map) => {
                for (child_key, child) in map {
                    let child_path = format!("{path}.{child_key}");
                    self.visit(child, &child_path, Some(child_key), depth + 1);
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    let child_path = format!("{path}.{i}");
                    self.visit(child, &child_path, key, depth + 1);
                }
            }
            Value::Number(_) | Value::String(_) => {
                let Some(key) = key else { return };
                if !self.profile.is_relevant(key) {
                    return;
                }
                if let Some(number) = coerce(value) {
                    self.record.insert(path, number, self.method);
                }
            }
            Value::Bool(_) | Value::Null => {}
        }
    }
}

/// Numeric value of a JSON leaf; strings use their leading number
/// (`"1520 W"` -> 1520).
pub(crate) fn coerce(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => leading_number(s),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Number at the start of `s`, ignoring anything after it.
pub(crate) fn leading_number(s: &str) -> Option<f64> {
    LEADING_NUMBER
        .captures(s)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}
