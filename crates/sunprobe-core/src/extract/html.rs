// Structured data embedded in HTML pages.
//
// Dashboards often ship their state as an object literal assigned to a
// global in an inline script, as a JSON script block, or as `data-*`
// attributes on widgets. Script objects are handed to the JSON walk;
// attributes become `data.<attr>_<n>` keys.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::trace;

use super::json;
use super::text::{parse_localized, readings};
use crate::config::ExtractionProfile;
use crate::model::{ExtractionMethod, RawExtractionRecord};

static SCRIPT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script").expect("valid selector"));

static ANY_ELEMENT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("*").expect("valid selector"));

const SCRIPT_PREFIX: &str = "script";

/// Parse object literals from inline scripts and walk them as JSON.
pub(crate) fn extract_scripts(
    document: &Html,
    profile: &ExtractionProfile,
    record: &mut RawExtractionRecord,
) {
    let assignment = assignment_pattern(&profile.script_globals);

    for script in document.select(&SCRIPT) {
        let source: String = script.text().collect();
        let trimmed = source.trim();
        if trimmed.is_empty() {
            continue;
        }

        let is_json_block = script
            .value()
            .attr("type")
            .is_some_and(|t| t.to_ascii_lowercase().contains("json"));
        if is_json_block {
            if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
                json::walk(&value, SCRIPT_PREFIX, profile, ExtractionMethod::HtmlScript, record);
            }
            continue;
        }

        let Some(ref pattern) = assignment else {
            continue;
        };
        for found in pattern.find_iter(&source) {
            // The pattern ends on the opening brace.
            let start = found.end() - 1;
            let Some(literal) = balanced_object(&source, start) else {
                continue;
            };
            match serde_json::from_str::<Value>(literal) {
                Ok(value) => {
                    json::walk(&value, SCRIPT_PREFIX, profile, ExtractionMethod::HtmlScript, record);
                }
                Err(e) => trace!(error = %e, "embedded object is not JSON"),
            }
        }
    }
}

/// Collect numeric `data-*` attributes whose name matches a keyword.
///
/// The attribute value is used when numeric, otherwise the element text.
/// A unit found next to the number is appended to the key.
pub(crate) fn extract_data_attributes(
    document: &Html,
    profile: &ExtractionProfile,
    record: &mut RawExtractionRecord,
) {
    let mut n = 0usize;
    for element in document.select(&ANY_ELEMENT) {
        for (name, value) in element.value().attrs() {
            let Some(attr) = name.strip_prefix("data-") else {
                continue;
            };
            if !profile.is_relevant(attr) {
                continue;
            }

            let reading = numeric_with_unit(value).or_else(|| {
                let text: String = element.text().collect();
                numeric_with_unit(&text)
            });
            let Some((number, unit)) = reading else {
                continue;
            };

            n += 1;
            let key = match unit {
                Some(unit) => format!("data.{attr}_{n}_{unit}"),
                None => format!("data.{attr}_{n}"),
            };
            record.insert(key, number, ExtractionMethod::HtmlScript);
        }
    }
}

fn numeric_with_unit(raw: &str) -> Option<(f64, Option<&'static str>)> {
    if let Some(reading) = readings(raw).first() {
        return Some((reading.value, Some(reading.unit)));
    }
    let trimmed = raw.trim();
    parse_localized(trimmed)
        .or_else(|| json::leading_number(trimmed))
        .map(|v| (v, None))
}

/// Regex matching `window.NAME = {`, `var|let|const NAME = {` and
/// `"NAME": {` for the configured globals.
fn assignment_pattern(globals: &[String]) -> Option<Regex> {
    if globals.is_empty() {
        return None;
    }
    let names = globals
        .iter()
        .map(|g| regex::escape(g))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(
        r#"(?:\bwindow\.|\b(?:var|let|const)\s+)(?:{names})\s*=\s*\{{|"(?:{names})"\s*:\s*\{{"#
    );
    Regex::new(&pattern).ok()
}

/// The `{...}` span starting at `start`, honoring nesting and string literals.
fn balanced_object(src: &str, start: usize) -> Option<&str> {
    let bytes = src.as_bytes();
    if bytes.get(start) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'"' | b'\'' => quote = Some(b),
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return src.get(start..=i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn scripts(html: &str) -> RawExtractionRecord {
        let mut record = RawExtractionRecord::new("/dashboard");
        extract_scripts(
            &Html::parse_document(html),
            &ExtractionProfile::default(),
            &mut record,
        );
        record
    }

    #[test]
    fn window_assignment_is_walked() {
        let record = scripts(
            r#"<html><head><script>
                window.initialData = {"plant": {"pvPower": 2450, "label": "a } in a string"}};
                startApp();
            </script></head></html>"#,
        );
        assert_eq!(record.get("script.plant.pvPower"), Some(2450.0));
    }

    #[test]
    fn let_assignment_and_json_block() {
        let record = scripts(
            r#"<script>let data = { "energyToday": 14.2 };</script>
               <script type="application/json">{"totalYield": "8123.4"}</script>"#,
        );
        assert_eq!(record.get("script.energyToday"), Some(14.2));
        assert_eq!(record.get("script.totalYield"), Some(8123.4));
    }

    #[test]
    fn non_json_literals_are_ignored() {
        let record = scripts("<script>var data = { power: 1200 };</script>");
        assert!(record.is_empty());
    }

    #[test]
    fn data_attributes_with_units() {
        let html = r#"<div data-power="1,5 kW"></div>
                      <span data-solar-yield>12.75</span>
                      <span data-color="42"></span>"#;
        let mut record = RawExtractionRecord::new("/dashboard");
        extract_data_attributes(
            &Html::parse_document(html),
            &ExtractionProfile::default(),
            &mut record,
        );
        assert_eq!(record.get("data.power_1_kw"), Some(1.5));
        assert_eq!(record.get("data.solar-yield_2"), Some(12.75));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn balanced_span_respects_nesting() {
        let src = r#"x = {"a": {"b": "}"}, "c": 1}; y = 2"#;
        let start = src.find('{').unwrap_or_default();
        assert_eq!(
            balanced_object(src, start),
            Some(r#"{"a": {"b": "}"}, "c": 1}"#)
        );
        assert_eq!(balanced_object("{ unterminated", 0), None);
    }
}
