// Unit-anchored scanning of free text.
//
// Finds numbers immediately followed by an electrical unit (W, kW, MW,
// Wh, kWh, MWh, V, A) or a percent sign. Markup is stripped first so
// that inline scripts and style sheets do not produce readings.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{ExtractionMethod, RawExtractionRecord};

// A sign only counts when it does not follow a word character, so
// `3-4 kW` is a range and `Grid -4500 W` is negative.
static READING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:^|[^\w])([-\x{2212}]?\d+(?:[.,]\d+)*)\s?(?:((?i:kwh|mwh|wh|kw|mw)|W|V|A)\b|(%))",
    )
    .expect("valid regex")
});

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->")
        .expect("valid regex")
});

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// A number found next to a unit. `unit` is the lower-case unit token
/// used in raw keys (`kwh`, `w`, `%`, ...).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub unit: &'static str,
}

/// Every unit-anchored number in `text`, in order of appearance.
pub fn readings(text: &str) -> Vec<Reading> {
    READING
        .captures_iter(text)
        .filter_map(|caps| {
            let value = signed(caps.get(1)?.as_str())?;
            let unit = match caps.get(2) {
                Some(m) => unit_token(m.as_str())?,
                None => "%",
            };
            Some(Reading { value, unit })
        })
        .collect()
}

fn signed(raw: &str) -> Option<f64> {
    match raw.strip_prefix('-').or_else(|| raw.strip_prefix('\u{2212}')) {
        Some(digits) => parse_localized(digits).map(|v| -v),
        None => parse_localized(raw),
    }
}

fn unit_token(raw: &str) -> Option<&'static str> {
    Some(match raw.to_ascii_lowercase().as_str() {
        "kwh" => "kwh",
        "mwh" => "mwh",
        "wh" => "wh",
        "kw" => "kw",
        "mw" => "mw",
        "w" => "w",
        "v" => "v",
        "a" => "a",
        _ => return None,
    })
}

/// Parse a number that may use `,` or `.` as decimal or grouping separator.
///
/// The last separator is the decimal one when both appear. A lone comma
/// followed by exactly three digits groups thousands; any other lone
/// comma is a decimal comma. Repeated separators always group.
pub fn parse_localized(raw: &str) -> Option<f64> {
    let commas = raw.matches(',').count();
    let dots = raw.matches('.').count();

    let normalized = match (commas, dots) {
        (0, 0 | 1) => raw.to_owned(),
        (0, _) => raw.replace('.', ""),
        (1, 0) => {
            let (_, frac) = raw.split_once(',')?;
            if frac.len() == 3 {
                raw.replace(',', "")
            } else {
                raw.replace(',', ".")
            }
        }
        (_, 0) => raw.replace(',', ""),
        _ => {
            let last_comma = raw.rfind(',')?;
            let last_dot = raw.rfind('.')?;
            if last_comma > last_dot {
                raw.replace('.', "").replace(',', ".")
            } else {
                raw.replace(',', "")
            }
        }
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Remove scripts, styles, comments and tags, then collapse whitespace
/// (including non-breaking spaces) to single blanks.
pub fn visible_text(html: &str) -> String {
    let without_code = SCRIPT_OR_STYLE.replace_all(html, " ");
    let without_tags = TAG.replace_all(&without_code, " ");
    without_tags
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Scan text (or stripped markup) into `value_<n>_<unit>` keys.
pub(crate) fn extract_text(body: &str, record: &mut RawExtractionRecord) {
    let text = visible_text(body);
    for (n, reading) in readings(&text).into_iter().enumerate() {
        record.insert(
            format!("value_{}_{}", n + 1, reading.unit),
            reading.value,
            ExtractionMethod::HtmlText,
        );
    }
}
