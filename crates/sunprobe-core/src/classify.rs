// ── Field classification ──
//
// Maps raw extraction keys onto canonical measurement fields using unit
// and keyword heuristics. Keys are tokenized case-insensitively on `.`,
// `_`, `-`, whitespace and camelCase boundaries. A unit token decides
// first; otherwise keywords decide with precedence
// efficiency > energy > power > voltage > current, so `currentPower`
// is a power reading.
//
// When several candidates land on one field the largest value wins.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::model::{
    CanonicalField, MeasurementRecord, Provenance, RawExtractionRecord, RecordStatus,
};

/// Assumed effective sun-hours per day for the daily-energy estimate.
pub const ESTIMATED_SUN_HOURS: f64 = 6.0;
const DAYS_PER_MONTH: f64 = 30.0;
const DAYS_PER_YEAR: f64 = 365.0;

const METADATA_TOKENS: &[&str] = &[
    "id", "oid", "uuid", "guid", "timestamp", "time", "date", "version", "status", "code",
    "index", "type", "endpoint", "serial",
];

const EFFICIENCY_WORDS: &[&str] = &["efficiency", "eff", "percent", "pct"];
const ENERGY_WORDS: &[&str] = &["energy", "yield", "kwh"];
const POWER_WORDS: &[&str] = &["power", "watt", "watts", "pac"];
const WEAK_ENERGY_WORDS: &[&str] = &["production", "generation", "accumulated"];
const VOLTAGE_WORDS: &[&str] = &["voltage", "volt", "volts", "udc", "uac"];
const CURRENT_WORDS: &[&str] = &["current", "amp", "amps", "ampere", "amperes", "idc", "iac"];

const DAILY_WORDS: &[&str] = &["today", "day", "daily"];
const MONTHLY_WORDS: &[&str] = &["month", "monthly", "mtd"];
const YEARLY_WORDS: &[&str] = &["year", "yearly", "annual", "ytd"];
const TOTAL_WORDS: &[&str] = &["total", "lifetime", "accumulated", "cumulative", "overall"];

/// How a single raw key is interpreted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyClass {
    /// Bookkeeping (ids, timestamps, status codes).
    Metadata,
    /// A canonical field; the raw value is multiplied by `scale`.
    Field { field: CanonicalField, scale: f64 },
    /// A numeric value that matches no canonical field.
    Unclassified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Power,
    Energy,
    Voltage,
    Current,
    Efficiency,
}

/// Split a key into lower-case tokens.
pub fn tokenize(key: &str) -> Vec<String> {
    let chars: Vec<char> = key.chars().collect();
    let mut tokens = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '%' {
            flush(&mut current, &mut tokens);
            tokens.push("%".to_owned());
            continue;
        }
        if !c.is_alphanumeric() {
            flush(&mut current, &mut tokens);
            continue;
        }
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                flush(&mut current, &mut tokens);
            }
        }
        current.extend(c.to_lowercase());
    }
    flush(&mut current, &mut tokens);
    tokens
}

fn flush(current: &mut String, tokens: &mut Vec<String>) {
    if !current.is_empty() {
        tokens.push(std::mem::take(current));
    }
}

fn has_any(tokens: &[String], words: &[&str]) -> bool {
    tokens.iter().any(|t| words.contains(&t.as_str()))
}

/// Unit named by a token. Single-letter units only count as the last token.
fn unit(token: &str, is_last: bool) -> Option<(Kind, f64)> {
    match token {
        "kwh" => Some((Kind::Energy, 1.0)),
        "wh" => Some((Kind::Energy, 0.001)),
        "mwh" => Some((Kind::Energy, 1000.0)),
        "kw" => Some((Kind::Power, 1000.0)),
        "mw" => Some((Kind::Power, 1_000_000.0)),
        "%" => Some((Kind::Efficiency, 1.0)),
        "w" if is_last => Some((Kind::Power, 1.0)),
        "v" if is_last => Some((Kind::Voltage, 1.0)),
        "a" if is_last => Some((Kind::Current, 1.0)),
        _ => None,
    }
}

fn unit_of(tokens: &[String]) -> Option<(Kind, f64)> {
    let last = tokens.len().checked_sub(1)?;
    tokens
        .iter()
        .enumerate()
        .rev()
        .find_map(|(i, t)| unit(t, i == last))
}

fn keyword_kind(tokens: &[String]) -> Option<Kind> {
    if has_any(tokens, EFFICIENCY_WORDS) {
        Some(Kind::Efficiency)
    } else if has_any(tokens, ENERGY_WORDS) {
        Some(Kind::Energy)
    } else if has_any(tokens, POWER_WORDS) {
        Some(Kind::Power)
    } else if has_any(tokens, WEAK_ENERGY_WORDS) {
        Some(Kind::Energy)
    } else if has_any(tokens, VOLTAGE_WORDS) {
        Some(Kind::Voltage)
    } else if has_any(tokens, CURRENT_WORDS) {
        Some(Kind::Current)
    } else {
        None
    }
}

fn energy_period(tokens: &[String]) -> CanonicalField {
    if has_any(tokens, DAILY_WORDS) {
        CanonicalField::DailyEnergy
    } else if has_any(tokens, MONTHLY_WORDS) {
        CanonicalField::MonthlyEnergy
    } else if has_any(tokens, YEARLY_WORDS) {
        CanonicalField::YearlyEnergy
    } else if has_any(tokens, TOTAL_WORDS) {
        CanonicalField::TotalEnergy
    } else {
        CanonicalField::DailyEnergy
    }
}

/// Interpret one raw key.
pub fn classify_key(key: &str) -> KeyClass {
    if key.starts_with('_') {
        return KeyClass::Metadata;
    }
    let tokens = tokenize(key);
    let Some(last) = tokens.last() else {
        return KeyClass::Unclassified;
    };
    if METADATA_TOKENS.contains(&last.as_str()) {
        return KeyClass::Metadata;
    }

    let (kind, scale) = match unit_of(&tokens) {
        Some(found) => found,
        None => match keyword_kind(&tokens) {
            Some(kind) => (kind, 1.0),
            None => return KeyClass::Unclassified,
        },
    };

    let field = match kind {
        Kind::Power => CanonicalField::CurrentPower,
        Kind::Energy => energy_period(&tokens),
        Kind::Voltage => CanonicalField::Voltage,
        Kind::Current => CanonicalField::Current,
        Kind::Efficiency => CanonicalField::Efficiency,
    };
    KeyClass::Field { field, scale }
}

#[allow(clippy::float_cmp)]
fn scaled(value: f64, scale: f64) -> f64 {
    if scale == 1.0 {
        value
    } else {
        // Unit conversion of decimal readings; drop binary noise.
        (value * scale * 1e6).round() / 1e6
    }
}

/// Classify a raw record into a canonical measurement, timestamped now.
pub fn classify(raw: &RawExtractionRecord) -> MeasurementRecord {
    classify_at(raw, Utc::now())
}

/// Classify a raw record with an explicit timestamp.
pub fn classify_at(raw: &RawExtractionRecord, timestamp: DateTime<Utc>) -> MeasurementRecord {
    let mut best: HashMap<CanonicalField, f64> = HashMap::new();
    let mut fields = IndexMap::new();
    let mut metadata = IndexMap::new();
    let mut value_count = 0usize;

    for (key, raw_value) in raw.entries() {
        let value = raw_value.value;
        match classify_key(key) {
            KeyClass::Metadata => {
                metadata.insert(key.to_owned(), value);
            }
            _ if value < 0.0 || !value.is_finite() => {
                trace!(key, value, "dropping negative value");
            }
            KeyClass::Field { field, scale } => {
                value_count += 1;
                let value = scaled(value, scale);
                best.entry(field)
                    .and_modify(|current| *current = current.max(value))
                    .or_insert(value);
            }
            KeyClass::Unclassified => {
                value_count += 1;
                fields.insert(key.to_owned(), value);
            }
        }
    }

    let mut estimated_from_vi = false;
    let mut current_power = best.get(&CanonicalField::CurrentPower).copied();
    let voltage = best.get(&CanonicalField::Voltage).copied();
    let current = best.get(&CanonicalField::Current).copied();

    if current_power.is_none() {
        if let (Some(v), Some(i)) = (voltage, current) {
            current_power = Some(v * i);
            estimated_from_vi = true;
        }
    }

    let mut daily_energy = best.get(&CanonicalField::DailyEnergy).copied();
    let mut monthly_energy = best.get(&CanonicalField::MonthlyEnergy).copied();
    let mut yearly_energy = best.get(&CanonicalField::YearlyEnergy).copied();
    let mut total_energy = best.get(&CanonicalField::TotalEnergy).copied();
    let mut estimated_daily = false;

    let no_energy = daily_energy.is_none()
        && monthly_energy.is_none()
        && yearly_energy.is_none()
        && total_energy.is_none();
    if let Some(power) = current_power.filter(|p| *p > 0.0 && no_energy) {
        let daily = power / 1000.0 * ESTIMATED_SUN_HOURS;
        daily_energy = Some(daily);
        monthly_energy = Some(daily * DAYS_PER_MONTH);
        yearly_energy = Some(daily * DAYS_PER_YEAR);
        total_energy = Some(daily * DAYS_PER_YEAR);
        estimated_daily = true;
    }

    debug!(
        endpoint = %raw.endpoint,
        values = value_count,
        unclassified = fields.len(),
        metadata = metadata.len(),
        estimated_from_vi,
        estimated_daily,
        "classified extraction"
    );

    MeasurementRecord {
        current_power,
        daily_energy,
        monthly_energy,
        yearly_energy,
        total_energy,
        voltage,
        current,
        efficiency: best.get(&CanonicalField::Efficiency).copied(),
        fields,
        metadata,
        provenance: Provenance {
            endpoint: raw.endpoint.clone(),
            timestamp,
            status: RecordStatus::Success,
            estimated_from_vi,
            estimated_daily,
            value_count,
            methods: raw.methods(),
        },
    }
}
