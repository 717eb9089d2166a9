//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits `key=value` lines for scripts.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use sunprobe_core::{CanonicalField, DashboardSnapshot, MeasurementRecord, RecordStatus};

use crate::cli::{ColorMode, OutputFormat};

/// Prefix for values that were inferred rather than read from the portal.
pub const ESTIMATE_MARK: &str = "~";

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Unit formatting ──────────────────────────────────────────────────

/// Watts, scaled to kW / MW.
pub fn format_power(watts: f64) -> String {
    if watts >= 1_000_000.0 {
        format!("{:.2} MW", watts / 1_000_000.0)
    } else if watts >= 1000.0 {
        format!("{:.2} kW", watts / 1000.0)
    } else {
        format!("{watts:.0} W")
    }
}

/// kWh, scaled to MWh.
pub fn format_energy(kwh: f64) -> String {
    if kwh >= 1000.0 {
        format!("{:.2} MWh", kwh / 1000.0)
    } else {
        format!("{kwh:.2} kWh")
    }
}

pub fn format_voltage(volts: f64) -> String {
    if volts >= 1000.0 {
        format!("{:.2} kV", volts / 1000.0)
    } else {
        format!("{volts:.1} V")
    }
}

pub fn format_current(amps: f64) -> String {
    if amps >= 1000.0 {
        format!("{:.2} kA", amps / 1000.0)
    } else {
        format!("{amps:.1} A")
    }
}

pub fn format_percent(value: f64) -> String {
    format!("{value:.1} %")
}

/// Display label and formatted value of a canonical field.
pub fn format_field(field: CanonicalField, value: f64) -> (&'static str, String) {
    match field {
        CanonicalField::CurrentPower => ("Current power", format_power(value)),
        CanonicalField::DailyEnergy => ("Today", format_energy(value)),
        CanonicalField::MonthlyEnergy => ("This month", format_energy(value)),
        CanonicalField::YearlyEnergy => ("This year", format_energy(value)),
        CanonicalField::TotalEnergy => ("Total", format_energy(value)),
        CanonicalField::Voltage => ("Voltage", format_voltage(value)),
        CanonicalField::Current => ("Current", format_current(value)),
        CanonicalField::Efficiency => ("Efficiency", format_percent(value)),
    }
}

/// Trim a float for plain output without unit scaling.
fn plain_number(value: f64) -> String {
    let s = format!("{value:.6}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".into()
    } else {
        s.to_owned()
    }
}

// ── Measurement views ────────────────────────────────────────────────

#[derive(Tabled)]
struct MeasurementRow {
    #[tabled(rename = "Reading")]
    label: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn measurement_rows(record: &MeasurementRecord, all_fields: bool) -> Vec<MeasurementRow> {
    let mut rows: Vec<MeasurementRow> = record
        .populated_fields()
        .map(|(field, value)| {
            let (label, text) = format_field(field, value);
            let value = if record.is_estimated(field) {
                format!("{ESTIMATE_MARK}{text}")
            } else {
                text
            };
            MeasurementRow {
                label: label.into(),
                value,
            }
        })
        .collect();

    if all_fields {
        rows.extend(record.fields.iter().map(|(key, value)| MeasurementRow {
            label: key.clone(),
            value: plain_number(*value),
        }));
    }
    rows
}

/// Footer line naming the endpoint, status and acquisition time.
fn provenance_line(record: &MeasurementRecord, color: bool) -> String {
    let p = &record.provenance;
    let when = p.timestamp.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S");
    let status = match (p.status, color) {
        (RecordStatus::Degraded, true) => p.status.yellow().to_string(),
        (RecordStatus::Success, true) => p.status.green().to_string(),
        (_, false) => p.status.to_string(),
    };
    let mut line = format!("{} · {status} · {when}", p.endpoint);
    if p.estimated_from_vi || p.estimated_daily {
        line = format!("{line} · {ESTIMATE_MARK} estimated");
    }
    if color {
        line.dimmed().to_string()
    } else {
        line
    }
}

/// Table view of one record.
pub fn format_record(record: &MeasurementRecord, all_fields: bool, color: bool) -> String {
    let rows = measurement_rows(record, all_fields);
    if rows.is_empty() {
        return provenance_line(record, color);
    }
    format!("{}\n{}", render_table(&rows), provenance_line(record, color))
}

/// `key=value` lines, canonical fields first.
pub fn record_plain(record: &MeasurementRecord) -> String {
    let mut lines: Vec<String> = record
        .populated_fields()
        .map(|(field, value)| format!("{}={}", field.name(), plain_number(value)))
        .collect();
    lines.extend(
        record
            .fields
            .iter()
            .map(|(key, value)| format!("{key}={}", plain_number(*value))),
    );
    lines.join("\n")
}

/// Dashboard view: last good record, then the error and retry indicator.
pub fn format_snapshot(snapshot: &DashboardSnapshot, all_fields: bool, color: bool) -> String {
    let mut parts = Vec::new();

    match snapshot.last_good {
        Some(ref record) => parts.push(format_record(record, all_fields, color)),
        None if snapshot.last_error.is_none() => parts.push("Waiting for first update...".into()),
        None => {}
    }

    if let Some(ref err) = snapshot.last_error {
        let mut line = format!("{}: {}", err.kind, err.message);
        if let Some(retry) = snapshot.retry_indicator() {
            line = format!("{line} {retry}");
        }
        parts.push(if color { line.red().to_string() } else { line });
        if let Some(ref hint) = err.hint {
            parts.push(hint.clone());
        }
    }

    if !snapshot.next_attempt_in.is_zero() {
        let next = humantime::format_duration(std::time::Duration::from_secs(
            snapshot.next_attempt_in.as_secs(),
        ));
        parts.push(format!("next update in {next}"));
    }

    parts.join("\n")
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    plain_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => data.iter().map(&plain_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses a custom `detail_fn` that returns a pre-formatted
/// string, since single-item views don't use the `Tabled` derive.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    plain_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => plain_fn(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

pub(crate) fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let result = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    result.expect("serialization should not fail")
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).expect("serialization should not fail")
}
