//! `sunprobe history`: measurement series for a calendar period.

use chrono::{Local, NaiveDate, SecondsFormat};
use tabled::Tabled;

use sunprobe_core::{HistoryPeriod, HistoryPoint, HistorySeries};

use crate::cli::{GlobalOpts, HistoryArgs, PeriodArg};
use crate::commands::util;
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct PointRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn to_period(arg: PeriodArg) -> HistoryPeriod {
    match arg {
        PeriodArg::Day => HistoryPeriod::Day,
        PeriodArg::Month => HistoryPeriod::Month,
        PeriodArg::Year => HistoryPeriod::Year,
        PeriodArg::Total => HistoryPeriod::Total,
    }
}

fn parse_date(raw: Option<&str>) -> Result<NaiveDate, CliError> {
    match raw {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| CliError::Validation {
            field: "date".into(),
            reason: format!("{e} (expected YYYY-MM-DD)"),
        }),
        None => Ok(Local::now().date_naive()),
    }
}

/// Label a point at the granularity of its period.
///
/// Intraday points are shown in local time; calendar buckets keep the
/// portal's UTC date.
fn point_label(period: HistoryPeriod, point: &HistoryPoint) -> String {
    let ts = point.timestamp;
    match period {
        HistoryPeriod::Day => ts.with_timezone(&Local).format("%H:%M").to_string(),
        HistoryPeriod::Month => ts.format("%Y-%m-%d").to_string(),
        HistoryPeriod::Year => ts.format("%Y-%m").to_string(),
        HistoryPeriod::Total => ts.format("%Y").to_string(),
    }
}

fn format_series(series: &HistorySeries) -> String {
    if series.points.is_empty() {
        return format!(
            "No measurements for plant {} between {} and {}",
            series.plant_id, series.from, series.to
        );
    }

    let rows: Vec<PointRow> = series
        .points
        .iter()
        .map(|p| PointRow {
            time: point_label(series.period, p),
            value: format!("{:.2}", p.value),
        })
        .collect();
    let table = output::render_table(&rows);

    let mut footer = format!(
        "plant {} · {} · {} point(s) · sum {:.2}",
        series.plant_id,
        series.period,
        series.points.len(),
        series.total()
    );
    if let Some(peak) = series.peak() {
        footer = format!(
            "{footer} · peak {:.2} at {}",
            peak.value,
            point_label(series.period, peak)
        );
    }
    format!("{table}\n{footer}")
}

fn series_plain(series: &HistorySeries) -> String {
    series
        .points
        .iter()
        .map(|p| {
            format!(
                "{} {}",
                p.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                p.value
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn handle(args: HistoryArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let date = parse_date(args.date.as_deref())?;
    let period = to_period(args.period);
    let (resolved, acquirer) = config::build_acquirer(global, None)?;

    let spinner = util::spinner(global, "Fetching history...");
    let result = acquirer.fetch_history(period, date).await;
    spinner.finish_and_clear();
    let series = result.map_err(|e| CliError::from(e).for_profile(&resolved.name))?;

    let out = output::render_single(&global.output, &series, format_series, series_plain);
    output::print_output(&out, global.quiet);
    Ok(())
}
