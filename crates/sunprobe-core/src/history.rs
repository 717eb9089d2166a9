// ── Historical production ──
//
// Short time series from the structured plant endpoints: resolve the
// first plant, then request its measurements over a calendar window.
// Runs under the same session lock as live acquisition.

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::acquisition::Acquirer;
use crate::error::CoreError;

/// Years covered by the `total` window.
const TOTAL_YEARS: u32 = 10;

/// Calendar window of a history request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryPeriod {
    Day,
    Month,
    Year,
    Total,
}

impl HistoryPeriod {
    /// Portal resolution parameter.
    pub fn resolution(self) -> &'static str {
        match self {
            Self::Day => "15min",
            Self::Month => "day",
            Self::Year => "month",
            Self::Total => "year",
        }
    }

    /// Half-open `[from, to)` date window containing `date`.
    pub fn window(self, date: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        match self {
            Self::Day => Some((date, date.succ_opt()?)),
            Self::Month => {
                let from = date.with_day(1)?;
                Some((from, from.checked_add_months(Months::new(1))?))
            }
            Self::Year => {
                let from = NaiveDate::from_ymd_opt(date.year(), 1, 1)?;
                Some((from, from.checked_add_months(Months::new(12))?))
            }
            Self::Total => {
                let this_year = NaiveDate::from_ymd_opt(date.year(), 1, 1)?;
                let from = this_year.checked_sub_months(Months::new(12 * TOTAL_YEARS))?;
                Some((from, this_year.checked_add_months(Months::new(12))?))
            }
        }
    }
}

impl std::fmt::Display for HistoryPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
            Self::Total => "total",
        })
    }
}

impl std::str::FromStr for HistoryPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "total" => Ok(Self::Total),
            other => Err(format!("unknown period '{other}' (expected day, month, year or total)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Measurement series for one plant and window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySeries {
    pub period: HistoryPeriod,
    pub plant_id: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub points: Vec<HistoryPoint>,
}

impl HistorySeries {
    pub fn total(&self) -> f64 {
        self.points.iter().map(|p| p.value).sum()
    }

    pub fn peak(&self) -> Option<&HistoryPoint> {
        self.points
            .iter()
            .max_by(|a, b| a.value.total_cmp(&b.value))
    }
}

fn rfc3339(date: NaiveDate) -> String {
    date.and_time(NaiveTime::MIN)
        .and_utc()
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl Acquirer {
    /// Fetch the measurement series of the first plant for the window
    /// around `date`.
    ///
    /// A rejected session is invalidated, as in live acquisition.
    pub async fn fetch_history(
        &self,
        period: HistoryPeriod,
        date: NaiveDate,
    ) -> Result<HistorySeries, CoreError> {
        let (from, to) = period.window(date).ok_or_else(|| CoreError::Config {
            message: format!("date {date} is out of range for a {period} window"),
        })?;

        let mut session = self.session().lock().await;
        let credential = session.get_credential()?;
        let client = self.client();

        let result = async {
            let plant_id = client.first_plant_id(&credential).await?;
            let envelope = client
                .measurements(
                    &credential,
                    &plant_id,
                    &rfc3339(from),
                    &rfc3339(to),
                    period.resolution(),
                )
                .await?;
            Ok::<_, sunprobe_api::Error>((plant_id, envelope))
        }
        .await;

        let (plant_id, envelope) = match result {
            Ok(found) => found,
            Err(e) => {
                if e.is_auth_rejected() {
                    warn!("portal rejected the session during history fetch");
                    session.invalidate();
                }
                return Err(e.into());
            }
        };
        drop(session);

        let total = envelope.measurements.len();
        let points: Vec<HistoryPoint> = envelope
            .measurements
            .iter()
            .filter_map(|m| {
                let timestamp = DateTime::parse_from_rfc3339(m.timestamp.as_deref()?)
                    .ok()?
                    .with_timezone(&Utc);
                Some(HistoryPoint {
                    timestamp,
                    value: m.value()?,
                })
            })
            .collect();

        debug!(
            %period,
            plant_id = %plant_id,
            points = points.len(),
            skipped = total - points.len(),
            "history fetched"
        );

        Ok(HistorySeries {
            period,
            plant_id,
            from,
            to,
            points,
        })
    }
}
