// ── Canonical measurement record ──
//
// Normalized output of one acquisition: power in W, energy in kWh,
// voltage in V, current in A, efficiency in %. Built once by the
// classifier and handed to the caller unchanged.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::raw::{ExtractionMethod, RawExtractionRecord};

/// Whether the record came from a meaningful extraction or the
/// best-effort fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Success,
    Degraded,
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Degraded => f.write_str("degraded"),
        }
    }
}

/// Where a record came from and which values were inferred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub endpoint: String,
    pub timestamp: DateTime<Utc>,
    pub status: RecordStatus,
    /// `current_power` was synthesized as voltage x current.
    #[serde(rename = "estimatedFromVI")]
    pub estimated_from_vi: bool,
    /// Energy fields were synthesized from power and assumed sun-hours.
    pub estimated_daily: bool,
    /// Non-metadata values that survived classification.
    #[serde(default)]
    pub value_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<ExtractionMethod>,
}

/// One canonical field, for iteration and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    CurrentPower,
    DailyEnergy,
    MonthlyEnergy,
    YearlyEnergy,
    TotalEnergy,
    Voltage,
    Current,
    Efficiency,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 8] = [
        Self::CurrentPower,
        Self::DailyEnergy,
        Self::MonthlyEnergy,
        Self::YearlyEnergy,
        Self::TotalEnergy,
        Self::Voltage,
        Self::Current,
        Self::Efficiency,
    ];

    /// Wire name, as serialized.
    pub fn name(self) -> &'static str {
        match self {
            Self::CurrentPower => "currentPower",
            Self::DailyEnergy => "dailyEnergy",
            Self::MonthlyEnergy => "monthlyEnergy",
            Self::YearlyEnergy => "yearlyEnergy",
            Self::TotalEnergy => "totalEnergy",
            Self::Voltage => "voltage",
            Self::Current => "current",
            Self::Efficiency => "efficiency",
        }
    }

    pub fn is_energy(self) -> bool {
        matches!(
            self,
            Self::DailyEnergy | Self::MonthlyEnergy | Self::YearlyEnergy | Self::TotalEnergy
        )
    }
}

/// Normalized measurement snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementRecord {
    /// Watts.
    pub current_power: Option<f64>,
    /// kWh.
    pub daily_energy: Option<f64>,
    pub monthly_energy: Option<f64>,
    pub yearly_energy: Option<f64>,
    pub total_energy: Option<f64>,
    /// Volts.
    pub voltage: Option<f64>,
    /// Amperes.
    pub current: Option<f64>,
    /// Percent.
    pub efficiency: Option<f64>,
    /// Values that survived extraction but matched no canonical field.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub fields: IndexMap<String, f64>,
    /// Bookkeeping values (ids, timestamps, status codes).
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata: IndexMap<String, f64>,
    pub provenance: Provenance,
}

impl MeasurementRecord {
    pub fn get(&self, field: CanonicalField) -> Option<f64> {
        match field {
            CanonicalField::CurrentPower => self.current_power,
            CanonicalField::DailyEnergy => self.daily_energy,
            CanonicalField::MonthlyEnergy => self.monthly_energy,
            CanonicalField::YearlyEnergy => self.yearly_energy,
            CanonicalField::TotalEnergy => self.total_energy,
            CanonicalField::Voltage => self.voltage,
            CanonicalField::Current => self.current,
            CanonicalField::Efficiency => self.efficiency,
        }
    }

    /// Whether a populated field was inferred rather than measured.
    pub fn is_estimated(&self, field: CanonicalField) -> bool {
        match field {
            CanonicalField::CurrentPower => self.provenance.estimated_from_vi,
            f if f.is_energy() => self.provenance.estimated_daily,
            _ => false,
        }
    }

    /// A record is worth surfacing when it carries at least one reading
    /// beyond bookkeeping metadata.
    pub fn is_meaningful(&self) -> bool {
        let positive = |v: Option<f64>| v.is_some_and(|v| v > 0.0);
        positive(self.current_power)
            || self.daily_energy.is_some()
            || positive(self.voltage)
            || positive(self.current)
            || positive(self.efficiency)
            || !self.fields.is_empty()
            || self.provenance.value_count > 0
    }

    /// Re-express measured values as a raw record keyed by canonical names.
    ///
    /// Inferred values are left out so that classifying the result
    /// re-derives them the same way.
    pub fn to_raw(&self) -> RawExtractionRecord {
        let mut raw = RawExtractionRecord::new(self.provenance.endpoint.clone());
        for field in CanonicalField::ALL {
            if self.is_estimated(field) {
                continue;
            }
            if let Some(value) = self.get(field) {
                raw.insert(field.name(), value, ExtractionMethod::Json);
            }
        }
        for (key, value) in &self.fields {
            raw.insert(key.clone(), *value, ExtractionMethod::Json);
        }
        raw
    }

    pub fn populated_fields(&self) -> impl Iterator<Item = (CanonicalField, f64)> + '_ {
        CanonicalField::ALL
            .into_iter()
            .filter_map(|f| self.get(f).map(|v| (f, v)))
    }
}
