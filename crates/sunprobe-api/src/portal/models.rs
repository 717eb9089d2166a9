// Wire types for the structured plant endpoints.
//
// The portal's JSON is loosely typed: numbers arrive as strings, ids as
// either numbers or strings, and list endpoints wrap their payload under
// different keys. These types accept all observed variants.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response from `/api/v1/plants/{id}/measurements`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MeasurementsEnvelope {
    #[serde(default)]
    pub measurements: Vec<MeasurementPoint>,
}

/// One point of a measurement series.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MeasurementPoint {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub power: Option<Value>,
    #[serde(default)]
    pub energy: Option<Value>,
}

impl MeasurementPoint {
    /// Point value: power when present, otherwise energy.
    pub fn value(&self) -> Option<f64> {
        self.power
            .as_ref()
            .and_then(numeric)
            .or_else(|| self.energy.as_ref().and_then(numeric))
    }
}

/// Interpret a JSON number or numeric string.
pub fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Identifier of the first plant in a plant listing.
///
/// Accepts a bare array or an object wrapping it under `plants`, `items`
/// or `data`. The id is taken from `id`, `plantId` or `oid`.
pub fn first_plant_id(listing: &Value) -> Option<String> {
    let plants = match listing {
        Value::Array(items) => items,
        Value::Object(map) => ["plants", "items", "data"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array))?,
        _ => return None,
    };

    plants.first().and_then(|plant| {
        ["id", "plantId", "oid"]
            .iter()
            .find_map(|k| match plant.get(*k)? {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    })
}
