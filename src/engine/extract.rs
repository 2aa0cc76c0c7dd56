//! Tolerant extraction of battery level and odometer from telemetry payloads.
//!
//! Payload shapes vary across device firmware generations, so each field is
//! looked up through an ordered list of dot-notation paths tried in sequence;
//! the first path that resolves to a plausible number wins. No rigid schema,
//! no errors — a payload that matches nothing simply yields `None`.

#![allow(missing_docs)]

use serde_json::Value;

/// Known payload locations for the battery charge level (percent).
const BATTERY_PATHS: &[&str] = &[
    "battery.level",
    "status.battery.percentage",
    "vehicle_state.battery_level",
    "batteryLevel",
];

/// Known payload locations for the odometer reading (km).
const ODOMETER_PATHS: &[&str] = &[
    "odometer.km",
    "status.odometer.value",
    "vehicle_state.odometer_km",
    "odometerKm",
];

/// Resolve a dot-notation path to a value in JSON.
///
/// Supports array indexing ("items.0.name").
#[must_use]
pub fn resolve_json_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(data);
    }

    let mut current = data;
    for part in path.split('.') {
        match current {
            Value::Object(obj) => {
                current = obj.get(part)?;
            }
            Value::Array(arr) => {
                let index: usize = part.parse().ok()?;
                current = arr.get(index)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

/// Coerce a JSON value to f64. Numeric strings are accepted; firmware that
/// serializes numbers as strings exists in the field.
#[must_use]
pub fn value_to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn extract_first(payload: &Value, paths: &[&str]) -> Option<f64> {
    paths
        .iter()
        .find_map(|path| resolve_json_path(payload, path).and_then(value_to_float))
}

/// Battery charge level in percent, if present and in [0, 100].
#[must_use]
pub fn extract_battery_level(payload: &Value) -> Option<f64> {
    extract_first(payload, BATTERY_PATHS).filter(|pct| (0.0..=100.0).contains(pct))
}

/// Odometer reading in km, if present and non-negative.
#[must_use]
pub fn extract_odometer_km(payload: &Value) -> Option<f64> {
    extract_first(payload, ODOMETER_PATHS).filter(|km| *km >= 0.0)
}
