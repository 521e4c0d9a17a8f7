//! Parsing of free-text vision model responses into battery records.
//!
//! The model is asked for a JSON object but replies in free text: the JSON
//! may be wrapped in explanatory prose, fenced as a markdown code block, or
//! both. Parsing is tolerant of all of these and never fails - a response
//! that cannot be understood yields zero records.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::models::battery::BatteryRecord;

/// Parse a vision model response into battery records.
///
/// Returns an empty list for missing/unparseable JSON or an absent/empty
/// `batteries` array. A field or type error in one battery object skips only
/// that object. `image_label` is used for logging only.
pub fn parse_vision_response(response_text: &str, image_label: &str) -> Vec<BatteryRecord> {
    let Some(candidate) = candidate_json(response_text) else {
        warn!("no JSON found in vision response for {}", image_label);
        return Vec::new();
    };

    let data: Value = match serde_json::from_str(&candidate) {
        Ok(value) => value,
        Err(e) => {
            warn!("failed to parse vision JSON for {}: {}", image_label, e);
            debug!("raw vision response for {}: {}", image_label, response_text);
            return Vec::new();
        }
    };

    let battery_list = match data.get("batteries").and_then(Value::as_array) {
        Some(list) => list,
        None => {
            warn!("vision response for {} has no batteries array", image_label);
            return Vec::new();
        }
    };

    let mut records = Vec::with_capacity(battery_list.len());
    for (i, entry) in battery_list.iter().enumerate() {
        match record_from_object(entry, i) {
            Ok(record) => records.push(record),
            Err(reason) => {
                warn!(
                    "skipping battery {} from vision response for {}: {}",
                    i + 1,
                    image_label,
                    reason
                );
            }
        }
    }

    // Auxiliary payload fields are informational only.
    let total_found = data
        .get("total_batteries_found")
        .and_then(Value::as_u64)
        .unwrap_or(records.len() as u64);
    info!("vision model reported {} batteries in {}", total_found, image_label);

    if let Some(notes) = data.get("notes").and_then(Value::as_str) {
        if !notes.is_empty() {
            debug!("vision model notes for {}: {}", image_label, notes);
        }
    }

    records
}

/// Locate the candidate JSON text inside a free-form response.
///
/// A ```json fenced block wins when present; otherwise the substring from
/// the first `{` to the last `}` is taken.
fn candidate_json(response: &str) -> Option<String> {
    if response.contains("```json") {
        let mut lines = Vec::new();
        let mut in_fence = false;

        for line in response.lines() {
            if line.contains("```json") {
                in_fence = true;
                continue;
            }
            if in_fence && line.contains("```") {
                break;
            }
            if in_fence {
                lines.push(line);
            }
        }

        if !lines.is_empty() {
            return Some(lines.join("\n"));
        }
    }

    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }
    Some(response[start..=end].to_string())
}

/// Build one record from a battery object, substituting placeholders for
/// null or absent fields. `index` is zero-based.
fn record_from_object(entry: &Value, index: usize) -> std::result::Result<BatteryRecord, String> {
    let obj = entry
        .as_object()
        .ok_or_else(|| format!("expected object, got {entry}"))?;

    let serial = match obj.get("serial_number") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Null) | None => format!("AI_UNKNOWN_{}", index + 1),
        Some(Value::String(_)) => format!("AI_UNKNOWN_{}", index + 1),
        Some(other) => return Err(format!("serial_number has wrong type: {other}")),
    };

    let model = match obj.get("model") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Null) | Some(Value::String(_)) | None => "UNKNOWN".to_string(),
        Some(other) => return Err(format!("model has wrong type: {other}")),
    };

    let energy = numeric_field(obj.get("energy"), "energy")?;
    let capacity = numeric_field(obj.get("capacity"), "capacity")?;
    let voltage = numeric_field(obj.get("voltage"), "voltage")?;

    if let Some(confidence) = obj.get("confidence").and_then(Value::as_f64) {
        debug!("battery {} reported with confidence {:.2}", index + 1, confidence);
    }

    Ok(BatteryRecord::new(serial, model, energy, capacity, voltage))
}

/// Read a numeric field, accepting JSON numbers and numeric strings.
/// Null or absent degrades to `0.0`; anything else is a type error.
fn numeric_field(value: Option<&Value>, field: &str) -> std::result::Result<f64, String> {
    match value {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| format!("{field} is not representable as f64")),
        Some(Value::String(s)) => s
            .parse::<f64>()
            .map_err(|_| format!("{field} has non-numeric value {s:?}")),
        Some(other) => Err(format!("{field} has wrong type: {other}")),
    }
}
