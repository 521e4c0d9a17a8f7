//! Field extraction from raw OCR text.
//!
//! Each of the five battery fields is searched independently across the full
//! text; the per-field match lists are then aligned by position into records.

pub mod patterns;

use tracing::{debug, warn};

use crate::models::battery::BatteryRecord;
use patterns::{CAPACITY, ENERGY, MODEL, SERIAL_NUMBER, VOLTAGE};

/// Per-field match lists collected from one block of text.
///
/// Exposed alongside the aligned records so a stricter correlation strategy
/// (e.g. proximity in the source text) can replace positional alignment
/// without changing the extraction contract.
#[derive(Debug, Clone, Default)]
pub struct FieldMatches {
    /// All serial-number matches, in text order.
    pub serial_numbers: Vec<String>,
    /// All model matches, in text order.
    pub models: Vec<String>,
    /// All energy matches (numeric text, unit stripped), in text order.
    pub energies: Vec<String>,
    /// All capacity matches (numeric text, unit stripped), in text order.
    pub capacities: Vec<String>,
    /// All voltage matches (numeric text, unit stripped), in text order.
    pub voltages: Vec<String>,
}

impl FieldMatches {
    /// Collect all non-overlapping matches of every field pattern.
    pub fn scan(text: &str) -> Self {
        let capture_all = |re: &regex::Regex| -> Vec<String> {
            re.captures_iter(text).map(|c| c[1].to_string()).collect()
        };

        Self {
            serial_numbers: capture_all(&SERIAL_NUMBER),
            models: capture_all(&MODEL),
            energies: capture_all(&ENERGY),
            capacities: capture_all(&CAPACITY),
            voltages: capture_all(&VOLTAGE),
        }
    }

    /// Number of records the match lists imply.
    ///
    /// Heuristic: the cell count in an image is inferred from whichever
    /// field was most reliably recognized, not from any single pattern.
    pub fn record_count(&self) -> usize {
        [
            self.serial_numbers.len(),
            self.models.len(),
            self.energies.len(),
            self.capacities.len(),
            self.voltages.len(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// Align the match lists by positional index into records.
    ///
    /// This assumes the i-th serial number corresponds spatially to the i-th
    /// energy value and so on - a documented heuristic, not a guarantee.
    /// Fields with fewer matches than the record count fall back to their
    /// placeholder defaults. Chosen failure policy: a numeric match that
    /// fails conversion skips that whole record index rather than defaulting
    /// the single field; the skip is logged and never aborts the batch.
    pub fn align(&self) -> Vec<BatteryRecord> {
        let count = self.record_count();
        let mut records = Vec::with_capacity(count);

        for i in 0..count {
            let serial = self
                .serial_numbers
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("UNKNOWN_{}", i + 1));
            let model = self
                .models
                .get(i)
                .cloned()
                .unwrap_or_else(|| "UNKNOWN".to_string());

            let numeric = |matches: &[String], field: &str| -> Option<f64> {
                match matches.get(i) {
                    Some(raw) => match raw.parse::<f64>() {
                        Ok(value) => Some(value),
                        Err(_) => {
                            warn!("record {}: cannot parse {} value {:?}", i + 1, field, raw);
                            None
                        }
                    },
                    None => Some(0.0),
                }
            };

            let (energy, capacity, voltage) = match (
                numeric(&self.energies, "energy"),
                numeric(&self.capacities, "capacity"),
                numeric(&self.voltages, "voltage"),
            ) {
                (Some(e), Some(c), Some(v)) => (e, c, v),
                _ => continue,
            };

            records.push(BatteryRecord::new(serial, model, energy, capacity, voltage));
        }

        records
    }
}

/// Extract battery records from raw text.
///
/// Pure function: never fails, returns an empty list when no field pattern
/// matches anywhere in the text. `image_label` is used for logging only;
/// the returned records carry no provenance.
pub fn extract_battery_fields(text: &str, image_label: &str) -> Vec<BatteryRecord> {
    let matches = FieldMatches::scan(text);
    let records = matches.align();

    debug!(
        "extracted {} records from {} ({} serials, {} models, {} energies, {} capacities, {} voltages)",
        records.len(),
        image_label,
        matches.serial_numbers.len(),
        matches.models.len(),
        matches.energies.len(),
        matches.capacities.len(),
        matches.voltages.len(),
    );

    records
}
