//! Battery cell records produced by the recognition pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which extraction path produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecognitionMethod {
    /// The hosted multimodal model read the label.
    #[serde(rename = "AI_VISION")]
    AiVision,

    /// Deterministic preprocessing + OCR + pattern extraction.
    #[serde(rename = "TRADITIONAL_OCR")]
    TraditionalOcr,
}

impl std::fmt::Display for RecognitionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AiVision => f.write_str("AI_VISION"),
            Self::TraditionalOcr => f.write_str("TRADITIONAL_OCR"),
        }
    }
}

/// One recognized battery cell.
///
/// Extractors construct records without provenance; the pipeline fills in
/// `image_file` and `recognition_method` after extraction. Numeric fields
/// default to `0.0` and are never negative; `serial_number` and `model`
/// always carry a value, with placeholders substituting for absent data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryRecord {
    /// Serial number printed on the label (e.g. `C044160`).
    pub serial_number: String,

    /// Model designation (e.g. `6754E4`).
    pub model: String,

    /// Rated energy in watt-hours.
    pub energy: f64,

    /// Rated capacity in ampere-hours.
    pub capacity: f64,

    /// Nominal voltage in volts.
    pub voltage: f64,

    /// Originating image identifier, assigned by the pipeline.
    #[serde(default)]
    pub image_file: String,

    /// Provenance tag, assigned by the pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recognition_method: Option<RecognitionMethod>,
}

impl BatteryRecord {
    /// Create a record with no provenance. The pipeline decorates it later.
    pub fn new(
        serial_number: impl Into<String>,
        model: impl Into<String>,
        energy: f64,
        capacity: f64,
        voltage: f64,
    ) -> Self {
        Self {
            serial_number: serial_number.into(),
            model: model.into(),
            energy: energy.max(0.0),
            capacity: capacity.max(0.0),
            voltage: voltage.max(0.0),
            image_file: String::new(),
            recognition_method: None,
        }
    }

    /// Attach the originating image and extraction method.
    ///
    /// Called exactly once per record, by the pipeline, after an extractor
    /// returns its list.
    pub fn with_provenance(mut self, image_file: &str, method: RecognitionMethod) -> Self {
        self.image_file = image_file.to_string();
        self.recognition_method = Some(method);
        self
    }
}

/// Summary of one batch run, handed to the persistence collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Batch label (e.g. `Batch_20250114_153000`).
    pub batch_name: String,

    /// Number of cells recognized across the batch.
    pub total_cells: usize,

    /// When the batch finished processing.
    pub processed_at: DateTime<Utc>,
}

impl BatchSummary {
    /// Create a summary stamped with the current time and a derived name.
    pub fn new(total_cells: usize) -> Self {
        let now = Utc::now();
        Self {
            batch_name: format!("Batch_{}", now.format("%Y%m%d_%H%M%S")),
            total_cells,
            processed_at: now,
        }
    }
}
