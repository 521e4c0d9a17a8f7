//! Core library for battery cell label recognition.
//!
//! This crate provides:
//! - A dual-strategy recognition pipeline (AI vision first, OCR fallback)
//! - Image preprocessing tuned for printed battery labels
//! - Regex-based field extraction (serial number, model, energy, capacity, voltage)
//! - Battery record models shared with downstream persistence and export

pub mod error;
pub mod models;
pub mod extract;
pub mod ocr;
pub mod vision;
pub mod pipeline;

pub use error::{OcrError, VisionError};
pub use models::battery::{BatchSummary, BatteryRecord, RecognitionMethod};
pub use models::status::{MethodStatus, RecognitionStatus};
pub use extract::{extract_battery_fields, FieldMatches};
pub use ocr::{ImageNormalizer, OcrAdapter, TextRecognitionEngine};
pub use vision::{parse_vision_response, VisionAnalyzer, VisionModelClient};
pub use pipeline::RecognitionPipeline;

#[cfg(feature = "native")]
pub use ocr::TesseractEngine;
