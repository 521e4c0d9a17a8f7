//! Data models for battery recognition results.

pub mod battery;
pub mod status;

pub use battery::{BatchSummary, BatteryRecord, RecognitionMethod};
pub use status::{MethodStatus, RecognitionStatus};
