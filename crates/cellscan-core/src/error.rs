//! Error types for the cellscan-core library.
//!
//! Each recognition path has its own error enum. Errors never cross the
//! pipeline boundary: the orchestrator logs them and degrades to an empty
//! record list, so there is no combined error type.

use thiserror::Error;

/// Errors related to the OCR fallback path.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to initialize the OCR engine.
    #[error("failed to initialize OCR engine: {0}")]
    EngineInit(String),

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Image preprocessing failed.
    #[error("preprocessing failed: {0}")]
    Preprocessing(String),

    /// The input image could not be loaded.
    #[error("unreadable image: {0}")]
    UnreadableImage(String),
}

/// Errors related to the vision model adapter.
///
/// These never escape the adapter: the pipeline's fallback trigger is an
/// empty record list, so the adapter logs and swallows them internally.
#[derive(Error, Debug)]
pub enum VisionError {
    /// No provider credential was configured. Not a fault - triggers fallback.
    #[error("vision provider not configured")]
    NotConfigured,

    /// Failed to read or encode the image file.
    #[error("failed to encode image {path}: {reason}")]
    Encode { path: String, reason: String },

    /// Transport-level failure (network, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider returned a non-success status.
    #[error("provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    /// The response carried no usable text content.
    #[error("empty response from provider")]
    EmptyResponse,
}
