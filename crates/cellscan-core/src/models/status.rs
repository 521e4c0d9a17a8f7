//! Read-only status reporting for the recognition methods.

use serde::{Deserialize, Serialize};

/// Availability and description of one recognition method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodStatus {
    /// Human-readable method name.
    pub name: String,

    /// Whether this path can currently run.
    pub available: bool,

    /// Operator-facing description.
    pub description: String,

    /// Provider model identifier, when the method is backed by one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Status of all recognition methods, as reported to operators and clients.
///
/// Purely informational: querying it has no effect on recognition behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionStatus {
    /// One entry per recognition method.
    pub methods: Vec<MethodStatus>,

    /// Name of the method the pipeline will try first.
    pub preferred: String,
}
