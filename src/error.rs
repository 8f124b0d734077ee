//! Error taxonomy for loading and invoking the churn pipeline

use thiserror::Error;

/// Errors raised around the trained pipeline boundary
#[derive(Debug, Error)]
pub enum ChurnError {
    /// The artifact is missing, unreadable or internally inconsistent.
    /// Fatal at startup.
    #[error("failed to load model artifact '{path}': {reason}")]
    ArtifactLoad { path: String, reason: String },

    /// The classification call failed for one request
    #[error("inference failed: {0}")]
    Inference(String),

    /// Probability estimation is missing or failed. The adapter swallows this
    /// and reports the label alone.
    #[error("churn probability unavailable: {0}")]
    ProbabilityUnavailable(String),
}

impl ChurnError {
    pub(crate) fn artifact(path: &str, reason: impl Into<String>) -> Self {
        ChurnError::ArtifactLoad {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// A categorical value outside its training-time domain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field} value {value:?}")]
pub struct UnknownCategory {
    pub field: &'static str,
    pub value: String,
}
