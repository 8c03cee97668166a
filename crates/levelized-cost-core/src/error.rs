use thiserror::Error;

#[derive(Debug, Error)]
pub enum LevelizedCostError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Computation error: {0}")]
    Computation(String),

    #[error("Insufficient samples: all {failed} of {requested} Monte Carlo samples failed")]
    InsufficientSamples { requested: usize, failed: usize },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl LevelizedCostError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        LevelizedCostError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for LevelizedCostError {
    fn from(e: serde_json::Error) -> Self {
        LevelizedCostError::SerializationError(e.to_string())
    }
}
