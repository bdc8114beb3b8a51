use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("No ratings data: {0}")]
    NoRatingsData(String),

    #[error("Incomplete bundle: {0}")]
    IncompleteBundle(String),

    #[error("Synthesis unavailable: {0}")]
    SynthesisUnavailable(String),
}

impl EngineError {
    /// Recoverable errors skip the symbol; the batch keeps going.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::SynthesisUnavailable(_))
    }
}
