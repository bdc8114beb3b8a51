use async_trait::async_trait;

use crate::{EngineError, SignalBundle, SynthesisResult};

/// Boundary to the external narrative-generation service. The engine stays
/// pure behind this seam; tests substitute an in-memory implementation.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// Submit a signal bundle and return the raw free-text narrative.
    async fn synthesize(&self, bundle: &SignalBundle) -> Result<String, EngineError>;
}

/// Side-effect sink for run-history records. The engine reports through
/// this; front-ends decide where entries go (file, stdout, nowhere).
pub trait RunHistorySink: Send + Sync {
    fn record(&self, result: &SynthesisResult);
}

/// Sink that drops every record
pub struct NullHistorySink;

impl RunHistorySink for NullHistorySink {
    fn record(&self, _result: &SynthesisResult) {}
}
