pub mod prompt;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use synth_core::{EngineError, NarrativeGenerator, SignalBundle};

pub use prompt::describe_bundle;

/// Instruction sent with every synthesis request. The service answers in
/// Hebrew or English with an embedded forecast and a 1-10 confidence score.
const SYSTEM_INSTRUCTION: &str = "You are a senior quantitative financial analyst. \
Your goal is to identify stocks with the potential for a positive abnormal event today. \
An 'abnormal event' can be strong news sentiment, unusual media buzz, higher-than-average \
trading volume, or a clear technical signal. For the stock described below you must provide: \
1. Forecast: the expected abnormal event. \
2. Confidence Score: from 1 to 10. \
3. Causal Explanation: bullet points citing the specific data that led to your conclusion.";

/// Configuration for the narrative-generation service
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("SYNTHESIS_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8010".to_string()),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct SynthesisRequest<'a> {
    instruction: &'static str,
    prompt: String,
    bundle: &'a SignalBundle,
}

#[derive(Debug, Clone, Deserialize)]
struct SynthesisResponse {
    text: String,
}

/// HTTP client for the narrative-generation service. The only effectful
/// boundary in the engine; everything upstream of it is pure.
#[derive(Clone)]
pub struct SynthesisClient {
    client: reqwest::Client,
    base_url: String,
}

impl SynthesisClient {
    pub fn new(config: SynthesisConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EngineError::SynthesisUnavailable(format!("client build failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url,
        })
    }

    /// Check service health
    pub async fn health(&self) -> Result<bool, EngineError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|e| EngineError::SynthesisUnavailable(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

#[async_trait]
impl NarrativeGenerator for SynthesisClient {
    async fn synthesize(&self, bundle: &SignalBundle) -> Result<String, EngineError> {
        let request = SynthesisRequest {
            instruction: SYSTEM_INSTRUCTION,
            prompt: describe_bundle(bundle),
            bundle,
        };

        tracing::debug!("Submitting synthesis request for {}", bundle.symbol);

        let response = self
            .client
            .post(format!("{}/synthesize", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::SynthesisUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EngineError::SynthesisUnavailable(format!(
                "status: {}",
                response.status()
            )));
        }

        let result = response
            .json::<SynthesisResponse>()
            .await
            .map_err(|e| EngineError::SynthesisUnavailable(format!("bad response body: {}", e)))?;

        Ok(result.text)
    }
}
