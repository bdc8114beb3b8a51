pub mod bundle;
pub mod ranker;
pub mod validator;

#[cfg(test)]
mod engine_tests;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use narrative_parser::NarrativeParser;
use ratings_consensus::RatingsConsensusCalculator;
use serde::{Deserialize, Serialize};
use synth_core::{
    EngineError, EventSignal, NarrativeGenerator, NewsSignal, NullHistorySink, PriceBar,
    RankedReport, RatingAction, RatingLabel, RunHistorySink, SignalBundle,
    SymbolFailure, SynthesisResult,
};
use technical_signals::TechnicalSignalCalculator;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub use bundle::build_bundle;
pub use ranker::rank;
pub use validator::classify;

/// Raw ratings data before consensus calculation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRatingsInput {
    pub distribution: BTreeMap<RatingLabel, u32>,
    pub mean_target_price: f64,
    pub latest_price: f64,
    #[serde(default)]
    pub recent_actions: Vec<RatingAction>,
}

/// Pre-fetched per-symbol tool outputs, as delivered by the external data
/// collaborators. The engine derives the technical and ratings signals from
/// these and never fetches anything itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSymbolInput {
    pub symbol: String,
    pub news: Option<NewsSignal>,
    #[serde(default)]
    pub bars: Vec<PriceBar>,
    #[serde(default)]
    pub events: Option<EventSignal>,
    #[serde(default)]
    pub ratings: Option<RawRatingsInput>,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bounded worker pool size for concurrent synthesis requests
    pub concurrency: usize,
    /// Retries after the first failed synthesis attempt
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries
    pub retry_base_delay: Duration,
    /// Timeout applied to each synthesis call
    pub synthesis_timeout: Duration,
    /// Optional deadline for the whole batch; in-flight requests are
    /// aborted on expiry, completed results are kept
    pub batch_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_retries: 2,
            retry_base_delay: Duration::from_millis(500),
            synthesis_timeout: Duration::from_secs(30),
            batch_timeout: None,
        }
    }
}

/// Drives the per-symbol pipeline: derive signals, build bundles, submit
/// them to the narrative generator under a bounded worker pool, parse the
/// responses, and rank the batch.
pub struct SynthesisEngine {
    generator: Arc<dyn NarrativeGenerator>,
    technicals: TechnicalSignalCalculator,
    ratings: RatingsConsensusCalculator,
    parser: NarrativeParser,
    history: Arc<dyn RunHistorySink>,
    config: EngineConfig,
}

impl SynthesisEngine {
    pub fn new(generator: Arc<dyn NarrativeGenerator>, config: EngineConfig) -> Self {
        Self {
            generator,
            technicals: TechnicalSignalCalculator::new(),
            ratings: RatingsConsensusCalculator::new(),
            parser: NarrativeParser::new(),
            history: Arc::new(NullHistorySink),
            config,
        }
    }

    pub fn with_history_sink(mut self, sink: Arc<dyn RunHistorySink>) -> Self {
        self.history = sink;
        self
    }

    /// Derive the computed signals for one symbol and merge them into a
    /// bundle. An empty ratings distribution degrades to an absent ratings
    /// signal; anything else unusable fails the symbol.
    pub fn prepare_bundle(&self, input: RawSymbolInput) -> Result<SignalBundle, EngineError> {
        let technicals = if input.bars.is_empty() {
            None
        } else {
            Some(self.technicals.compute(&input.bars)?)
        };

        let ratings = match input.ratings {
            Some(raw) => match self.ratings.compute(
                raw.distribution,
                raw.mean_target_price,
                raw.latest_price,
                raw.recent_actions,
            ) {
                Ok(signal) => Some(signal),
                Err(EngineError::NoRatingsData(reason)) => {
                    tracing::debug!("{}: ratings degraded to absent ({})", input.symbol, reason);
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        build_bundle(&input.symbol, input.news, technicals, input.events, ratings)
    }

    /// Full batch run over raw inputs. Per-symbol failures never fail the
    /// batch; they are reported in the returned failure records.
    pub async fn run(&self, inputs: Vec<RawSymbolInput>) -> RankedReport {
        let mut bundles = Vec::with_capacity(inputs.len());
        let mut failures = Vec::new();

        for input in inputs {
            let symbol = input.symbol.trim().to_uppercase();
            match self.prepare_bundle(input) {
                Ok(bundle) => bundles.push(bundle),
                Err(e) => {
                    tracing::warn!("{}: dropped from batch: {}", symbol, e);
                    failures.push(SymbolFailure {
                        symbol,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let (results, synth_failures) = self.run_bundles(bundles).await;
        failures.extend(synth_failures);

        RankedReport {
            results: rank(results),
            failures,
            generated_at: Utc::now(),
        }
    }

    /// Submit prepared bundles to the narrative generator and parse the
    /// responses. Results come back in input order; callers rank them.
    pub async fn run_bundles(
        &self,
        bundles: Vec<SignalBundle>,
    ) -> (Vec<SynthesisResult>, Vec<SymbolFailure>) {
        let total = bundles.len();
        tracing::info!("Starting synthesis batch of {} symbols", total);

        let symbols: Vec<String> = bundles.iter().map(|b| b.symbol.clone()).collect();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks: JoinSet<(usize, Result<String, EngineError>)> = JoinSet::new();

        for (idx, bundle) in bundles.into_iter().enumerate() {
            let generator = Arc::clone(&self.generator);
            let semaphore = Arc::clone(&semaphore);
            let max_retries = self.config.max_retries;
            let base_delay = self.config.retry_base_delay;
            let call_timeout = self.config.synthesis_timeout;

            tasks.spawn(async move {
                // Closed only when the pool is dropped mid-batch
                let Ok(_permit) = semaphore.acquire().await else {
                    return (
                        idx,
                        Err(EngineError::SynthesisUnavailable(
                            "worker pool closed".to_string(),
                        )),
                    );
                };
                let outcome =
                    synthesize_with_retry(generator, &bundle, max_retries, base_delay, call_timeout)
                        .await;
                (idx, outcome)
            });
        }

        let deadline = self
            .config
            .batch_timeout
            .map(|d| tokio::time::Instant::now() + d);

        let mut outcomes: Vec<Option<Result<String, EngineError>>> = (0..total).map(|_| None).collect();

        loop {
            let joined = match deadline {
                Some(dl) => match tokio::time::timeout_at(dl, tasks.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        tracing::warn!("Batch timeout exceeded, aborting in-flight synthesis");
                        tasks.abort_all();
                        // Tasks that finished before the deadline may still
                        // be queued behind it; drain so their results are
                        // kept. Aborted tasks resolve immediately.
                        while let Some(drained) = tasks.join_next().await {
                            if let Ok((idx, outcome)) = drained {
                                outcomes[idx] = Some(outcome);
                            }
                        }
                        break;
                    }
                },
                None => tasks.join_next().await,
            };

            let Some(joined) = joined else { break };
            match joined {
                Ok((idx, outcome)) => outcomes[idx] = Some(outcome),
                Err(e) => tracing::error!("Synthesis task failed: {}", e),
            }
        }

        let mut results = Vec::new();
        let mut failures = Vec::new();

        for (idx, outcome) in outcomes.into_iter().enumerate() {
            let symbol = &symbols[idx];
            match outcome {
                Some(Ok(raw_text)) => {
                    let parsed = self.parser.parse(&raw_text);
                    let result = SynthesisResult {
                        symbol: symbol.clone(),
                        forecast_text: parsed.forecast_text,
                        confidence_score: parsed.confidence_score,
                        raw_response_text: raw_text,
                    };
                    self.history.record(&result);
                    results.push(result);
                }
                Some(Err(e)) => {
                    tracing::warn!("{}: synthesis failed: {}", symbol, e);
                    failures.push(SymbolFailure {
                        symbol: symbol.clone(),
                        reason: e.to_string(),
                    });
                }
                None => failures.push(SymbolFailure {
                    symbol: symbol.clone(),
                    reason: "synthesis did not complete before the batch deadline".to_string(),
                }),
            }
        }

        tracing::info!(
            "Synthesis batch complete: {}/{} succeeded, {} failed",
            results.len(),
            total,
            failures.len()
        );

        (results, failures)
    }
}

async fn synthesize_with_retry(
    generator: Arc<dyn NarrativeGenerator>,
    bundle: &SignalBundle,
    max_retries: u32,
    base_delay: Duration,
    call_timeout: Duration,
) -> Result<String, EngineError> {
    let mut attempt = 0u32;
    loop {
        let outcome = match tokio::time::timeout(call_timeout, generator.synthesize(bundle)).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::SynthesisUnavailable(format!(
                "timed out after {:?}",
                call_timeout
            ))),
        };

        match outcome {
            Ok(text) => return Ok(text),
            Err(e) if e.is_recoverable() && attempt < max_retries => {
                let delay = base_delay * 2u32.saturating_pow(attempt);
                tracing::warn!(
                    "{}: synthesis attempt {} failed ({}), retrying in {:?}",
                    bundle.symbol,
                    attempt + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
