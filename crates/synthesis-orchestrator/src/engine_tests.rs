use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use synth_core::{
    EngineError, MacdStatus, NarrativeGenerator, NewsSignal, PriceBar, RunHistorySink,
    SignalBundle, SynthesisResult, TechnicalSignal,
};

use crate::{build_bundle, EngineConfig, RawRatingsInput, RawSymbolInput, SynthesisEngine};

struct MockGenerator {
    responses: HashMap<String, String>,
    failing: Vec<String>,
    calls: AtomicU32,
}

impl MockGenerator {
    fn new(responses: Vec<(&str, &str)>, failing: Vec<&str>) -> Self {
        Self {
            responses: responses
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            failing: failing.into_iter().map(|s| s.to_string()).collect(),
            calls: AtomicU32::new(0),
        }
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl NarrativeGenerator for MockGenerator {
    async fn synthesize(&self, bundle: &SignalBundle) -> Result<String, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&bundle.symbol) {
            return Err(EngineError::SynthesisUnavailable(
                "service offline".to_string(),
            ));
        }
        self.responses.get(&bundle.symbol).cloned().ok_or_else(|| {
            EngineError::SynthesisUnavailable(format!("no canned response for {}", bundle.symbol))
        })
    }
}

/// Fails the first `failures` calls, then succeeds.
struct FlakyGenerator {
    failures: u32,
    calls: AtomicU32,
}

#[async_trait::async_trait]
impl NarrativeGenerator for FlakyGenerator {
    async fn synthesize(&self, _bundle: &SignalBundle) -> Result<String, EngineError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(EngineError::SynthesisUnavailable(
                "transient outage".to_string(),
            ));
        }
        Ok("Confidence Score: 6/10\nForecast: Recovery expected.".to_string())
    }
}

struct RejectingGenerator {
    calls: AtomicU32,
}

#[async_trait::async_trait]
impl NarrativeGenerator for RejectingGenerator {
    async fn synthesize(&self, _bundle: &SignalBundle) -> Result<String, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(EngineError::InvalidData("malformed bundle".to_string()))
    }
}

struct SlowGenerator;

#[async_trait::async_trait]
impl NarrativeGenerator for SlowGenerator {
    async fn synthesize(&self, _bundle: &SignalBundle) -> Result<String, EngineError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("Confidence Score: 5/10".to_string())
    }
}

/// Responds after a per-symbol delay, so some symbols can outlive a
/// batch deadline while others finish under it.
struct PacedGenerator {
    delays: HashMap<String, Duration>,
}

#[async_trait::async_trait]
impl NarrativeGenerator for PacedGenerator {
    async fn synthesize(&self, bundle: &SignalBundle) -> Result<String, EngineError> {
        if let Some(delay) = self.delays.get(&bundle.symbol) {
            tokio::time::sleep(*delay).await;
        }
        Ok("Confidence Score: 7/10\nForecast: Holds gains.".to_string())
    }
}

struct RecordingSink {
    recorded: Mutex<Vec<String>>,
}

impl RunHistorySink for RecordingSink {
    fn record(&self, result: &SynthesisResult) {
        self.recorded
            .lock()
            .expect("sink lock")
            .push(result.symbol.clone());
    }
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        concurrency: 4,
        max_retries: 2,
        retry_base_delay: Duration::from_millis(1),
        synthesis_timeout: Duration::from_secs(5),
        batch_timeout: None,
    }
}

fn news(sentiment: f64, strength: f64) -> NewsSignal {
    NewsSignal {
        sentiment_score: sentiment,
        narrative: "Coverage skews positive".to_string(),
        buzz_factor: 1.8,
        strength,
        headlines: vec!["Quarterly results beat expectations".to_string()],
        links: vec![],
    }
}

fn technicals() -> TechnicalSignal {
    TechnicalSignal {
        rsi: 58.0,
        macd_status: MacdStatus::Crossover,
        macd_histogram: 0.6,
        volume_spike_ratio: 2.3,
        label: "Bullish Momentum (MACD Crossover)".to_string(),
        strength: 0.7,
    }
}

fn bundle(symbol: &str) -> SignalBundle {
    build_bundle(symbol, Some(news(0.8, 0.9)), Some(technicals()), None, None)
        .expect("test bundle")
}

/// Flat closes with a single final jump; enough bars for every indicator.
fn jump_bars() -> Vec<PriceBar> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..40)
        .map(|i| {
            let close = if i == 39 { 110.0 } else { 100.0 };
            let volume = if i == 39 { 2300.0 } else { 1000.0 };
            PriceBar {
                timestamp: start + ChronoDuration::days(i),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume,
            }
        })
        .collect()
}

#[test]
fn test_strong_agreeing_bundle_classifies_as_consistent() {
    let b = bundle("NVDA");
    assert_eq!(crate::classify(&b), synth_core::Consistency::Consistent);
}

#[tokio::test]
async fn test_partial_batch_keeps_successes_and_reports_failures() {
    let generator = Arc::new(MockGenerator::new(
        vec![
            ("AAPL", "Confidence Score: 8/10\nForecast: Upside likely."),
            ("NVDA", "ציון ביטחון: 9/10\nתחזית: צפויה עלייה"),
        ],
        vec!["MSFT"],
    ));
    let engine = SynthesisEngine::new(generator.clone(), fast_config());

    let (results, failures) = engine
        .run_bundles(vec![bundle("AAPL"), bundle("MSFT"), bundle("NVDA")])
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].symbol, "AAPL");
    assert_eq!(results[0].confidence_score, Some(8.0));
    assert_eq!(results[1].symbol, "NVDA");
    assert_eq!(results[1].confidence_score, Some(9.0));

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].symbol, "MSFT");
    assert!(failures[0].reason.contains("service offline"));

    // One call each for the successes, initial try plus two retries for MSFT
    assert_eq!(generator.call_count(), 5);
}

#[tokio::test]
async fn test_transient_failure_recovers_within_retry_budget() {
    let generator = Arc::new(FlakyGenerator {
        failures: 2,
        calls: AtomicU32::new(0),
    });
    let engine = SynthesisEngine::new(generator.clone(), fast_config());

    let (results, failures) = engine.run_bundles(vec![bundle("AAPL")]).await;

    assert!(failures.is_empty());
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].confidence_score, Some(6.0));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_nonrecoverable_error_is_not_retried() {
    let generator = Arc::new(RejectingGenerator {
        calls: AtomicU32::new(0),
    });
    let engine = SynthesisEngine::new(generator.clone(), fast_config());

    let (results, failures) = engine.run_bundles(vec![bundle("AAPL")]).await;

    assert!(results.is_empty());
    assert_eq!(failures.len(), 1);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_batch_timeout_records_incomplete_symbols() {
    let mut config = fast_config();
    config.batch_timeout = Some(Duration::from_secs(1));
    config.synthesis_timeout = Duration::from_secs(60);
    let engine = SynthesisEngine::new(Arc::new(SlowGenerator), config);

    let (results, failures) = engine.run_bundles(vec![bundle("AAPL"), bundle("MSFT")]).await;

    assert!(results.is_empty());
    assert_eq!(failures.len(), 2);
    assert!(failures[0].reason.contains("batch deadline"));
}

#[tokio::test(start_paused = true)]
async fn test_batch_timeout_keeps_already_completed_results() {
    let mut config = fast_config();
    config.batch_timeout = Some(Duration::from_secs(1));
    config.synthesis_timeout = Duration::from_secs(60);

    let mut delays = HashMap::new();
    delays.insert("AAPL".to_string(), Duration::from_millis(100));
    delays.insert("MSFT".to_string(), Duration::from_secs(30));
    let engine = SynthesisEngine::new(Arc::new(PacedGenerator { delays }), config);

    let (results, failures) = engine.run_bundles(vec![bundle("AAPL"), bundle("MSFT")]).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].symbol, "AAPL");
    assert_eq!(results[0].confidence_score, Some(7.0));
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].symbol, "MSFT");
    assert!(failures[0].reason.contains("batch deadline"));
}

#[tokio::test]
async fn test_history_sink_receives_each_result() {
    let sink = Arc::new(RecordingSink {
        recorded: Mutex::new(Vec::new()),
    });
    let generator = Arc::new(MockGenerator::new(
        vec![
            ("AAPL", "Confidence Score: 7/10\nForecast: Flat."),
            ("NVDA", "Confidence Score: 9/10\nForecast: Up."),
        ],
        vec![],
    ));
    let engine = SynthesisEngine::new(generator, fast_config()).with_history_sink(sink.clone());

    let (results, _) = engine.run_bundles(vec![bundle("AAPL"), bundle("NVDA")]).await;

    assert_eq!(results.len(), 2);
    let recorded = sink.recorded.lock().expect("sink lock");
    assert_eq!(*recorded, vec!["AAPL".to_string(), "NVDA".to_string()]);
}

#[tokio::test]
async fn test_run_derives_signals_and_ranks_report() {
    let generator = Arc::new(MockGenerator::new(
        vec![
            ("NVDA", "ציון ביטחון: 9/10\nתחזית: צפויה עלייה"),
            ("AAPL", "Confidence Score: 7.5/10\nForecast: Gradual climb."),
        ],
        vec![],
    ));
    let engine = SynthesisEngine::new(generator, fast_config());

    let mut ratings_distribution = std::collections::BTreeMap::new();
    ratings_distribution.insert(synth_core::RatingLabel::StrongBuy, 12);
    ratings_distribution.insert(synth_core::RatingLabel::Buy, 20);
    ratings_distribution.insert(synth_core::RatingLabel::Hold, 5);

    let inputs = vec![
        RawSymbolInput {
            symbol: "aapl".to_string(),
            news: Some(news(0.4, 0.5)),
            bars: jump_bars(),
            events: None,
            ratings: None,
        },
        RawSymbolInput {
            symbol: "NVDA".to_string(),
            news: Some(news(0.8, 0.9)),
            bars: jump_bars(),
            events: None,
            ratings: Some(RawRatingsInput {
                distribution: ratings_distribution,
                mean_target_price: 150.0,
                latest_price: 110.0,
                recent_actions: vec![],
            }),
        },
    ];

    let report = engine.run(inputs).await;

    assert!(report.failures.is_empty());
    assert_eq!(report.results.len(), 2);
    // Ranked: NVDA (9.0) ahead of AAPL (7.5)
    assert_eq!(report.results[0].symbol, "NVDA");
    assert_eq!(report.results[0].confidence_score, Some(9.0));
    assert_eq!(report.results[0].forecast_text, "צפויה עלייה");
    assert_eq!(report.results[1].symbol, "AAPL");
    assert_eq!(report.results[1].confidence_score, Some(7.5));
}

#[tokio::test]
async fn test_symbol_with_unusable_bars_fails_without_sinking_batch() {
    let generator = Arc::new(MockGenerator::new(
        vec![("AAPL", "Confidence Score: 7/10\nForecast: Steady.")],
        vec![],
    ));
    let engine = SynthesisEngine::new(generator, fast_config());

    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let short_history: Vec<PriceBar> = (0..5)
        .map(|i| PriceBar {
            timestamp: start + ChronoDuration::days(i),
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.0,
            volume: 1000.0,
        })
        .collect();

    let inputs = vec![
        RawSymbolInput {
            symbol: "XYZ".to_string(),
            news: Some(news(0.1, 0.2)),
            bars: short_history,
            events: None,
            ratings: None,
        },
        RawSymbolInput {
            symbol: "AAPL".to_string(),
            news: Some(news(0.4, 0.5)),
            bars: jump_bars(),
            events: None,
            ratings: None,
        },
    ];

    let report = engine.run(inputs).await;

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].symbol, "AAPL");
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].symbol, "XYZ");
}

#[tokio::test]
async fn test_empty_ratings_distribution_degrades_to_absent() {
    let generator = Arc::new(MockGenerator::new(
        vec![("AAPL", "Confidence Score: 6/10\nForecast: Sideways.")],
        vec![],
    ));
    let engine = SynthesisEngine::new(generator, fast_config());

    let input = RawSymbolInput {
        symbol: "AAPL".to_string(),
        news: Some(news(0.2, 0.3)),
        bars: jump_bars(),
        events: None,
        ratings: Some(RawRatingsInput {
            distribution: std::collections::BTreeMap::new(),
            mean_target_price: 150.0,
            latest_price: 110.0,
            recent_actions: vec![],
        }),
    };

    let prepared = engine.prepare_bundle(input).expect("bundle");
    assert!(prepared.ratings.is_none());
}
