use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::EngineError;

/// OHLCV bar data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
    }
}

/// Validate a bar series: ascending timestamps, no duplicates, finite fields,
/// non-negative volume.
pub fn validate_bars(bars: &[PriceBar]) -> Result<(), EngineError> {
    for (i, bar) in bars.iter().enumerate() {
        if !bar.is_finite() {
            return Err(EngineError::InvalidData(format!(
                "bar {} contains a non-finite field",
                i
            )));
        }
        if bar.volume < 0.0 {
            return Err(EngineError::InvalidData(format!(
                "bar {} has negative volume",
                i
            )));
        }
        if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
            return Err(EngineError::InvalidData(format!(
                "bar {} is not strictly after its predecessor",
                i
            )));
        }
    }
    Ok(())
}

/// MACD line vs. signal line relationship at the latest bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacdStatus {
    Crossover,
    NoCrossover,
    Unknown,
}

/// Derived technical signal for one symbol, recomputed per analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalSignal {
    /// RSI(14), 0-100
    pub rsi: f64,
    pub macd_status: MacdStatus,
    /// MACD line minus signal line at the latest bar
    pub macd_histogram: f64,
    /// Latest volume over the trailing 20-bar average
    pub volume_spike_ratio: f64,
    pub label: String,
    /// Distance from a neutral/uninformative state, 0-1
    pub strength: f64,
}

/// A headline with its source link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleLink {
    pub title: String,
    pub url: String,
    pub source: String,
}

/// News sentiment and media-buzz signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsSignal {
    /// -1 (bearish) to 1 (bullish)
    pub sentiment_score: f64,
    pub narrative: String,
    pub buzz_factor: f64,
    pub strength: f64,
    pub headlines: Vec<String>,
    pub links: Vec<ArticleLink>,
}

/// Corporate-event calendar signal
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventSignal {
    pub upcoming_earnings_date: Option<NaiveDate>,
    pub has_upcoming_event: bool,
}

/// Analyst rating bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RatingLabel {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl RatingLabel {
    /// Weight on the 1-5 consensus scale
    pub fn weight(&self) -> f64 {
        match self {
            RatingLabel::StrongBuy => 5.0,
            RatingLabel::Buy => 4.0,
            RatingLabel::Hold => 3.0,
            RatingLabel::Sell => 2.0,
            RatingLabel::StrongSell => 1.0,
        }
    }

    pub fn to_label(&self) -> &'static str {
        match self {
            RatingLabel::StrongBuy => "Strong Buy",
            RatingLabel::Buy => "Buy",
            RatingLabel::Hold => "Hold",
            RatingLabel::Sell => "Sell",
            RatingLabel::StrongSell => "Strong Sell",
        }
    }
}

/// A single analyst upgrade/downgrade action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingAction {
    pub date: Option<NaiveDate>,
    pub firm: Option<String>,
    pub from_grade: Option<String>,
    pub to_grade: Option<String>,
    pub action: Option<String>,
}

/// Analyst consensus signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingsSignal {
    pub consensus_label: RatingLabel,
    /// Weighted 1-5 summary of the distribution
    pub consensus_score: f64,
    pub distribution: BTreeMap<RatingLabel, u32>,
    pub mean_target_price: f64,
    pub latest_price: f64,
    pub target_price_change_pct: f64,
    pub recent_actions: Vec<RatingAction>,
}

/// Merged per-symbol signal set used as synthesis input.
/// Created fresh per analysis run; never shared across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalBundle {
    pub symbol: String,
    pub news: NewsSignal,
    pub technicals: TechnicalSignal,
    pub events: EventSignal,
    pub ratings: Option<RatingsSignal>,
}

/// Parsed synthesis output for one symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub symbol: String,
    pub forecast_text: String,
    /// None when no confidence pattern could be extracted. Distinct from a
    /// low score so ranking and tests can tell "low" from "unparseable".
    pub confidence_score: Option<f64>,
    pub raw_response_text: String,
}

/// Why a symbol was dropped from the ranked results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub reason: String,
}

/// Ranked batch output: results sorted by confidence descending (absent
/// last), plus per-symbol failures reported separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedReport {
    pub results: Vec<SynthesisResult>,
    pub failures: Vec<SymbolFailure>,
    pub generated_at: DateTime<Utc>,
}

/// Cross-signal agreement classification, diagnostics only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Consistency {
    Consistent,
    PartiallyConsistent,
    Inconsistent,
}
