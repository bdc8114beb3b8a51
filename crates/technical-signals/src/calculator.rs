use synth_core::{validate_bars, EngineError, MacdStatus, PriceBar, TechnicalSignal};

use crate::indicators::{macd, rsi};

const RSI_PERIOD: usize = 14;
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;
const VOLUME_LOOKBACK: usize = 20;

/// Tunable constants for the strength normalization. Each component is a
/// monotonic map of one indicator's distance from its neutral zone, clipped
/// to [0, 1]; the final strength is the mean of the present components.
#[derive(Debug, Clone)]
pub struct StrengthConfig {
    /// Divisor for |RSI - 50|; 40 maps RSI 10/90 to full strength
    pub rsi_divisor: f64,
    /// Divisor for the volume spike ratio; 3 maps a 3x spike to full strength
    pub volume_divisor: f64,
    /// Multiplier for the MACD histogram magnitude on directional labels
    pub macd_scale: f64,
}

impl Default for StrengthConfig {
    fn default() -> Self {
        Self {
            rsi_divisor: 40.0,
            volume_divisor: 3.0,
            macd_scale: 5.0,
        }
    }
}

pub struct TechnicalSignalCalculator {
    config: StrengthConfig,
}

impl TechnicalSignalCalculator {
    pub fn new() -> Self {
        Self { config: StrengthConfig::default() }
    }

    pub fn with_config(config: StrengthConfig) -> Self {
        Self { config }
    }

    /// Compute a technical signal from an ascending bar series.
    ///
    /// When the latest bar's volume is below 10% of the trailing 20-bar
    /// average the bar is treated as a partial trading day and the previous
    /// completed bar stands in as "latest" for every derived field.
    pub fn compute(&self, bars: &[PriceBar]) -> Result<TechnicalSignal, EngineError> {
        validate_bars(bars)?;

        if bars.len() < RSI_PERIOD + 1 {
            return Err(EngineError::InsufficientData(format!(
                "RSI({}) needs at least {} bars, got {}",
                RSI_PERIOD,
                RSI_PERIOD + 1,
                bars.len()
            )));
        }
        if bars.len() < VOLUME_LOOKBACK + 1 {
            return Err(EngineError::InsufficientData(format!(
                "volume average needs at least {} bars, got {}",
                VOLUME_LOOKBACK + 1,
                bars.len()
            )));
        }
        if bars.len() < MACD_SLOW {
            return Err(EngineError::InsufficientData(format!(
                "MACD({},{}) needs at least {} bars, got {}",
                MACD_FAST,
                MACD_SLOW,
                MACD_SLOW,
                bars.len()
            )));
        }

        let effective = self.effective_window(bars);

        let closes: Vec<f64> = effective.iter().map(|b| b.close).collect();

        let volume_spike_ratio = volume_ratio(effective)
            .ok_or_else(|| EngineError::InsufficientData("no trailing volume average".to_string()))?;

        let rsi_values = rsi(&closes, RSI_PERIOD);
        let rsi_value = *rsi_values
            .last()
            .ok_or_else(|| EngineError::InsufficientData("RSI series is empty".to_string()))?;

        let series = macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
        let (macd_status, macd_histogram) = crossover_state(&series.macd_line, &series.signal_line);

        let label = momentum_label(macd_status, macd_histogram);
        let strength = self.strength(rsi_value, volume_spike_ratio, &label, macd_histogram);

        Ok(TechnicalSignal {
            rsi: rsi_value,
            macd_status,
            macd_histogram,
            volume_spike_ratio,
            label: label.to_string(),
            strength,
        })
    }

    /// Drop the latest bar when its volume marks it as a partial day.
    /// Substitution needs at least one bar of slack beyond the minimums.
    fn effective_window<'a>(&self, bars: &'a [PriceBar]) -> &'a [PriceBar] {
        if bars.len() < 3 {
            return bars;
        }

        let latest = bars[bars.len() - 1].volume;
        let trailing = trailing_volume_mean(&bars[..bars.len() - 1]);
        if let Some(avg) = trailing {
            if avg > 0.0 && latest < avg * 0.1 {
                tracing::info!(
                    "latest volume {:.0} below 10% of {:.0} average, using previous completed bar",
                    latest,
                    avg
                );
                return &bars[..bars.len() - 1];
            }
        }
        bars
    }

    fn strength(&self, rsi_value: f64, volume_ratio: f64, label: &str, histogram: f64) -> f64 {
        let mut components = vec![
            ((rsi_value - 50.0).abs() / self.config.rsi_divisor).min(1.0),
            (volume_ratio / self.config.volume_divisor).min(1.0),
        ];

        if label.starts_with("Bullish") {
            components.push((histogram.max(0.0) * self.config.macd_scale).min(1.0));
        } else if label.starts_with("Bearish") {
            components.push(((-histogram).max(0.0) * self.config.macd_scale).min(1.0));
        }

        let sum: f64 = components.iter().sum();
        (sum / components.len() as f64).clamp(0.0, 1.0)
    }
}

impl Default for TechnicalSignalCalculator {
    fn default() -> Self {
        Self::new()
    }
}

/// Mean volume over the trailing `VOLUME_LOOKBACK` bars of `bars`
fn trailing_volume_mean(bars: &[PriceBar]) -> Option<f64> {
    if bars.is_empty() {
        return None;
    }
    let start = bars.len().saturating_sub(VOLUME_LOOKBACK);
    let window = &bars[start..];
    let sum: f64 = window.iter().map(|b| b.volume).sum();
    Some(sum / window.len() as f64)
}

/// Latest volume over the trailing average, excluding the latest bar
fn volume_ratio(bars: &[PriceBar]) -> Option<f64> {
    if bars.len() < 2 {
        return None;
    }
    let latest = bars[bars.len() - 1].volume;
    let avg = trailing_volume_mean(&bars[..bars.len() - 1])?;
    if avg > 0.0 {
        Some(latest / avg)
    } else {
        None
    }
}

/// Detect whether the MACD line crossed the signal line between the last two
/// points, returning the status and the latest histogram value.
fn crossover_state(macd_line: &[f64], signal_line: &[f64]) -> (MacdStatus, f64) {
    let n = macd_line.len().min(signal_line.len());
    if n == 0 {
        return (MacdStatus::Unknown, 0.0);
    }

    let diff = macd_line[n - 1] - signal_line[n - 1];
    if n < 2 {
        return (MacdStatus::Unknown, diff);
    }

    let prev_diff = macd_line[n - 2] - signal_line[n - 2];
    let crossed = (prev_diff <= 0.0 && diff > 0.0) || (prev_diff >= 0.0 && diff < 0.0);
    if crossed {
        (MacdStatus::Crossover, diff)
    } else {
        (MacdStatus::NoCrossover, diff)
    }
}

fn momentum_label(status: MacdStatus, histogram: f64) -> &'static str {
    match status {
        MacdStatus::Crossover => {
            if histogram > 0.0 {
                "Bullish Momentum (MACD Crossover)"
            } else if histogram < 0.0 {
                "Bearish Momentum (MACD Crossover)"
            } else {
                "Neutral Momentum (MACD Crossover)"
            }
        }
        MacdStatus::NoCrossover => {
            if histogram > 0.0 {
                "Bullish Momentum"
            } else if histogram < 0.0 {
                "Bearish Momentum"
            } else {
                "Neutral Momentum"
            }
        }
        MacdStatus::Unknown => "Insufficient Data",
    }
}
