use synth_core::{Consistency, SignalBundle};

const STRONG_THRESHOLD: f64 = 0.7;
const RSI_OVERBOUGHT: f64 = 75.0;
const RSI_OVERSOLD: f64 = 25.0;

/// Whether the underlying signals actually agree. Diagnostics only: used to
/// flag narratives whose stated confidence clashes with the data, never to
/// override them.
pub fn classify(bundle: &SignalBundle) -> Consistency {
    let mut strong_bullish = 0u32;
    let mut strong_bearish = 0u32;

    for (strength, direction) in directional_signals(bundle) {
        if strength < STRONG_THRESHOLD {
            continue;
        }
        if direction > 0 {
            strong_bullish += 1;
        } else if direction < 0 {
            strong_bearish += 1;
        }
    }

    let classification = if strong_bullish > 0 && strong_bearish > 0 {
        Consistency::Inconsistent
    } else if strong_bullish >= 2 || strong_bearish >= 2 {
        Consistency::Consistent
    } else {
        Consistency::PartiallyConsistent
    };

    // An extreme RSI flags reversal risk: downgrade an otherwise-consistent
    // read by one level.
    let rsi = bundle.technicals.rsi;
    if classification == Consistency::Consistent
        && (rsi > RSI_OVERBOUGHT || rsi < RSI_OVERSOLD)
    {
        return Consistency::PartiallyConsistent;
    }

    classification
}

/// (strength, direction) per signal; direction is -1, 0, or 1.
/// Events carry no direction and never contribute.
fn directional_signals(bundle: &SignalBundle) -> Vec<(f64, i32)> {
    let mut signals = Vec::with_capacity(3);

    let news = &bundle.news;
    signals.push((news.strength, sign(news.sentiment_score)));

    let tech = &bundle.technicals;
    let tech_direction = if tech.label.starts_with("Bullish") {
        1
    } else if tech.label.starts_with("Bearish") {
        -1
    } else {
        0
    };
    signals.push((tech.strength, tech_direction));

    if let Some(ratings) = &bundle.ratings {
        // 3.0 is Hold, the neutral midpoint of the 1-5 scale
        let distance = ratings.consensus_score - 3.0;
        signals.push(((distance.abs() / 2.0).min(1.0), sign(distance)));
    }

    signals
}

fn sign(value: f64) -> i32 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use synth_core::{
        EventSignal, MacdStatus, NewsSignal, RatingLabel, RatingsSignal, TechnicalSignal,
    };

    fn bundle(
        news_strength: f64,
        sentiment: f64,
        tech_strength: f64,
        tech_label: &str,
        rsi: f64,
        ratings_score: Option<f64>,
    ) -> SignalBundle {
        SignalBundle {
            symbol: "TEST".to_string(),
            news: NewsSignal {
                sentiment_score: sentiment,
                narrative: String::new(),
                buzz_factor: 1.0,
                strength: news_strength,
                headlines: vec![],
                links: vec![],
            },
            technicals: TechnicalSignal {
                rsi,
                macd_status: MacdStatus::NoCrossover,
                macd_histogram: 0.0,
                volume_spike_ratio: 1.0,
                label: tech_label.to_string(),
                strength: tech_strength,
            },
            events: EventSignal::default(),
            ratings: ratings_score.map(|score| RatingsSignal {
                consensus_label: RatingLabel::Hold,
                consensus_score: score,
                distribution: BTreeMap::new(),
                mean_target_price: 0.0,
                latest_price: 1.0,
                target_price_change_pct: 0.0,
                recent_actions: vec![],
            }),
        }
    }

    #[test]
    fn test_two_strong_agreeing_signals_are_consistent() {
        let b = bundle(0.9, 0.8, 0.8, "Bullish Momentum", 58.0, None);
        assert_eq!(classify(&b), Consistency::Consistent);
    }

    #[test]
    fn test_strong_disagreement_is_inconsistent() {
        let b = bundle(0.9, 0.8, 0.8, "Bearish Momentum", 50.0, None);
        assert_eq!(classify(&b), Consistency::Inconsistent);
    }

    #[test]
    fn test_weak_signals_are_partially_consistent() {
        let b = bundle(0.3, 0.2, 0.4, "Bullish Momentum", 50.0, None);
        assert_eq!(classify(&b), Consistency::PartiallyConsistent);
    }

    #[test]
    fn test_extreme_rsi_downgrades_consistent() {
        let b = bundle(0.9, 0.8, 0.8, "Bullish Momentum", 82.0, None);
        assert_eq!(classify(&b), Consistency::PartiallyConsistent);
    }

    #[test]
    fn test_extreme_rsi_does_not_upgrade_inconsistent() {
        let b = bundle(0.9, 0.8, 0.8, "Bearish Momentum", 82.0, None);
        assert_eq!(classify(&b), Consistency::Inconsistent);
    }

    #[test]
    fn test_strong_ratings_count_toward_agreement() {
        // News strong bullish, ratings strong buy (score 4.6 -> strength 0.8)
        let b = bundle(0.9, 0.8, 0.2, "Neutral Momentum", 55.0, Some(4.6));
        assert_eq!(classify(&b), Consistency::Consistent);
    }
}
