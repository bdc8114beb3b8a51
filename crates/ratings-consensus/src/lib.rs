use std::collections::BTreeMap;

use synth_core::{EngineError, RatingAction, RatingLabel, RatingsSignal};

/// Computes a weighted 1-5 consensus from an analyst rating distribution and
/// target-price statistics.
pub struct RatingsConsensusCalculator;

impl RatingsConsensusCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn compute(
        &self,
        distribution: BTreeMap<RatingLabel, u32>,
        mean_target_price: f64,
        latest_price: f64,
        recent_actions: Vec<RatingAction>,
    ) -> Result<RatingsSignal, EngineError> {
        let total: u32 = distribution.values().sum();
        if total == 0 {
            return Err(EngineError::NoRatingsData(
                "analyst rating distribution is empty".to_string(),
            ));
        }

        if !latest_price.is_finite() || latest_price <= 0.0 {
            return Err(EngineError::InvalidData(format!(
                "latest price must be positive, got {}",
                latest_price
            )));
        }
        if !mean_target_price.is_finite() {
            return Err(EngineError::InvalidData(
                "mean target price is not finite".to_string(),
            ));
        }

        let weighted: f64 = distribution
            .iter()
            .map(|(label, &count)| label.weight() * count as f64)
            .sum();
        let consensus_score = weighted / total as f64;
        let consensus_label = bucket_label(consensus_score);

        let target_price_change_pct =
            (mean_target_price - latest_price) / latest_price * 100.0;

        Ok(RatingsSignal {
            consensus_label,
            consensus_score,
            distribution,
            mean_target_price,
            latest_price,
            target_price_change_pct,
            recent_actions,
        })
    }
}

impl Default for RatingsConsensusCalculator {
    fn default() -> Self {
        Self::new()
    }
}

/// Nearest-bucket label for a 1-5 consensus score
fn bucket_label(score: f64) -> RatingLabel {
    if score >= 4.5 {
        RatingLabel::StrongBuy
    } else if score >= 3.5 {
        RatingLabel::Buy
    } else if score >= 2.5 {
        RatingLabel::Hold
    } else if score >= 1.5 {
        RatingLabel::Sell
    } else {
        RatingLabel::StrongSell
    }
}
