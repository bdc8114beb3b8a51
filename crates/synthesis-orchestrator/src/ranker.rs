use std::cmp::Ordering;

use synth_core::SynthesisResult;

/// Stable sort by confidence score, highest first. Results with no parsed
/// score sort after every scored result; input order is preserved among
/// ties and among unscored entries.
pub fn rank(mut results: Vec<SynthesisResult>) -> Vec<SynthesisResult> {
    results.sort_by(|a, b| match (a.confidence_score, b.confidence_score) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    results
}
