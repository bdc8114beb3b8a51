use serde::{Deserialize, Serialize};

use crate::rules::{confidence_rules, forecast_rules, PatternRule, FORECAST_KEYWORDS};

const MIN_SCORE: f64 = 1.0;
const MAX_SCORE: f64 = 10.0;

/// Structured fields extracted from a free-text narrative. Parsing never
/// fails; missing patterns degrade to `None`/fallback values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedNarrative {
    pub confidence_score: Option<f64>,
    pub forecast_text: String,
}

pub struct NarrativeParser {
    confidence_rules: Vec<PatternRule>,
    forecast_rules: Vec<PatternRule>,
}

impl NarrativeParser {
    pub fn new() -> Self {
        Self {
            confidence_rules: confidence_rules(),
            forecast_rules: forecast_rules(),
        }
    }

    pub fn parse(&self, raw: &str) -> ParsedNarrative {
        ParsedNarrative {
            confidence_score: self.extract_confidence(raw),
            forecast_text: self.extract_forecast(raw),
        }
    }

    /// First rule whose first in-range match parses wins. Numbers outside
    /// [1, 10] are skipped so incidental figures ("volume is 150% above
    /// average") can never become a confidence score.
    fn extract_confidence(&self, raw: &str) -> Option<f64> {
        if raw.is_empty() {
            return None;
        }

        for rule in &self.confidence_rules {
            for captures in rule.pattern.captures_iter(raw) {
                let Some(group) = captures.get(1) else { continue };
                let Ok(value) = group.as_str().parse::<f64>() else { continue };
                if (MIN_SCORE..=MAX_SCORE).contains(&value) {
                    return Some(value);
                }
            }
        }
        None
    }

    fn extract_forecast(&self, raw: &str) -> String {
        for rule in &self.forecast_rules {
            if let Some(captures) = rule.pattern.captures(raw) {
                if let Some(group) = captures.get(1) {
                    let text = trim_markdown(group.as_str());
                    if !text.is_empty() {
                        return text.to_string();
                    }
                }
            }
        }

        if let Some(sentence) = first_keyword_sentence(raw) {
            return sentence;
        }

        first_non_empty_line(raw)
    }
}

impl Default for NarrativeParser {
    fn default() -> Self {
        Self::new()
    }
}

fn trim_markdown(text: &str) -> &str {
    text.trim().trim_matches('*').trim()
}

/// First sentence containing any directional keyword
fn first_keyword_sentence(raw: &str) -> Option<String> {
    for sentence in raw.split(['.', '!', '?', '\n']) {
        let trimmed = sentence.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lowered = trimmed.to_lowercase();
        if FORECAST_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            return Some(trimmed.to_string());
        }
    }
    None
}

fn first_non_empty_line(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
        .to_string()
}
