use regex::Regex;

/// One ordered extraction rule: a named regex whose first capture group is
/// the value. Rules live in `Vec`s so they can be reordered and tested
/// independently.
pub struct PatternRule {
    pub name: &'static str,
    pub pattern: Regex,
}

impl PatternRule {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            // Patterns are fixed at compile time; a failure here is a
            // programming error, not a data error.
            pattern: Regex::new(pattern).expect("invalid built-in pattern"),
        }
    }
}

/// Confidence rules, most explicit first. The narrative generator writes
/// either English ("Confidence Score: 9/10") or Hebrew ("ציון ביטחון: 9/10"),
/// with or without the "/10" suffix; a bare "N/10" anywhere is the last
/// resort.
pub fn confidence_rules() -> Vec<PatternRule> {
    vec![
        PatternRule::new(
            "confidence-label-en",
            r"(?i)confidence\s*score[^0-9]*([0-9]+(?:\.[0-9]+)?)",
        ),
        PatternRule::new(
            "confidence-label-he",
            r"ציון\s*ביטחון[^0-9]*([0-9]+(?:\.[0-9]+)?)",
        ),
        PatternRule::new("bare-score-out-of-10", r"([0-9]+(?:\.[0-9]+)?)\s*/\s*10"),
    ]
}

/// Forecast line rules: a line opening with "Forecast:" or "תחזית:",
/// tolerating list bullets, numbering, and markdown bold around the label.
pub fn forecast_rules() -> Vec<PatternRule> {
    vec![
        PatternRule::new(
            "forecast-line-en",
            r"(?im)^[\s\-*#0-9.]*\**forecast[^:\n]*:\**\s*(.+)$",
        ),
        PatternRule::new(
            "forecast-line-he",
            r"(?m)^[\s\-*#0-9.]*\**תחזית[^:\n]*:\**\s*(.+)$",
        ),
    ]
}

/// Directional keywords scanned when no explicit forecast line exists
pub const FORECAST_KEYWORDS: &[&str] = &[
    "expected",
    "bullish",
    "bearish",
    "increase",
    "decrease",
    "rally",
    "decline",
    "upside",
    "downside",
    "צפויה",
    "צפוי",
    "עלייה",
    "ירידה",
    "חיובי",
    "שלילי",
    "מגמה",
];
