pub mod parser;
pub mod rules;


pub use parser::{NarrativeParser, ParsedNarrative};
pub use rules::{confidence_rules, forecast_rules, PatternRule};
