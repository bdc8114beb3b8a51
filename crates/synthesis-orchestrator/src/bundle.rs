use synth_core::{
    EngineError, EventSignal, NewsSignal, RatingsSignal, SignalBundle, TechnicalSignal,
};

/// Merge the four per-symbol tool outputs into a bundle. Pure validation,
/// no computation: news and technicals are required; events default to an
/// empty-state record and ratings degrade to absent.
pub fn build_bundle(
    symbol: &str,
    news: Option<NewsSignal>,
    technicals: Option<TechnicalSignal>,
    events: Option<EventSignal>,
    ratings: Option<RatingsSignal>,
) -> Result<SignalBundle, EngineError> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(EngineError::IncompleteBundle(
            "symbol is blank".to_string(),
        ));
    }

    let news = news.ok_or_else(|| {
        EngineError::IncompleteBundle(format!("{}: news signal is missing", symbol))
    })?;
    let technicals = technicals.ok_or_else(|| {
        EngineError::IncompleteBundle(format!("{}: technical signal is missing", symbol))
    })?;

    Ok(SignalBundle {
        symbol,
        news,
        technicals,
        events: events.unwrap_or_default(),
        ratings,
    })
}
