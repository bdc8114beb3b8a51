use std::fmt::Write;

use synth_core::SignalBundle;

/// Render the bundle as the human-readable digest sent alongside the raw
/// JSON payload. The service cites these figures in its causal explanation.
pub fn describe_bundle(bundle: &SignalBundle) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Stock: {}", bundle.symbol);

    let news = &bundle.news;
    let _ = writeln!(
        out,
        "News: sentiment {:.2}, buzz factor {:.2}, strength {:.2}. {}",
        news.sentiment_score, news.buzz_factor, news.strength, news.narrative
    );
    for headline in news.headlines.iter().take(5) {
        let _ = writeln!(out, "  - {}", headline);
    }

    let tech = &bundle.technicals;
    let _ = writeln!(
        out,
        "Technicals: RSI {:.1}, {}, volume spike ratio {:.2}, strength {:.2}",
        tech.rsi, tech.label, tech.volume_spike_ratio, tech.strength
    );

    match bundle.events.upcoming_earnings_date {
        Some(date) => {
            let _ = writeln!(out, "Events: next earnings report on {}", date);
        }
        None => {
            let _ = writeln!(out, "Events: no upcoming earnings date on the calendar");
        }
    }

    match &bundle.ratings {
        Some(ratings) => {
            let _ = writeln!(
                out,
                "Analyst ratings: {} (consensus score {:.2}), mean target {:.2} vs last {:.2} ({:+.1}%)",
                ratings.consensus_label.to_label(),
                ratings.consensus_score,
                ratings.mean_target_price,
                ratings.latest_price,
                ratings.target_price_change_pct
            );
        }
        None => {
            let _ = writeln!(out, "Analyst ratings: no coverage data");
        }
    }

    out
}
