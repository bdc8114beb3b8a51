//! synth: rank stocks by synthesized forecast confidence.
//!
//! Reads pre-fetched per-symbol signals from a JSON file, derives the
//! computed indicators, sends each bundle to the narrative synthesis
//! service, and prints the batch ranked by parsed confidence score.
//!
//! Usage:
//!   cargo run -p synth-cli -- --input signals.json
//!   cargo run -p synth-cli -- --input signals.json --stocks NVDA,AAPL,MSFT
//!   cargo run -p synth-cli -- --input signals.json --concurrency 8 --timeout-secs 45

mod history;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use synthesis_client::{SynthesisClient, SynthesisConfig};
use synthesis_orchestrator::{EngineConfig, RawSymbolInput, SynthesisEngine};

use history::FileHistorySink;

#[derive(Parser)]
#[command(name = "synth")]
#[command(about = "Rank stocks by synthesized forecast confidence", long_about = None)]
struct Cli {
    /// JSON file of pre-fetched per-symbol signals
    #[arg(long, default_value = "signals.json")]
    input: PathBuf,

    /// Comma-separated tickers to evaluate; defaults to every symbol in the input file
    #[arg(long)]
    stocks: Option<String>,

    /// Base URL of the synthesis service (falls back to SYNTHESIS_SERVICE_URL)
    #[arg(long)]
    synthesis_url: Option<String>,

    /// Max concurrent synthesis requests
    #[arg(long, default_value = "4")]
    concurrency: usize,

    /// Per-request synthesis timeout in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Optional deadline for the whole batch in seconds
    #[arg(long)]
    batch_timeout_secs: Option<u64>,

    /// File run history is appended to
    #[arg(long, default_value = "run_history.log")]
    history_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "synth_cli=info,synthesis_orchestrator=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let raw = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let mut inputs: Vec<RawSymbolInput> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", cli.input.display()))?;

    if let Some(stocks) = &cli.stocks {
        let wanted: Vec<String> = stocks
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if wanted.is_empty() {
            bail!("--stocks contained no symbols");
        }
        for symbol in &wanted {
            if !inputs
                .iter()
                .any(|i| i.symbol.trim().to_uppercase() == *symbol)
            {
                tracing::warn!("{}: no signals in {}", symbol, cli.input.display());
            }
        }
        inputs.retain(|i| wanted.contains(&i.symbol.trim().to_uppercase()));
    }
    if inputs.is_empty() {
        bail!("no symbols to evaluate");
    }

    let mut synthesis_config = SynthesisConfig::default();
    if let Some(url) = cli.synthesis_url {
        synthesis_config.base_url = url;
    }
    synthesis_config.timeout = Duration::from_secs(cli.timeout_secs);
    let client = SynthesisClient::new(synthesis_config)?;

    match client.health().await {
        Ok(true) => {}
        Ok(false) => tracing::warn!("Synthesis service reported unhealthy"),
        Err(e) => tracing::warn!("Synthesis service health check failed: {}", e),
    }

    let engine_config = EngineConfig {
        concurrency: cli.concurrency,
        synthesis_timeout: Duration::from_secs(cli.timeout_secs),
        batch_timeout: cli.batch_timeout_secs.map(Duration::from_secs),
        ..EngineConfig::default()
    };
    let engine = SynthesisEngine::new(Arc::new(client), engine_config)
        .with_history_sink(Arc::new(FileHistorySink::new(&cli.history_file)));

    let report = engine.run(inputs).await;

    println!(
        "Ranked forecasts ({})",
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    println!();
    for result in &report.results {
        let score = result
            .confidence_score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "Not found".to_string());
        println!("--- {} ---", result.symbol);
        println!("Confidence Score: {}", score);
        println!("Forecast: {}", result.forecast_text);
        println!();
    }

    if !report.failures.is_empty() {
        eprintln!("Failed symbols:");
        for failure in &report.failures {
            eprintln!("  {}: {}", failure.symbol, failure.reason);
        }
        std::process::exit(1);
    }

    Ok(())
}
