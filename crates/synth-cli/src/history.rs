use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use synth_core::{RunHistorySink, SynthesisResult};

/// Appends one human-readable block per synthesized result to a log file,
/// so successive runs can be compared after the fact.
pub struct FileHistorySink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileHistorySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

impl RunHistorySink for FileHistorySink {
    fn record(&self, result: &SynthesisResult) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let score = result
            .confidence_score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "Not found".to_string());
        let entry = format!(
            "=== Stock Analysis Run ===\nTime: {}\nSymbol: {}\nConfidence Score: {}\nForecast: {}\n\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            result.symbol,
            score,
            result.forecast_text,
        );

        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(entry.as_bytes()));
        if let Err(e) = written {
            tracing::warn!("Failed to append run history to {}: {}", self.path.display(), e);
        }
    }
}
