// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each iteration.
//
// Metrics recorded per iteration (one traversal of the
// training partition, capped by max_batches_per_epoch):
//   - step:       global step counter, continues across restores
//   - loss:       CTC loss summed over the processed batches
//   - error_rate: mean normalised edit distance of the last batch
//   - batches:    batches that completed an optimiser update
//   - skipped:    batches dropped after a recoverable failure
//
// Output file: <model_path>/metrics.csv
//
//   step,loss,error_rate,batches,skipped
//   0,812.402100,1.000000,100,0
//   1,640.177300,0.954500,100,0
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

const HEADER: &str = "step,loss,error_rate,batches,skipped";

/// One row of metrics for a single training iteration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub step:       usize,
    pub loss:       f64,
    pub error_rate: f64,
    pub batches:    usize,
    pub skipped:    usize,
    /// (ground truth, prediction) pairs of the last completed batch
    #[serde(skip)]
    pub samples:    Vec<(String, String)>,
}

impl EpochMetrics {
    pub fn new(step: usize) -> Self {
        Self { step, ..Self::default() }
    }

    /// Fold one completed batch into the iteration totals
    pub fn record_batch(&mut self, loss: f64, error_rate: f64, samples: Vec<(String, String)>) {
        self.loss       += loss;
        self.error_rate  = error_rate;
        self.batches    += 1;
        self.samples     = samples;
    }

    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    /// Mean loss per completed batch, NaN if none completed
    pub fn mean_loss(&self) -> f64 {
        if self.batches > 0 { self.loss / self.batches as f64 } else { f64::NAN }
    }
}

/// Appends iteration metrics to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet, so a
    /// restored run appends to the log of the previous one.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(
            f,
            "{},{:.6},{:.6},{},{}",
            m.step, m.loss, m.error_rate, m.batches, m.skipped,
        )?;

        tracing::debug!("Logged step {} metrics: loss={:.4}", m.step, m.loss);
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
