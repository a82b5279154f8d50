// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch.
//
// Columns: epoch, train_loss, valid_loss and one task metric
// whose name is chosen by the caller:
//
//   language model:  perplexity = exp(valid_loss)
//   classifier:      accuracy   in [0, 1]
//
// Example (language model):
//   epoch,train_loss,valid_loss,perplexity
//   1,5.912300,5.701200,299.127000
//   2,5.401000,5.350100,210.620000
//
// The file is appended to, so several runs in one directory
// produce one continuous log.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

/// One row of metrics for a single epoch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpochMetrics {
    pub epoch:      usize,
    pub train_loss: f64,
    pub valid_loss: f64,
    /// Perplexity or accuracy, depending on the task
    pub score:      f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, valid_loss: f64, score: f64) -> Self {
        Self { epoch, train_loss, valid_loss, score }
    }

    /// Returns true if this epoch improved over the previous best valid_loss
    pub fn is_improvement(&self, best_valid_loss: f64) -> bool {
        self.valid_loss < best_valid_loss
    }
}

/// exp(loss), capped so a diverged run logs a number rather than inf.
pub fn perplexity(loss: f64) -> f64 {
    loss.min(50.0).exp()
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Open `dir/metrics.csv`, writing the header if the file is new.
    pub fn new(dir: impl AsRef<Path>, score_name: &str) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "epoch,train_loss,valid_loss,{score_name}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch as a new row.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(
            f,
            "{},{:.6},{:.6},{:.6}",
            m.epoch, m.train_loss, m.valid_loss, m.score,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, valid_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.valid_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
