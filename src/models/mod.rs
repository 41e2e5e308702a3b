//! Anomaly models
//!
//! The isolation forest and the parameters used to train it.

pub mod isolation_forest;

pub use isolation_forest::{average_path_length, IsolationForest, IsolationTree};

use serde::{Deserialize, Serialize};

use crate::error::{LedgerScanError, Result};

/// Upper bound on the default subsample size
pub const DEFAULT_MAX_SAMPLES: usize = 256;

/// Model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Number of trees (T)
    pub num_trees: usize,
    /// Rows drawn per tree (ψ); `None` uses `min(256, N)`
    pub sample_size: Option<usize>,
    /// Expected anomaly proportion (ρ), used only to place the threshold
    pub contamination: f64,
    /// Random seed for reproducibility; `None` draws one and records it
    pub seed: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            num_trees: 100,
            sample_size: None,
            contamination: 0.05,
            seed: None,
        }
    }
}

impl ModelConfig {
    pub fn with_trees(mut self, num_trees: usize) -> Self {
        self.num_trees = num_trees;
        self
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = Some(sample_size);
        self
    }

    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.num_trees == 0 {
            return Err(LedgerScanError::InvalidConfig(
                "num_trees must be at least 1".to_string(),
            ));
        }
        if !(self.contamination > 0.0 && self.contamination < 1.0) {
            return Err(LedgerScanError::InvalidConfig(format!(
                "contamination must be in (0, 1), got {}",
                self.contamination
            )));
        }
        if let Some(size) = self.sample_size {
            if size < 2 {
                return Err(LedgerScanError::InvalidConfig(format!(
                    "sample_size must be at least 2, got {}",
                    size
                )));
            }
        }
        Ok(())
    }

    /// Subsample size for a training set of `n_rows`
    ///
    /// Fails with `InsufficientData` when fewer than ψ (or fewer than 2) rows
    /// are available.
    pub fn resolve_sample_size(&self, n_rows: usize) -> Result<usize> {
        let size = self
            .sample_size
            .unwrap_or_else(|| n_rows.min(DEFAULT_MAX_SAMPLES));
        let required = size.max(2);
        if n_rows < required {
            return Err(LedgerScanError::InsufficientData {
                rows: n_rows,
                required,
            });
        }
        Ok(size)
    }
}
