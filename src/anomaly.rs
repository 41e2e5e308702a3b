//! Trained anomaly model and scoring verdicts
//!
//! [`AnomalyModel`] is the persisted artifact: the isolation forest, the
//! decision threshold calibrated from the contamination rate, and the feature
//! schema the forest was trained under.
//!
//! Score convention: the raw isolation score in `(0, 1]`, higher = more
//! anomalous. Scores near 1 are isolated quickly; scores at or below 0.5 are
//! unremarkable.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::dataset::TrainingMatrix;
use crate::error::Result;
use crate::features::{EntryEncoder, FeatureSchema, FeatureVector};
use crate::models::{IsolationForest, ModelConfig};

/// Result of scoring one entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    /// Isolation score, higher = more anomalous
    pub score: f64,
    /// Whether the score exceeds the model threshold
    pub is_anomaly: bool,
}

/// Trained model artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyModel {
    /// Schema the forest was trained under
    schema: FeatureSchema,
    /// Isolation forest
    forest: IsolationForest,
    /// Scores strictly above this are anomalies
    threshold: f64,
    /// Contamination rate the threshold was calibrated with
    contamination: f64,
    /// Training timestamp
    trained_at: DateTime<Utc>,
    /// Number of rows used
    sample_count: u64,
    /// Crate version that produced the artifact
    version: String,
}

impl AnomalyModel {
    /// Train a forest on `matrix` and calibrate the decision threshold
    ///
    /// The threshold is the `(1 - contamination)` quantile of the training
    /// scores, so roughly `contamination` of the training rows land above it.
    pub fn fit(matrix: &TrainingMatrix, schema: FeatureSchema, config: &ModelConfig) -> Result<Self> {
        config.validate()?;
        schema.check(matrix.schema(), matrix.width())?;

        let sample_size = config.resolve_sample_size(matrix.n_rows())?;
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());

        debug!(
            "Fitting isolation forest: {} rows, {} trees, sample size {}, seed {}",
            matrix.n_rows(),
            config.num_trees,
            sample_size,
            seed
        );

        let forest = IsolationForest::fit(matrix, config.num_trees, sample_size, seed);
        let mut scores = score_rows(&forest, matrix);
        let threshold = quantile(&mut scores, 1.0 - config.contamination);

        info!(
            "Trained isolation forest on {} rows ({} trees), threshold {:.4}",
            matrix.n_rows(),
            forest.num_trees(),
            threshold
        );

        Ok(Self {
            schema,
            forest,
            threshold,
            contamination: config.contamination,
            trained_at: Utc::now(),
            sample_count: matrix.n_rows() as u64,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Score one encoded vector against the forest and threshold
    ///
    /// Fails with `SchemaMismatch` if the vector was produced under a
    /// different schema version or label space, or has the wrong width.
    pub fn evaluate(&self, vector: &FeatureVector) -> Result<Verdict> {
        self.schema.check(vector.schema, vector.len())?;
        Ok(self.verdict(self.forest.score(vector.as_slice())))
    }

    /// Score untagged values; only the width can be checked
    pub(crate) fn evaluate_values(&self, values: &[f64]) -> Result<Verdict> {
        self.schema.check(self.schema.tag(), values.len())?;
        Ok(self.verdict(self.forest.score(values)))
    }

    /// Scores for every row of a matrix, in row order
    pub fn score_matrix(&self, matrix: &TrainingMatrix) -> Result<Vec<f64>> {
        self.schema.check(matrix.schema(), matrix.width())?;
        Ok(score_rows(&self.forest, matrix))
    }

    #[inline]
    fn verdict(&self, score: f64) -> Verdict {
        Verdict {
            score,
            is_anomaly: score > self.threshold,
        }
    }

    /// Encoder for this model's schema
    pub fn encoder(&self) -> EntryEncoder {
        EntryEncoder::new(self.schema.clone())
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn forest(&self) -> &IsolationForest {
        &self.forest
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

fn score_rows(forest: &IsolationForest, matrix: &TrainingMatrix) -> Vec<f64> {
    #[cfg(feature = "parallel")]
    {
        (0..matrix.n_rows())
            .into_par_iter()
            .map(|i| forest.score(matrix.row(i)))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        matrix.rows().map(|row| forest.score(row)).collect()
    }
}

/// Linear-interpolation quantile; sorts `values` in place
fn quantile(values: &mut [f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(f64::total_cmp);

    let pos = q.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    values[lo] + (values[hi] - values[lo]) * (pos - lo as f64)
}
