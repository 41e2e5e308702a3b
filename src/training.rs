//! Model training pipeline
//!
//! entries -> training matrix -> fitted model -> registry.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::anomaly::AnomalyModel;
use crate::dataset::{DatasetBuilder, TrainingMatrix};
use crate::entry::Entry;
use crate::error::Result;
use crate::features::{EntryEncoder, FeatureSchema};
use crate::models::ModelConfig;
use crate::storage::ModelRegistry;

/// Summary of a finished training run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingSummary {
    pub model_id: Option<String>,
    pub rows: usize,
    pub num_trees: usize,
    pub sample_size: usize,
    pub seed: u64,
    pub threshold: f64,
    pub contamination: f64,
    /// Training rows scoring above the threshold
    pub flagged_rows: usize,
    pub schema_version: u32,
    pub trained_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Model trainer
pub struct ModelTrainer {
    config: ModelConfig,
    schema: FeatureSchema,
}

impl Default for ModelTrainer {
    fn default() -> Self {
        Self::new(ModelConfig::default(), FeatureSchema::default())
    }
}

impl ModelTrainer {
    pub fn new(config: ModelConfig, schema: FeatureSchema) -> Self {
        Self { config, schema }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Encode `entries` under the trainer's schema
    pub fn build_matrix(&self, entries: &[Entry]) -> Result<TrainingMatrix> {
        let encoder = EntryEncoder::new(self.schema.clone());
        DatasetBuilder::new(&encoder).build(entries)
    }

    /// Train a model from raw entries
    pub fn train(&self, entries: &[Entry]) -> Result<(AnomalyModel, TrainingSummary)> {
        let started = Instant::now();
        let matrix = self.build_matrix(entries)?;
        let model = AnomalyModel::fit(&matrix, self.schema.clone(), &self.config)?;

        let flagged_rows = model
            .score_matrix(&matrix)?
            .into_iter()
            .filter(|&s| s > model.threshold())
            .count();

        let summary = TrainingSummary {
            model_id: None,
            rows: matrix.n_rows(),
            num_trees: model.forest().num_trees(),
            sample_size: model.forest().sample_size(),
            seed: model.forest().seed(),
            threshold: model.threshold(),
            contamination: model.contamination(),
            flagged_rows,
            schema_version: model.schema().version,
            trained_at: model.trained_at(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            "Training complete: {} rows, {} flagged above threshold {:.4} in {}ms",
            summary.rows, summary.flagged_rows, summary.threshold, summary.elapsed_ms
        );

        Ok((model, summary))
    }

    /// Train and store the result under `id`
    pub fn train_and_save(
        &self,
        entries: &[Entry],
        registry: &dyn ModelRegistry,
        id: &str,
    ) -> Result<(AnomalyModel, TrainingSummary)> {
        let (model, mut summary) = self.train(entries)?;
        registry.save(id, &model)?;
        summary.model_id = Some(id.to_string());
        Ok((model, summary))
    }
}
