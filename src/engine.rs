//! Scoring engine
//!
//! Holds the live model as shared read-only state. A caller loads it once
//! from a registry, scores entries from any number of threads, and replaces
//! it with [`ScoringEngine::reload`] or [`ScoringEngine::swap`]. Readers clone
//! the current `Arc` under a short read lock, so an in-flight evaluation
//! always finishes against the forest it started with.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::anomaly::{AnomalyModel, Verdict};
use crate::entry::Entry;
use crate::error::Result;
use crate::features::{EntryEncoder, FeatureVector};
use crate::storage::ModelRegistry;

/// A model together with the encoder built from its own schema
#[derive(Debug)]
pub struct LoadedModel {
    id: String,
    model: AnomalyModel,
    encoder: EntryEncoder,
    loaded_at: DateTime<Utc>,
}

impl LoadedModel {
    pub fn new(id: impl Into<String>, model: AnomalyModel) -> Self {
        let encoder = model.encoder();
        Self {
            id: id.into(),
            model,
            encoder,
            loaded_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model(&self) -> &AnomalyModel {
        &self.model
    }

    pub fn encoder(&self) -> &EntryEncoder {
        &self.encoder
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Encode and score one entry
    pub fn score_entry(&self, entry: &Entry) -> Result<Verdict> {
        let vector = self.encoder.encode(entry)?;
        self.model.evaluate(&vector)
    }
}

#[derive(Debug, Default)]
struct Counters {
    entries_scored: AtomicU64,
    anomalies_detected: AtomicU64,
    requests_rejected: AtomicU64,
    reloads: AtomicU64,
}

/// Engine statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub model_id: String,
    pub entries_scored: u64,
    pub anomalies_detected: u64,
    pub requests_rejected: u64,
    pub reloads: u64,
}

/// Thread-safe scoring front end over a hot-swappable model
pub struct ScoringEngine {
    current: RwLock<Arc<LoadedModel>>,
    counters: Counters,
}

impl ScoringEngine {
    /// Load `id` from the registry; fails with `ModelNotFound` if absent
    pub fn load(registry: &dyn ModelRegistry, id: &str) -> Result<Self> {
        let model = registry.load(id)?;
        info!(
            "Scoring engine initialized with model '{}' (schema v{}, {} trees)",
            id,
            model.schema().version,
            model.forest().num_trees()
        );
        Ok(Self::from_model(id, model))
    }

    /// Wrap an already trained model
    pub fn from_model(id: impl Into<String>, model: AnomalyModel) -> Self {
        Self {
            current: RwLock::new(Arc::new(LoadedModel::new(id, model))),
            counters: Counters::default(),
        }
    }

    /// Snapshot of the live model
    pub fn current(&self) -> Arc<LoadedModel> {
        Arc::clone(&self.current.read())
    }

    /// Replace the live model, returning the previous one
    pub fn swap(&self, id: impl Into<String>, model: AnomalyModel) -> Arc<LoadedModel> {
        let next = Arc::new(LoadedModel::new(id, model));
        let previous = std::mem::replace(&mut *self.current.write(), Arc::clone(&next));
        self.counters.reloads.fetch_add(1, Ordering::Relaxed);
        info!(
            "Swapped model '{}' -> '{}' (threshold {:.4})",
            previous.id(),
            next.id(),
            next.model().threshold()
        );
        previous
    }

    /// Re-read the live model's id from the registry and swap it in
    ///
    /// On failure the current model stays in place.
    pub fn reload(&self, registry: &dyn ModelRegistry) -> Result<()> {
        let id = self.current().id().to_string();
        self.reload_as(registry, &id)
    }

    /// Load `id` from the registry and swap it in
    pub fn reload_as(&self, registry: &dyn ModelRegistry, id: &str) -> Result<()> {
        let model = registry.load(id).inspect_err(|e| {
            warn!("Reload of model '{}' failed, keeping current model: {}", id, e);
        })?;
        self.swap(id, model);
        Ok(())
    }

    /// Encode and score one entry with the live model
    pub fn score_entry(&self, entry: &Entry) -> Result<Verdict> {
        let loaded = self.current();
        self.record(loaded.score_entry(entry))
    }

    /// Score an already encoded vector with the live model
    pub fn score_vector(&self, vector: &FeatureVector) -> Result<Verdict> {
        let loaded = self.current();
        self.record(loaded.model().evaluate(vector))
    }

    /// Score a batch against a single model snapshot
    ///
    /// Each entry gets its own result; one malformed entry does not fail
    /// the rest of the batch.
    pub fn score_batch(&self, entries: &[Entry]) -> Vec<Result<Verdict>> {
        let loaded = self.current();
        debug!("Scoring batch of {} entries with '{}'", entries.len(), loaded.id());

        #[cfg(feature = "parallel")]
        let results: Vec<Result<Verdict>> = entries
            .par_iter()
            .map(|entry| loaded.score_entry(entry))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let results: Vec<Result<Verdict>> =
            entries.iter().map(|entry| loaded.score_entry(entry)).collect();

        results.into_iter().map(|r| self.record(r)).collect()
    }

    fn record(&self, result: Result<Verdict>) -> Result<Verdict> {
        match &result {
            Ok(verdict) => {
                self.counters.entries_scored.fetch_add(1, Ordering::Relaxed);
                if verdict.is_anomaly {
                    self.counters.anomalies_detected.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(e) => {
                self.counters.requests_rejected.fetch_add(1, Ordering::Relaxed);
                debug!("Rejected scoring request: {}", e);
            }
        }
        result
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            model_id: self.current().id().to_string(),
            entries_scored: self.counters.entries_scored.load(Ordering::Relaxed),
            anomalies_detected: self.counters.anomalies_detected.load(Ordering::Relaxed),
            requests_rejected: self.counters.requests_rejected.load(Ordering::Relaxed),
            reloads: self.counters.reloads.load(Ordering::Relaxed),
        }
    }
}
