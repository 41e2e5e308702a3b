//! ledgerscan: unsupervised anomaly scoring for ledger transactions
//!
//! Entries are encoded into a fixed 5-wide feature vector
//! (`[amount, hour_of_day, category_code, type_code, is_reversal]`), an
//! isolation forest is trained on a corpus of them, and new entries are
//! scored against the trained forest.
//!
//! # Example
//! ```ignore
//! use ledgerscan::{Entry, MemoryRegistry, ModelRegistry, ModelTrainer, ScoringEngine};
//!
//! let registry = MemoryRegistry::new();
//! let trainer = ModelTrainer::default();
//! trainer.train_and_save(&history, &registry, "ledger")?;
//!
//! let engine = ScoringEngine::load(&registry, "ledger")?;
//! let verdict = engine.score_entry(&Entry::new(15000.0, "2024-03-01T02:13:00"))?;
//! if verdict.is_anomaly {
//!     println!("unusual entry, score {:.3}", verdict.score);
//! }
//! ```

pub mod anomaly;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod entry;
pub mod error;
pub mod features;
pub mod models;
pub mod storage;
pub mod training;

pub use anomaly::{AnomalyModel, Verdict};
pub use config::Config;
pub use dataset::{DatasetBuilder, TrainingMatrix};
pub use engine::{EngineStats, LoadedModel, ScoringEngine};
pub use entry::Entry;
pub use error::{LedgerScanError, Result};
pub use features::{
    EntryEncoder, FeatureSchema, FeatureVector, LabelSpace, SchemaTag, TemporalCodec, FEATURE_NAMES,
    NUM_FEATURES, SCHEMA_VERSION,
};
pub use models::{IsolationForest, ModelConfig};
pub use storage::{ArtifactMetadata, FileRegistry, MemoryRegistry, ModelRegistry, RegistryConfig};
pub use training::{ModelTrainer, TrainingSummary};
