//! Model registry and persistence
//!
//! The scoring core only needs `save(model, id)` and `load(id)`. The file
//! registry keeps each artifact as `models/<id>.bin` (bincode) with a JSON
//! metadata sidecar, and rotates overwritten artifacts into `backups/`.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::anomaly::AnomalyModel;
use crate::error::{LedgerScanError, Result};

/// Default model storage directory
pub const MODEL_DATA_DIR: &str = "/var/lib/ledgerscan/models";

/// Version of the on-disk artifact layout
pub const STORAGE_FORMAT_VERSION: u32 = 1;

/// Persistence boundary for trained models
///
/// Implementations must round-trip models exactly: a loaded model evaluates
/// every input to the same verdict as the model that was saved.
pub trait ModelRegistry: Send + Sync {
    /// Store `model` under `id`, replacing any previous artifact
    fn save(&self, id: &str, model: &AnomalyModel) -> Result<()>;

    /// Load the model stored under `id`; `ModelNotFound` if there is none
    fn load(&self, id: &str) -> Result<AnomalyModel>;

    /// Whether a model is stored under `id`
    fn exists(&self, id: &str) -> bool;

    /// Identifiers of all stored models, sorted
    fn list(&self) -> Result<Vec<String>>;
}

/// Model ids become file names, so keep them to a safe alphabet
pub fn validate_model_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(LedgerScanError::InvalidModelId(id.to_string()))
    }
}

/// File registry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Base directory for model artifacts
    pub data_dir: PathBuf,
    /// Keep backup copies of overwritten artifacts
    pub keep_backups: bool,
    /// Maximum backup files to keep per model
    pub max_backups: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(MODEL_DATA_DIR),
            keep_backups: true,
            max_backups: 3,
        }
    }
}

/// Metadata written next to each artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Version of the storage format
    pub format_version: u32,
    /// Model identifier
    pub model_id: String,
    /// When the artifact was saved
    pub saved_at: DateTime<Utc>,
    /// When the model was trained
    pub trained_at: DateTime<Utc>,
    /// Feature schema version
    pub schema_version: u32,
    /// Category labels of the schema
    pub categories: Vec<String>,
    /// Rows used for training
    pub sample_count: u64,
    /// Number of trees
    pub num_trees: usize,
    /// Subsample size
    pub sample_size: usize,
    /// Training seed
    pub seed: u64,
    /// Decision threshold
    pub threshold: f64,
    /// Contamination rate
    pub contamination: f64,
    /// Crate version that trained the model
    pub crate_version: String,
    /// Host identifier
    pub host_id: String,
}

impl ArtifactMetadata {
    pub fn describe(id: &str, model: &AnomalyModel) -> Self {
        Self {
            format_version: STORAGE_FORMAT_VERSION,
            model_id: id.to_string(),
            saved_at: Utc::now(),
            trained_at: model.trained_at(),
            schema_version: model.schema().version,
            categories: model.schema().categories.labels().to_vec(),
            sample_count: model.sample_count(),
            num_trees: model.forest().num_trees(),
            sample_size: model.forest().sample_size(),
            seed: model.forest().seed(),
            threshold: model.threshold(),
            contamination: model.contamination(),
            crate_version: model.version().to_string(),
            host_id: hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
        }
    }
}

/// Directory-backed model registry
pub struct FileRegistry {
    /// Base directory for model data
    data_dir: PathBuf,
    /// Configuration
    config: RegistryConfig,
}

impl FileRegistry {
    /// Create with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            config,
        }
    }

    /// Create with custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self::with_config(RegistryConfig {
            data_dir: path.as_ref().to_path_buf(),
            ..RegistryConfig::default()
        })
    }

    /// Get the base directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Initialize the storage directory structure
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.data_dir.join("models"))?;
        fs::create_dir_all(self.data_dir.join("backups"))?;

        info!("Initialized model registry at {:?}", self.data_dir);
        Ok(())
    }

    fn model_path(&self, id: &str) -> PathBuf {
        self.data_dir.join("models").join(format!("{}.bin", id))
    }

    fn metadata_path(&self, id: &str) -> PathBuf {
        self.data_dir.join("models").join(format!("{}.json", id))
    }

    fn backup_path(&self, id: &str, index: usize) -> PathBuf {
        self.data_dir
            .join("backups")
            .join(format!("{}.bin.{}", id, index))
    }

    /// Read the metadata sidecar without loading the model
    pub fn metadata(&self, id: &str) -> Result<ArtifactMetadata> {
        validate_model_id(id)?;
        let path = self.metadata_path(id);
        if !path.exists() {
            return Err(LedgerScanError::ModelNotFound(id.to_string()));
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write_artifact(path: &Path, model: &AnomalyModel) -> Result<()> {
        let tmp = path.with_extension("bin.tmp");
        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            bincode::serde::encode_into_std_write(model, &mut writer, bincode::config::standard())?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read_artifact(path: &Path) -> Result<AnomalyModel> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let model: AnomalyModel =
            bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())?;
        Ok(model)
    }

    /// Try backups newest first
    fn load_from_backup(&self, id: &str) -> Option<AnomalyModel> {
        for i in 0..self.config.max_backups {
            let backup_path = self.backup_path(id, i);
            if !backup_path.exists() {
                continue;
            }
            match Self::read_artifact(&backup_path) {
                Ok(model) => {
                    warn!("Restored model '{}' from backup {}", id, i);
                    return Some(model);
                }
                Err(e) => {
                    debug!("Failed to load backup {} of '{}': {}", i, id, e);
                }
            }
        }
        None
    }

    /// Shift `<id>.bin.N` to `N+1` and copy the live artifact to `.0`
    fn rotate_backups(&self, id: &str) -> Result<()> {
        if self.config.max_backups == 0 {
            return Ok(());
        }
        fs::create_dir_all(self.data_dir.join("backups"))?;

        let oldest = self.backup_path(id, self.config.max_backups - 1);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        for i in (0..self.config.max_backups - 1).rev() {
            let current = self.backup_path(id, i);
            if current.exists() {
                fs::rename(&current, self.backup_path(id, i + 1))?;
            }
        }

        let source = self.model_path(id);
        if source.exists() {
            fs::copy(&source, self.backup_path(id, 0))?;
        }

        Ok(())
    }

    /// Remove a model, its metadata and its backups
    pub fn delete(&self, id: &str) -> Result<()> {
        validate_model_id(id)?;
        if !self.exists(id) {
            return Err(LedgerScanError::ModelNotFound(id.to_string()));
        }
        fs::remove_file(self.model_path(id))?;
        let metadata = self.metadata_path(id);
        if metadata.exists() {
            fs::remove_file(metadata)?;
        }
        for i in 0..self.config.max_backups {
            let backup = self.backup_path(id, i);
            if backup.exists() {
                fs::remove_file(backup)?;
            }
        }
        info!("Deleted model '{}'", id);
        Ok(())
    }
}

impl ModelRegistry for FileRegistry {
    fn save(&self, id: &str, model: &AnomalyModel) -> Result<()> {
        validate_model_id(id)?;
        let path = self.model_path(id);

        if self.config.keep_backups && path.exists() {
            self.rotate_backups(id)?;
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        Self::write_artifact(&path, model)?;

        let metadata = ArtifactMetadata::describe(id, model);
        fs::write(self.metadata_path(id), serde_json::to_string_pretty(&metadata)?)?;

        info!(
            "Saved model '{}' ({} trees, schema v{}) to {:?}",
            id,
            metadata.num_trees,
            metadata.schema_version,
            path
        );
        Ok(())
    }

    fn load(&self, id: &str) -> Result<AnomalyModel> {
        validate_model_id(id)?;
        let path = self.model_path(id);

        if !path.exists() {
            debug!("No model file found at {:?}", path);
            return Err(LedgerScanError::ModelNotFound(id.to_string()));
        }

        match Self::read_artifact(&path) {
            Ok(model) => {
                info!(
                    "Loaded model '{}' from {:?} ({} samples, trained {})",
                    id,
                    path,
                    model.sample_count(),
                    model.trained_at().format("%Y-%m-%d %H:%M:%S")
                );
                Ok(model)
            }
            Err(e) => {
                warn!("Failed to load model '{}' from {:?}: {}", id, path, e);
                self.load_from_backup(id).ok_or(e)
            }
        }
    }

    fn exists(&self, id: &str) -> bool {
        validate_model_id(id).is_ok() && self.model_path(id).exists()
    }

    fn list(&self) -> Result<Vec<String>> {
        let models_dir = self.data_dir.join("models");
        let mut models = Vec::new();

        if !models_dir.exists() {
            return Ok(models);
        }

        for entry in fs::read_dir(&models_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "bin").unwrap_or(false) {
                if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                    models.push(name.to_string());
                }
            }
        }

        models.sort();
        Ok(models)
    }
}

/// In-process registry, for tests and embedding
///
/// Stores encoded artifacts, so loading exercises the same serialization
/// path as the file registry.
#[derive(Default)]
pub struct MemoryRegistry {
    artifacts: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelRegistry for MemoryRegistry {
    fn save(&self, id: &str, model: &AnomalyModel) -> Result<()> {
        validate_model_id(id)?;
        let bytes = bincode::serde::encode_to_vec(model, bincode::config::standard())?;
        self.artifacts.write().insert(id.to_string(), bytes);
        Ok(())
    }

    fn load(&self, id: &str) -> Result<AnomalyModel> {
        let artifacts = self.artifacts.read();
        let bytes = artifacts
            .get(id)
            .ok_or_else(|| LedgerScanError::ModelNotFound(id.to_string()))?;
        let (model, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(model)
    }

    fn exists(&self, id: &str) -> bool {
        self.artifacts.read().contains_key(id)
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.artifacts.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::TrainingMatrix;
    use crate::features::FeatureSchema;
    use crate::models::ModelConfig;
    use tempfile::TempDir;

    fn trained(seed: u64) -> AnomalyModel {
        let rows = (0..120)
            .map(|i| vec![(i % 40) as f64 * 3.5, (i % 24) as f64, (i % 11) as f64, (i % 2) as f64, 0.0])
            .collect();
        let matrix = TrainingMatrix::from_rows(rows, &FeatureSchema::default()).unwrap();
        let config = ModelConfig::default().with_trees(20).with_seed(seed);
        AnomalyModel::fit(&matrix, FeatureSchema::default(), &config).unwrap()
    }

    const QUERIES: &[[f64; 5]] = &[
        [10.0, 9.0, 1.0, 1.0, 0.0],
        [9000.0, 3.0, 10.0, 0.0, 1.0],
        [-5.0, 23.9, 4.0, 0.0, 0.0],
    ];

    fn assert_same_verdicts(a: &AnomalyModel, b: &AnomalyModel) {
        for query in QUERIES {
            assert_eq!(a.evaluate_values(query).unwrap(), b.evaluate_values(query).unwrap());
        }
    }

    #[test]
    fn test_registry_init() {
        let temp = TempDir::new().unwrap();
        let registry = FileRegistry::with_path(temp.path());
        registry.init().unwrap();

        assert!(temp.path().join("models").exists());
        assert!(temp.path().join("backups").exists());
    }

    #[test]
    fn test_file_round_trip() {
        let temp = TempDir::new().unwrap();
        let registry = FileRegistry::with_path(temp.path());
        let model = trained(42);

        registry.save("ledger", &model).unwrap();
        assert!(registry.exists("ledger"));

        let loaded = registry.load("ledger").unwrap();
        assert_same_verdicts(&model, &loaded);
        assert_eq!(loaded.schema(), model.schema());
        assert_eq!(loaded.threshold().to_bits(), model.threshold().to_bits());

        let metadata = registry.metadata("ledger").unwrap();
        assert_eq!(metadata.num_trees, 20);
        assert_eq!(metadata.seed, 42);
        assert_eq!(metadata.sample_count, 120);
    }

    #[test]
    fn test_load_missing_model() {
        let temp = TempDir::new().unwrap();
        let registry = FileRegistry::with_path(temp.path());
        assert!(matches!(
            registry.load("absent"),
            Err(LedgerScanError::ModelNotFound(id)) if id == "absent"
        ));
        assert!(!registry.exists("absent"));
    }

    #[test]
    fn test_invalid_model_ids() {
        let temp = TempDir::new().unwrap();
        let registry = FileRegistry::with_path(temp.path());
        let model = trained(1);
        for bad in ["", "../escape", "a/b", ".hidden", "white space"] {
            assert!(matches!(
                registry.save(bad, &model),
                Err(LedgerScanError::InvalidModelId(_))
            ));
        }
        assert!(validate_model_id("ledger-v1.2_prod").is_ok());
    }

    #[test]
    fn test_backup_rotation_and_restore() {
        let temp = TempDir::new().unwrap();
        let registry = FileRegistry::with_path(temp.path());
        let first = trained(1);
        let second = trained(2);

        registry.save("ledger", &first).unwrap();
        registry.save("ledger", &second).unwrap();
        assert!(temp.path().join("backups").join("ledger.bin.0").exists());

        // Corrupt the live artifact; the previous version comes back
        fs::write(temp.path().join("models").join("ledger.bin"), b"garbage").unwrap();
        let restored = registry.load("ledger").unwrap();
        assert_same_verdicts(&first, &restored);
    }

    #[test]
    fn test_corrupt_without_backup_fails() {
        let temp = TempDir::new().unwrap();
        let registry = FileRegistry::with_path(temp.path());
        registry.save("ledger", &trained(3)).unwrap();
        fs::write(temp.path().join("models").join("ledger.bin"), b"garbage").unwrap();
        assert!(matches!(registry.load("ledger"), Err(LedgerScanError::Decode(_))));
    }

    #[test]
    fn test_list_and_delete() {
        let temp = TempDir::new().unwrap();
        let registry = FileRegistry::with_path(temp.path());
        assert!(registry.list().unwrap().is_empty());

        registry.save("b-model", &trained(1)).unwrap();
        registry.save("a-model", &trained(2)).unwrap();
        assert_eq!(registry.list().unwrap(), vec!["a-model", "b-model"]);

        registry.delete("a-model").unwrap();
        assert_eq!(registry.list().unwrap(), vec!["b-model"]);
        assert!(matches!(
            registry.delete("a-model"),
            Err(LedgerScanError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_memory_registry_round_trip() {
        let registry = MemoryRegistry::new();
        let model = trained(9);

        registry.save("mem", &model).unwrap();
        assert!(registry.exists("mem"));
        assert_eq!(registry.list().unwrap(), vec!["mem"]);
        assert_same_verdicts(&model, &registry.load("mem").unwrap());
        assert!(matches!(
            registry.load("other"),
            Err(LedgerScanError::ModelNotFound(_))
        ));
    }
}
