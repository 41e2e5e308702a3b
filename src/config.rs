use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::features::{FeatureSchema, LabelSpace, DEFAULT_CATEGORIES, SCHEMA_VERSION};
use crate::models::ModelConfig;
use crate::storage::RegistryConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schema: SchemaConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub registry: RegistryConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load config from default locations or create default
    pub fn load_or_default() -> Result<Self> {
        let paths = [
            PathBuf::from("/etc/ledgerscan/config.toml"),
            dirs_next::config_dir()
                .map(|p| p.join("ledgerscan/config.toml"))
                .unwrap_or_default(),
            PathBuf::from("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;
        Ok(())
    }

    /// Check every section
    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.feature_schema()?;
        if self.registry.keep_backups && self.registry.max_backups == 0 {
            anyhow::bail!("registry.max_backups must be at least 1 when keep_backups is set");
        }
        Ok(())
    }

    /// Feature schema described by the `[schema]` section
    ///
    /// Version 1 is bound to the canonical label space; any other category
    /// list needs its own version.
    pub fn feature_schema(&self) -> Result<FeatureSchema> {
        let categories = LabelSpace::new(&self.schema.categories)
            .context("Invalid [schema] categories")?;
        if self.schema.version == SCHEMA_VERSION && categories != LabelSpace::default() {
            anyhow::bail!(
                "[schema] categories differ from the canonical list; set [schema] version to a value other than {}",
                SCHEMA_VERSION
            );
        }
        Ok(FeatureSchema::new(self.schema.version, categories))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Schema version written into trained models
    #[serde(default = "default_schema_version")]
    pub version: u32,

    /// Known category labels; "others" is appended automatically
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            version: default_schema_version(),
            categories: default_categories(),
        }
    }
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

fn default_categories() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect()
}
