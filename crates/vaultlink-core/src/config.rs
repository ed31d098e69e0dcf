//! Engine configuration.
//!
//! Follows a builder pattern for construction with validation, and can be
//! persisted as YAML next to other vault tooling configuration.

use crate::error::{Error, Result};
use crate::models::DOCUMENT_EXTENSION;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Directory (relative to the vault root) holding engine state
pub const DEFAULT_INDEX_DIR: &str = ".vaultlink";

/// File name of the persisted link index inside the index directory
pub const DEFAULT_INDEX_FILE: &str = "link-index.json";

/// Configuration for one vault handled by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the vault directory
    pub vault_path: PathBuf,
    /// Document extension without the dot
    pub document_extension: String,
    /// Directory or file names skipped during enumeration
    pub excluded_paths: BTreeSet<String>,
    /// Engine state directory, relative to the vault root
    pub index_dir: String,
    /// Persisted index file name inside `index_dir`
    pub index_file_name: String,
    /// Where batch checkpoints are stored (temp dir when unset)
    pub checkpoint_dir: Option<PathBuf>,
    /// Documents larger than this are not indexed
    pub max_file_size: u64,
    /// Persist the index after every mutating operation
    pub save_after_mutation: bool,
}

impl EngineConfig {
    /// Create a new config with builder
    pub fn builder(vault_path: impl Into<PathBuf>) -> EngineConfigBuilder {
        EngineConfigBuilder::new(vault_path)
    }

    /// Default configuration for a vault, without validation
    pub fn for_vault(vault_path: impl Into<PathBuf>) -> Self {
        Self {
            vault_path: vault_path.into(),
            document_extension: DOCUMENT_EXTENSION.to_string(),
            excluded_paths: [".git", ".obsidian", ".trash", "node_modules", DEFAULT_INDEX_DIR]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            index_dir: DEFAULT_INDEX_DIR.to_string(),
            index_file_name: DEFAULT_INDEX_FILE.to_string(),
            checkpoint_dir: None,
            max_file_size: 10 * 1024 * 1024, // 10MB
            save_after_mutation: true,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.vault_path.exists() {
            return Err(Error::config_error(format!(
                "Vault path does not exist: {}",
                self.vault_path.display()
            )));
        }

        if !self.vault_path.is_dir() {
            return Err(Error::config_error(format!(
                "Vault path is not a directory: {}",
                self.vault_path.display()
            )));
        }

        if self.document_extension.is_empty() || self.document_extension.starts_with('.') {
            return Err(Error::config_error(
                "Document extension must be non-empty and given without a leading dot",
            ));
        }

        if self.index_dir.is_empty() || self.index_file_name.is_empty() {
            return Err(Error::config_error("Index location cannot be empty"));
        }

        Ok(())
    }

    /// Absolute location of the persisted index file
    pub fn index_path(&self) -> PathBuf {
        self.vault_path
            .join(&self.index_dir)
            .join(&self.index_file_name)
    }

    /// Whether a path segment is excluded from enumeration
    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded_paths.contains(name) || name == self.index_dir
    }

    /// Save configuration as YAML
    pub async fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| Error::config_error(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, yaml).await.map_err(|e| {
            Error::config_error(format!("Failed to save config to {}: {}", path.display(), e))
        })
    }

    /// Load configuration from a YAML file and validate it
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::config_error(format!("Failed to load config from {}: {}", path.display(), e))
        })?;

        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| Error::config_error(format!("Invalid engine configuration: {}", e)))?;
        config.validate()?;
        log::debug!("Loaded engine config for {}", config.vault_path.display());

        Ok(config)
    }
}

/// Builder for EngineConfig
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Create a new builder with defaults
    pub fn new(vault_path: impl Into<PathBuf>) -> Self {
        Self {
            config: EngineConfig::for_vault(vault_path),
        }
    }

    /// Add an excluded directory or file name
    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.config.excluded_paths.insert(name.into());
        self
    }

    /// Store checkpoints in a fixed directory
    pub fn checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.checkpoint_dir = Some(dir.into());
        self
    }

    /// Set the maximum indexed document size
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    /// Toggle persisting after each mutation
    pub fn save_after_mutation(mut self, save: bool) -> Self {
        self.config.save_after_mutation = save;
        self
    }

    /// Build and validate
    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builder_defaults() {
        let temp = TempDir::new().unwrap();
        let config = EngineConfig::builder(temp.path())
            .exclude("drafts")
            .build()
            .unwrap();

        assert_eq!(config.document_extension, "md");
        assert!(config.is_excluded("drafts"));
        assert!(config.is_excluded(".vaultlink"));
        assert!(!config.is_excluded("notes"));
        assert_eq!(
            config.index_path(),
            temp.path().join(".vaultlink").join("link-index.json")
        );
    }

    #[test]
    fn test_missing_vault_rejected() {
        let result = EngineConfig::builder("/definitely/not/a/vault").build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_yaml_round_trip() {
        let temp = TempDir::new().unwrap();
        let config = EngineConfig::builder(temp.path())
            .max_file_size(1024)
            .build()
            .unwrap();

        let file = temp.path().join("vaultlink.yaml");
        config.save(&file).await.unwrap();
        let loaded = EngineConfig::load(&file).await.unwrap();

        assert_eq!(loaded.max_file_size, 1024);
        assert_eq!(loaded.vault_path, config.vault_path);
        assert_eq!(loaded.excluded_paths, config.excluded_paths);
    }
}
