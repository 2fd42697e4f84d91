use crate::error::{Result, StratusError};
use crate::types::{ProviderType, TransferProperties};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Top-level Stratus configuration stored as TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratusConfig {
    #[serde(default)]
    pub stratus: TransferSettings,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// Transfer settings shared by every provider.
///
/// `block_size` and `concurrency` override the provider's own defaults when
/// set; a provider entry can override them again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Block size in bytes for chunked transfers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_size: Option<u64>,
    /// Maximum block operations in flight per transfer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    /// How long `delete` waits for a container to disappear.
    #[serde(default = "default_delete_timeout_secs")]
    pub delete_timeout_secs: u64,
    /// Interval between existence checks while waiting on a delete.
    #[serde(default = "default_delete_poll_interval_ms")]
    pub delete_poll_interval_ms: u64,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            block_size: None,
            concurrency: None,
            delete_timeout_secs: default_delete_timeout_secs(),
            delete_poll_interval_ms: default_delete_poll_interval_ms(),
        }
    }
}

fn default_delete_timeout_secs() -> u64 {
    120
}

fn default_delete_poll_interval_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// Region for S3 and GCS bucket creation.
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint URL for S3-compatible providers (MinIO, RustFS, Garage, etc.)
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Use path-style addressing (required by most S3-compatible servers).
    #[serde(default)]
    pub path_style: Option<bool>,
    /// S3 access key, or Azure storage account key.
    #[serde(default)]
    pub access_key: Option<String>,
    /// S3 secret key.
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Azure storage account name.
    #[serde(default)]
    pub account: Option<String>,
    /// GCP project that owns created buckets.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Root directory for the local provider.
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub block_size: Option<u64>,
    #[serde(default)]
    pub concurrency: Option<usize>,
}

impl ProviderConfig {
    /// Resolve transfer properties: this entry's overrides, then the global
    /// settings, then `defaults` from the provider itself.
    pub fn transfer_properties(
        &self,
        settings: &TransferSettings,
        defaults: TransferProperties,
    ) -> TransferProperties {
        TransferProperties::new(
            self.block_size
                .or(settings.block_size)
                .unwrap_or(defaults.block_size),
            self.concurrency
                .or(settings.concurrency)
                .unwrap_or(defaults.concurrency),
        )
        .with_delete_wait(
            Duration::from_secs(settings.delete_timeout_secs),
            Duration::from_millis(settings.delete_poll_interval_ms),
        )
    }
}

impl StratusConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StratusError::ConfigNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| StratusError::TomlDe(e.to_string()))?;
        debug!(
            "Loaded {} provider(s) from {}",
            config.providers.len(),
            path.display()
        );
        Ok(config)
    }

    /// Save config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| StratusError::TomlSer(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        debug!("Wrote config to {}", path.display());
        Ok(())
    }

    /// Default config for `stratus init`: a single local provider.
    pub fn default_config(base_dir: &Path) -> Self {
        Self {
            stratus: TransferSettings::default(),
            providers: vec![ProviderConfig {
                name: "local".to_string(),
                provider_type: ProviderType::Local,
                region: None,
                endpoint_url: None,
                path_style: None,
                access_key: None,
                secret_key: None,
                account: None,
                project_id: None,
                root: Some(base_dir.join("data").display().to_string()),
                block_size: None,
                concurrency: None,
            }],
        }
    }

    pub fn provider(&self, name: &str) -> Result<&ProviderConfig> {
        self.providers
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| StratusError::ProviderNotFound(name.to_string()))
    }

    /// Resolve the config file path: `<base_dir>/stratus.toml`
    pub fn default_path(base_dir: &Path) -> PathBuf {
        base_dir.join("stratus.toml")
    }

    /// Resolve the default stratus home directory: `~/.stratus`
    pub fn default_base_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|h| h.join(".stratus"))
            .ok_or_else(|| StratusError::Config("Cannot determine home directory".to_string()))
    }
}
