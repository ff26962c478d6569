/*!
 * Controller configuration
 *
 * Loaded from a JSON file or built in code; every field has a default so a
 * partial file is valid.
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithm::Algorithm;
use crate::error::{KeyError, KeyResult};
use crate::registry::AlgorithmRegistry;
use crate::store::{FileKeyStore, KeyStore};

/// Default bound on a single key generation
pub const DEFAULT_GENERATION_TIMEOUT_MS: u64 = 30_000;

/// Default prefix for exported file names and titles
pub const DEFAULT_EXPORT_FILE_PREFIX: &str = "PQK9";

/// Default key store location (`~/.qasa/keys/pq_keystore.json`)
pub fn default_store_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".qasa").join("keys").join("pq_keystore.json"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ControllerConfig {
    /// Upper bound on one key generation, in milliseconds
    pub generation_timeout_ms: u64,
    /// Restrict the registry to these algorithms (`None` = all enabled)
    pub supported_algorithms: Option<Vec<Algorithm>>,
    /// Key store file (`None` = `default_store_path()`)
    pub store_path: Option<PathBuf>,
    /// Prefix for export file names and titles
    pub export_file_prefix: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            generation_timeout_ms: DEFAULT_GENERATION_TIMEOUT_MS,
            supported_algorithms: None,
            store_path: None,
            export_file_prefix: DEFAULT_EXPORT_FILE_PREFIX.to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load and validate a JSON configuration file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> KeyResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| KeyError::ConfigError {
            cause: format!("{}: {}", path.display(), e),
        })?;

        let config: ControllerConfig =
            serde_json::from_str(&contents).map_err(|e| KeyError::ConfigError {
                cause: format!("{}: {}", path.display(), e),
            })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> KeyResult<()> {
        if self.generation_timeout_ms == 0 {
            return Err(KeyError::ConfigError {
                cause: "generation_timeout_ms must be greater than zero".to_string(),
            });
        }

        if let Some(supported) = &self.supported_algorithms {
            if supported.is_empty() {
                return Err(KeyError::ConfigError {
                    cause: "supported_algorithms must not be empty".to_string(),
                });
            }
        }

        let prefix = self.export_file_prefix.trim();
        if prefix.is_empty() || prefix.contains(|c| c == '/' || c == '\\') {
            return Err(KeyError::ConfigError {
                cause: format!("invalid export_file_prefix '{}'", self.export_file_prefix),
            });
        }

        Ok(())
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    /// Configured store path, falling back to the home-directory default
    pub fn resolved_store_path(&self) -> KeyResult<PathBuf> {
        match &self.store_path {
            Some(path) => Ok(path.clone()),
            None => default_store_path().ok_or_else(|| KeyError::ConfigError {
                cause: "no store_path configured and no home directory found".to_string(),
            }),
        }
    }

    /// Open the file store this configuration points at
    pub fn open_store(&self) -> KeyResult<FileKeyStore> {
        FileKeyStore::open(self.resolved_store_path()?)
    }

    /// Build a registry honouring `supported_algorithms`
    pub fn build_registry<S: KeyStore>(&self, store: Arc<S>) -> KeyResult<AlgorithmRegistry<S>> {
        match &self.supported_algorithms {
            Some(supported) => AlgorithmRegistry::with_supported(store, supported.clone()),
            None => AlgorithmRegistry::new(store),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKeyStore;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.generation_timeout(), Duration::from_secs(30));
        assert_eq!(config.export_file_prefix, "PQK9");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"generation_timeout_ms": 500}"#).unwrap();

        let config = ControllerConfig::from_json_file(&path).unwrap();
        assert_eq!(config.generation_timeout_ms, 500);
        assert_eq!(config.export_file_prefix, DEFAULT_EXPORT_FILE_PREFIX);
        assert!(config.supported_algorithms.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let config = ControllerConfig {
            generation_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.validate().unwrap_err().error_type(), "ConfigError");

        let config = ControllerConfig {
            export_file_prefix: "../keys".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ControllerConfig {
            supported_algorithms: Some(vec![]),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();

        let err = ControllerConfig::from_json_file(&path).unwrap_err();
        assert_eq!(err.error_type(), "ConfigError");
        assert!(ControllerConfig::from_json_file(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_registry_restriction() {
        let config = ControllerConfig {
            supported_algorithms: Some(vec![Algorithm::Falcon512]),
            ..Default::default()
        };
        let registry = config
            .build_registry(Arc::new(MemoryKeyStore::new()))
            .unwrap();
        assert_eq!(registry.list_supported_algorithms(), &[Algorithm::Falcon512]);
    }

    #[test]
    fn test_explicit_store_path_wins() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let config = ControllerConfig {
            store_path: Some(path.clone()),
            ..Default::default()
        };
        assert_eq!(config.resolved_store_path().unwrap(), path);
        config.open_store().unwrap();
        assert!(path.exists());
    }
}
