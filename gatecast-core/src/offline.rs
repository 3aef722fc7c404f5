//! Grants persisted next to downloaded media.
//!
//! A downloaded asset keeps its manifest and its grant in the same
//! directory. The grant is stored as JSON using the camel-case field names
//! of `Grant`'s serialized form.

use std::path::{Path, PathBuf};

use crate::config::OfflineConfig;
use crate::errors::GrantStoreError;
use crate::model::Grant;
use crate::traits::GrantStore;

/// Reads and writes `entitlement.json` beside offline manifests.
#[derive(Debug, Clone)]
pub struct JsonGrantStore {
    grant_file_name: String,
}

impl Default for JsonGrantStore {
    fn default() -> Self {
        Self::new(&OfflineConfig::default())
    }
}

impl JsonGrantStore {
    pub fn new(config: &OfflineConfig) -> Self {
        Self {
            grant_file_name: config.grant_file_name.to_string(),
        }
    }

    /// Location of the grant file for a manifest.
    pub fn grant_path(&self, manifest_path: &Path) -> PathBuf {
        manifest_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&self.grant_file_name)
    }

    /// Persists `grant` for the manifest at `manifest_path`.
    ///
    /// # Errors
    ///
    /// - `GrantStoreError::Malformed` - Grant could not be encoded
    /// - `GrantStoreError::Io` - Grant file could not be written
    pub fn store_grant(
        &self,
        manifest_path: &Path,
        grant: &Grant,
    ) -> Result<PathBuf, GrantStoreError> {
        let path = self.grant_path(manifest_path);
        let encoded = serde_json::to_vec_pretty(grant).map_err(|e| GrantStoreError::Malformed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        std::fs::write(&path, encoded)?;
        Ok(path)
    }
}

impl GrantStore for JsonGrantStore {
    fn load_grant(&self, manifest_path: &Path) -> Result<Grant, GrantStoreError> {
        let path = self.grant_path(manifest_path);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GrantStoreError::Missing {
                    path: path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes).map_err(|e| GrantStoreError::Malformed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}
