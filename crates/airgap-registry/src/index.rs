//! Helm repository index
//!
//! Only the fields needed to locate and verify a chart archive are read.

use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{RegistryError, Result};

/// Repository index (`index.yaml`)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryIndex {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Charts indexed by name
    #[serde(default)]
    pub entries: HashMap<String, Vec<ChartEntry>>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

/// One chart version in the index
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartEntry {
    pub name: String,
    pub version: String,

    #[serde(default)]
    pub app_version: Option<String>,

    /// URLs to download the chart archive, absolute or relative to the repository
    #[serde(default)]
    pub urls: Vec<String>,

    /// SHA256 digest of the archive
    #[serde(default)]
    pub digest: Option<String>,
}

impl RepositoryIndex {
    /// Parse index from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let yaml = std::str::from_utf8(bytes).map_err(|e| RegistryError::IndexParseError {
            message: format!("Invalid UTF-8: {}", e),
        })?;
        serde_yaml::from_str(yaml).map_err(|e| RegistryError::IndexParseError {
            message: e.to_string(),
        })
    }

    /// Get a specific version of a chart
    ///
    /// A leading `v` is ignored on either side.
    pub fn get_version(&self, name: &str, version: &str) -> Option<&ChartEntry> {
        let wanted = version.trim_start_matches('v');
        self.entries
            .get(name)?
            .iter()
            .find(|e| e.version.trim_start_matches('v') == wanted)
    }
}

impl ChartEntry {
    /// Absolute download URL, resolving relative URLs against `repository`
    pub fn download_url(&self, repository: &str) -> Option<String> {
        let url = self.urls.first()?;
        if url.starts_with("http://") || url.starts_with("https://") {
            Some(url.clone())
        } else {
            Some(format!(
                "{}/{}",
                repository.trim_end_matches('/'),
                url.trim_start_matches('/')
            ))
        }
    }
}
