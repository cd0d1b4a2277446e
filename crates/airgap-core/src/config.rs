//! Tool configuration
//!
//! Stored in `~/.config/airgap/config.yaml`. Every value can be overridden
//! on the command line.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirgapConfig {
    /// Default destination registry
    #[serde(default)]
    pub registry: RegistrySettings,

    /// Default output directory
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// Default release mode
    #[serde(default)]
    pub release_mode: Option<ReleaseMode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySettings {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub auth_file: Option<PathBuf>,
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
    #[serde(default)]
    pub insecure: bool,
}

impl AirgapConfig {
    /// Load configuration from default location
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default configuration path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| CoreError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("airgap").join("config.yaml"))
    }
}

/// Which release channel the release manifest image is published in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseMode {
    #[default]
    Factory,
    Production,
}

const FACTORY_RELEASE_IMAGE: &str =
    "registry.opensuse.org/isv/suse/edge/factory/test_manifest_images/release-manifest";
const PRODUCTION_RELEASE_IMAGE: &str = "registry.suse.com/edge";

impl ReleaseMode {
    /// Container image carrying the release manifest for `version`
    pub fn manifest_image(&self, version: &ReleaseVersion) -> String {
        match self {
            ReleaseMode::Factory => format!("{}:{}", FACTORY_RELEASE_IMAGE, version),
            ReleaseMode::Production => format!(
                "{}/{}.{}/release-manifest:{}",
                PRODUCTION_RELEASE_IMAGE,
                version.0.major,
                version.0.minor,
                version
            ),
        }
    }
}

impl FromStr for ReleaseMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "factory" => Ok(ReleaseMode::Factory),
            "production" => Ok(ReleaseMode::Production),
            other => Err(CoreError::InvalidReleaseMode {
                mode: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ReleaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseMode::Factory => f.write_str("factory"),
            ReleaseMode::Production => f.write_str("production"),
        }
    }
}

/// Edge release version in strict `X.Y.Z` form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseVersion(semver::Version);

impl FromStr for ReleaseVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CoreError::InvalidReleaseVersion {
            version: s.to_string(),
        };
        let version = semver::Version::parse(s).map_err(|_| invalid())?;
        if !version.pre.is_empty() || !version.build.is_empty() {
            return Err(invalid());
        }
        Ok(Self(version))
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_version_parse() {
        assert!("3.1.0".parse::<ReleaseVersion>().is_ok());
        assert!("3.1".parse::<ReleaseVersion>().is_err());
        assert!("v3.1.0".parse::<ReleaseVersion>().is_err());
        assert!("3.1.0-rc1".parse::<ReleaseVersion>().is_err());
    }

    #[test]
    fn test_release_mode_images() {
        let version: ReleaseVersion = "3.4.0".parse().unwrap();
        assert_eq!(
            ReleaseMode::Factory.manifest_image(&version),
            "registry.opensuse.org/isv/suse/edge/factory/test_manifest_images/release-manifest:3.4.0"
        );
        assert_eq!(
            ReleaseMode::Production.manifest_image(&version),
            "registry.suse.com/edge/3.4/release-manifest:3.4.0"
        );
    }

    #[test]
    fn test_release_mode_parse() {
        assert_eq!("factory".parse::<ReleaseMode>().unwrap(), ReleaseMode::Factory);
        assert_eq!(
            "production".parse::<ReleaseMode>().unwrap(),
            ReleaseMode::Production
        );
        let err = "invalid".parse::<ReleaseMode>().unwrap_err();
        assert!(err.to_string().contains("Invalid release mode"));
    }

    #[test]
    fn test_config_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let config = AirgapConfig {
            registry: RegistrySettings {
                url: Some("registry.local:5000".to_string()),
                auth_file: None,
                ca_cert: Some(PathBuf::from("/etc/ssl/registry.pem")),
                insecure: false,
            },
            output: Some(PathBuf::from("/srv/airgap")),
            release_mode: Some(ReleaseMode::Production),
        };
        config.save_to(&path).unwrap();

        let loaded = AirgapConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config() {
        let yaml = "registry:\n  url: reg.local\n  insecure: true\n";
        let config: AirgapConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.registry.url.as_deref(), Some("reg.local"));
        assert!(config.registry.insecure);
        assert!(config.output.is_none());
    }
}
