//! Registry credential handles
//!
//! A [`Credentials`] value is the opaque handle carried by a registry
//! destination. It is only turned into a username/password pair when a
//! login or push actually needs it, so a dry run never touches auth files
//! or environment variables.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ArtifactError;

/// Credential sources supported for the destination registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Credentials {
    /// No authentication
    #[default]
    Anonymous,

    /// Literal username/password
    Basic { username: String, password: String },

    /// File holding `base64(username):base64(password)`
    AuthFile { path: PathBuf },

    /// Environment variable references (CI/CD friendly)
    Env {
        username_var: String,
        password_var: String,
    },

    /// Docker config.json reference
    DockerConfig { path: Option<PathBuf> },
}

impl Credentials {
    /// Create basic auth credentials
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Create credentials read from an auth file
    pub fn auth_file(path: impl Into<PathBuf>) -> Self {
        Credentials::AuthFile { path: path.into() }
    }

    /// Create environment variable credentials
    pub fn from_env(username_var: impl Into<String>, password_var: impl Into<String>) -> Self {
        Credentials::Env {
            username_var: username_var.into(),
            password_var: password_var.into(),
        }
    }

    /// Resolve the handle into usable credentials for `registry`
    pub fn resolve(&self, registry: &str) -> Result<ResolvedCredentials, ArtifactError> {
        match self {
            Credentials::Anonymous => Ok(ResolvedCredentials::Anonymous),
            Credentials::Basic { username, password } => Ok(ResolvedCredentials::Basic {
                username: username.clone(),
                password: password.clone(),
            }),
            Credentials::AuthFile { path } => read_auth_file(path),
            Credentials::Env {
                username_var,
                password_var,
            } => {
                let username = std::env::var(username_var).map_err(|_| {
                    ArtifactError::auth(format!("Environment variable {} not set", username_var))
                })?;
                let password = std::env::var(password_var).map_err(|_| {
                    ArtifactError::auth(format!("Environment variable {} not set", password_var))
                })?;
                Ok(ResolvedCredentials::Basic { username, password })
            }
            Credentials::DockerConfig { path } => {
                let config = load_docker_config(path.as_deref())?;
                Ok(config
                    .credentials_for(registry)
                    .unwrap_or(ResolvedCredentials::Anonymous))
            }
        }
    }
}

/// Credentials ready for use
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedCredentials {
    Anonymous,
    Basic { username: String, password: String },
}

impl ResolvedCredentials {
    /// Username/password pair, if any
    pub fn basic(&self) -> Option<(&str, &str)> {
        match self {
            ResolvedCredentials::Anonymous => None,
            ResolvedCredentials::Basic { username, password } => {
                Some((username.as_str(), password.as_str()))
            }
        }
    }
}

fn read_auth_file(path: &Path) -> Result<ResolvedCredentials, ArtifactError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ArtifactError::auth(format!("failed to read auth file {}: {}", path.display(), e))
    })?;

    let (user, pass) = content
        .trim()
        .split_once(':')
        .ok_or_else(|| ArtifactError::auth("auth file does not contain user:pass format"))?;

    let decode = |part: &str, what: &str| -> Result<String, ArtifactError> {
        let bytes = STANDARD
            .decode(part)
            .map_err(|e| ArtifactError::auth(format!("failed to decode base64 {}: {}", what, e)))?;
        String::from_utf8(bytes)
            .map_err(|e| ArtifactError::auth(format!("{} is not valid UTF-8: {}", what, e)))
    };

    Ok(ResolvedCredentials::Basic {
        username: decode(user, "user")?,
        password: decode(pass, "password")?,
    })
}

/// Docker config.json format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockerConfig {
    #[serde(default)]
    pub auths: HashMap<String, DockerAuth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerAuth {
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl DockerConfig {
    /// Look up credentials for a registry host
    pub fn credentials_for(&self, registry: &str) -> Option<ResolvedCredentials> {
        let host = registry
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .split('/')
            .next()
            .unwrap_or(registry);

        let candidates = [
            host.to_string(),
            format!("https://{}", host),
            format!("http://{}", host),
        ];

        candidates
            .iter()
            .filter_map(|candidate| self.auths.get(candidate))
            .find_map(|auth| {
                if let (Some(u), Some(p)) = (&auth.username, &auth.password) {
                    return Some(ResolvedCredentials::Basic {
                        username: u.clone(),
                        password: p.clone(),
                    });
                }
                let decoded = STANDARD.decode(auth.auth.as_ref()?).ok()?;
                let pair = String::from_utf8(decoded).ok()?;
                let (u, p) = pair.split_once(':')?;
                Some(ResolvedCredentials::Basic {
                    username: u.to_string(),
                    password: p.to_string(),
                })
            })
    }
}

/// Load Docker config from default or specified path
fn load_docker_config(path: Option<&Path>) -> Result<DockerConfig, ArtifactError> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let home = dirs::home_dir()
                .ok_or_else(|| ArtifactError::auth("Could not determine home directory"))?;
            home.join(".docker").join("config.json")
        }
    };

    if !config_path.exists() {
        return Ok(DockerConfig::default());
    }

    let content = std::fs::read_to_string(&config_path)?;
    serde_json::from_str(&content)
        .map_err(|e| ArtifactError::auth(format!("invalid docker config: {}", e)))
}
