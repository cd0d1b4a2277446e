//! Error types for registry and repository operations

use airgap_core::ArtifactError;
use thiserror::Error;

/// Registry, repository and transport errors
#[derive(Debug, Error)]
pub enum RegistryError {
    // ============ Network Errors ============
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Not found: {url}")]
    NotFound { url: String },

    // ============ Authentication Errors ============
    #[error("Authentication required for {url}")]
    AuthRequired { url: String },

    #[error("Authentication failed: {message}")]
    AuthFailed { message: String },

    // ============ TLS Errors ============
    #[error("TLS error: {message}")]
    Tls { message: String },

    // ============ Index Errors ============
    #[error("Index parse error: {message}")]
    IndexParseError { message: String },

    #[error("Chart not found: {name}@{version} in repository {repo}")]
    ChartNotFound {
        name: String,
        version: String,
        repo: String,
    },

    #[error("Integrity check failed for {name}: expected {expected}, got {actual}")]
    IntegrityCheckFailed {
        name: String,
        expected: String,
        actual: String,
    },

    // ============ OCI Errors ============
    #[error("OCI registry error: {message}")]
    OciError { message: String },

    #[error("Invalid OCI reference: {reference}")]
    InvalidOciReference { reference: String },

    #[error("OCI push failed: {message}")]
    OciPushFailed { message: String },

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

impl From<reqwest::Error> for RegistryError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            RegistryError::HttpError {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else if e.is_connect() {
            RegistryError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else {
            RegistryError::NetworkError {
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_yaml::Error> for RegistryError {
    fn from(e: serde_yaml::Error) -> Self {
        RegistryError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(e: serde_json::Error) -> Self {
        RegistryError::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for RegistryError {
    fn from(e: url::ParseError) -> Self {
        RegistryError::NetworkError {
            message: format!("Invalid URL: {}", e),
        }
    }
}

impl From<oci_distribution::errors::OciDistributionError> for RegistryError {
    fn from(e: oci_distribution::errors::OciDistributionError) -> Self {
        classify_oci_message(e.to_string())
    }
}

/// Registries report most failures as text, so classify on the message
fn classify_oci_message(message: String) -> RegistryError {
    let lower = message.to_lowercase();
    if lower.contains("not found") || lower.contains("manifest unknown") || lower.contains("404") {
        RegistryError::NotFound { url: message }
    } else if lower.contains("unauthorized") || lower.contains("denied") || lower.contains("401") {
        RegistryError::AuthFailed { message }
    } else if lower.contains("certificate") || lower.contains("tls") {
        RegistryError::Tls { message }
    } else {
        RegistryError::OciError { message }
    }
}

impl From<RegistryError> for ArtifactError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound { url } => ArtifactError::not_found(url),
            RegistryError::ChartNotFound {
                name,
                version,
                repo,
            } => ArtifactError::not_found(format!("{}@{} in {}", name, version, repo)),
            RegistryError::AuthRequired { url } => {
                ArtifactError::auth(format!("authentication required for {}", url))
            }
            RegistryError::AuthFailed { message } => ArtifactError::auth(message),
            RegistryError::Tls { message } => ArtifactError::tls(message),
            RegistryError::InvalidOciReference { reference } => {
                ArtifactError::invalid_reference(reference, "not a valid OCI reference")
            }
            RegistryError::IntegrityCheckFailed {
                name,
                expected,
                actual,
            } => ArtifactError::missing(
                name,
                format!("checksum mismatch: expected {}, got {}", expected, actual),
            ),
            RegistryError::OciPushFailed { message } => ArtifactError::rejected(message),
            RegistryError::Io(e) => ArtifactError::from(e),
            other @ (RegistryError::HttpError { .. }
            | RegistryError::NetworkError { .. }
            | RegistryError::IndexParseError { .. }
            | RegistryError::OciError { .. }
            | RegistryError::Serialization(_)) => ArtifactError::network(other.to_string()),
        }
    }
}
