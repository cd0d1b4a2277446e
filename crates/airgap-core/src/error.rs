//! Core error types

use thiserror::Error;

/// Errors raised while loading manifests and configuration
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Manifest not found: {path}")]
    ManifestNotFound { path: String },

    #[error("Invalid manifest: {message}")]
    InvalidManifest { message: String },

    #[error("Failed to parse manifest: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid release version '{version}': expected X.Y.Z")]
    InvalidReleaseVersion { version: String },

    #[error("Invalid release mode '{mode}': must be either 'factory' or 'production'")]
    InvalidReleaseMode { mode: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Failure of a single artifact operation (download, verify, upload or login)
///
/// Every variant is fatal to the pipeline that produced it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("Invalid reference {reference}: {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("Not found upstream: {what}")]
    NotFound { what: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("TLS configuration error: {message}")]
    Tls { message: String },

    #[error("Missing artifact {path}: {message}")]
    MissingArtifact { path: String, message: String },

    #[error("Registry rejected the push: {message}")]
    RemoteRejected { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Skipped after another category failed")]
    Cancelled,
}

/// Discriminant of [`ArtifactError`], handy for matching without payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidReference,
    NotFound,
    Network,
    Auth,
    Tls,
    MissingArtifact,
    RemoteRejected,
    Configuration,
    Io,
    Cancelled,
}

impl ArtifactError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArtifactError::InvalidReference { .. } => ErrorKind::InvalidReference,
            ArtifactError::NotFound { .. } => ErrorKind::NotFound,
            ArtifactError::Network { .. } => ErrorKind::Network,
            ArtifactError::Auth { .. } => ErrorKind::Auth,
            ArtifactError::Tls { .. } => ErrorKind::Tls,
            ArtifactError::MissingArtifact { .. } => ErrorKind::MissingArtifact,
            ArtifactError::RemoteRejected { .. } => ErrorKind::RemoteRejected,
            ArtifactError::Configuration { .. } => ErrorKind::Configuration,
            ArtifactError::Io { .. } => ErrorKind::Io,
            ArtifactError::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn invalid_reference(reference: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidReference {
            reference: reference.into(),
            reason: reason.to_string(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls {
            message: message.into(),
        }
    }

    pub fn missing(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MissingArtifact {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::RemoteRejected {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ArtifactError {
    fn from(e: std::io::Error) -> Self {
        ArtifactError::Io {
            message: e.to_string(),
        }
    }
}
