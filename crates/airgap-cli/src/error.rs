//! CLI error types with exit code handling

use airgap_core::{CoreError, ErrorKind};
use airgap_sync::SyncError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// Every way a command can fail, mapped to an exit code
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Bad flag values or combinations
    #[error("{message}")]
    #[diagnostic(code(airgap::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Manifest error: {message}")]
    #[diagnostic(code(airgap::cli::manifest))]
    Manifest {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A pipeline failed; `message` is the first error delivered
    #[error("{message}")]
    #[diagnostic(code(airgap::cli::sync))]
    Sync { message: String },

    #[error("{message}")]
    #[diagnostic(
        code(airgap::cli::auth),
        help("check the registry credentials, or pass --insecure for self-signed registries")
    )]
    Auth { message: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(airgap::cli::io))]
    Io { message: String },
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Manifest { .. } => exit_codes::MANIFEST_ERROR,
            CliError::Sync { .. } => exit_codes::SYNC_ERROR,
            CliError::Auth { .. } => exit_codes::AUTH_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: None,
        }
    }

    pub fn usage_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidReleaseVersion { .. } => {
                CliError::usage_with_help(err.to_string(), "e.g. --release-version 3.4.0")
            }
            CoreError::InvalidReleaseMode { .. } | CoreError::InvalidConfig { .. } => {
                CliError::usage(err.to_string())
            }
            CoreError::Io(e) => CliError::Io {
                message: e.to_string(),
            },
            other => CliError::Manifest {
                message: other.to_string(),
                help: None,
            },
        }
    }
}

impl From<SyncError> for CliError {
    fn from(err: SyncError) -> Self {
        match err.artifact_error().map(|e| e.kind()) {
            Some(ErrorKind::Auth) | Some(ErrorKind::Tls) => CliError::Auth {
                message: err.to_string(),
            },
            _ => CliError::Sync {
                message: err.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use airgap_core::{ArtifactError, Category};

    #[test]
    fn test_core_errors_map_to_exit_codes() {
        let version: CliError = CoreError::InvalidReleaseVersion {
            version: "3.1".to_string(),
        }
        .into();
        assert_eq!(version.exit_code(), exit_codes::USAGE_ERROR);

        let manifest: CliError = CoreError::InvalidManifest {
            message: "no rke2 version".to_string(),
        }
        .into();
        assert_eq!(manifest.exit_code(), exit_codes::MANIFEST_ERROR);

        let io: CliError = CoreError::Io(std::io::Error::other("denied")).into();
        assert_eq!(io.exit_code(), exit_codes::IO_ERROR);
    }

    #[test]
    fn test_sync_errors_map_to_exit_codes() {
        let auth: CliError = SyncError::CategoryFailed {
            category: Category::Image,
            source: ArtifactError::auth("bad password"),
        }
        .into();
        assert_eq!(auth.exit_code(), exit_codes::AUTH_ERROR);
        assert!(auth.to_string().contains("bad password"));

        let sync: CliError = SyncError::PipelineAborted {
            category: Category::Chart,
            reason: "panicked".to_string(),
        }
        .into();
        assert_eq!(sync.exit_code(), exit_codes::SYNC_ERROR);
    }
}
