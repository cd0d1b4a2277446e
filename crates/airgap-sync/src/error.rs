//! Error types for sync runs

use airgap_core::{ArtifactError, Category};
use thiserror::Error;

/// Outcome of a failed run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The first category to fail, with its first error
    #[error("{category} pipeline failed: {source}")]
    CategoryFailed {
        category: Category,
        #[source]
        source: ArtifactError,
    },

    /// A pipeline task ended without producing a result
    #[error("{category} pipeline aborted: {reason}")]
    PipelineAborted { category: Category, reason: String },
}

impl SyncError {
    pub fn category(&self) -> Category {
        match self {
            SyncError::CategoryFailed { category, .. } => *category,
            SyncError::PipelineAborted { category, .. } => *category,
        }
    }

    /// The underlying artifact error, if the pipeline reported one
    pub fn artifact_error(&self) -> Option<&ArtifactError> {
        match self {
            SyncError::CategoryFailed { source, .. } => Some(source),
            SyncError::PipelineAborted { .. } => None,
        }
    }
}
