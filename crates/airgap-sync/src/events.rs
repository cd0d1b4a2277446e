//! Progress events emitted by pipelines
//!
//! Pipelines report every state change through a [`ProgressReporter`].
//! [`TracingReporter`] turns events into structured log records; the CLI's
//! terminal reporter prints lines and forwards every event to it.

use airgap_core::Category;
use std::fmt;

use crate::item::PlanEntry;

/// Per-item stage within a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Downloading,
    Downloaded,
    Verifying,
    Verified,
    Uploading,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Downloading => "downloading",
            Stage::Downloaded => "downloaded",
            Stage::Verifying => "verifying",
            Stage::Verified => "verified",
            Stage::Uploading => "uploading",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Something observable happened in a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    PipelineStarted {
        category: Category,
        items: usize,
        dry_run: bool,
    },
    LoggedIn {
        category: Category,
        registry: String,
    },
    StageEntered {
        category: Category,
        item: String,
        stage: Stage,
    },
    ItemCompleted {
        category: Category,
        item: String,
        /// 1-based position in the category
        position: usize,
        total: usize,
    },
    Planned(PlanEntry),
    /// Items left unprocessed after cancellation
    Skipped {
        category: Category,
        remaining: usize,
    },
    PipelineFinished {
        category: Category,
        succeeded: bool,
        error: Option<String>,
    },
}

/// Sink for [`SyncEvent`]s, shared by all pipelines of a run
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &SyncEvent);
}

/// Reports events as `tracing` records
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, event: &SyncEvent) {
        match event {
            SyncEvent::PipelineStarted {
                category,
                items,
                dry_run,
            } => {
                tracing::info!(%category, items, dry_run, "pipeline started");
            }
            SyncEvent::LoggedIn { category, registry } => {
                tracing::info!(%category, %registry, "logged in");
            }
            SyncEvent::StageEntered {
                category,
                item,
                stage,
            } => {
                tracing::debug!(%category, %item, %stage, "stage");
            }
            SyncEvent::ItemCompleted {
                category,
                item,
                position,
                total,
            } => {
                tracing::info!(%category, %item, "completed {}/{}", position, total);
            }
            SyncEvent::Planned(entry) => {
                tracing::info!(
                    category = %entry.category,
                    item = %entry.item,
                    version = %entry.version,
                    source = %entry.source,
                    target = %entry.target,
                    "planned"
                );
            }
            SyncEvent::Skipped {
                category,
                remaining,
            } => {
                tracing::warn!(%category, remaining, "cancelled, skipping remaining items");
            }
            SyncEvent::PipelineFinished {
                category,
                succeeded: true,
                ..
            } => {
                tracing::info!(%category, "pipeline finished");
            }
            SyncEvent::PipelineFinished {
                category, error, ..
            } => {
                tracing::error!(
                    %category,
                    error = error.as_deref().unwrap_or("unknown"),
                    "pipeline failed"
                );
            }
        }
    }
}
