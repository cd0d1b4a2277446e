//! Run orchestration
//!
//! [`SyncManager::run`] starts one pipeline per category, all three
//! concurrently, and returns as soon as the outcome is known:
//!
//! - every pipeline succeeded: `Ok` with the per-category results
//! - any pipeline failed: `Err` with the first failure delivered
//!
//! On failure the remaining pipelines are asked to stop through a shared
//! [`CancelFlag`] and stop at their next item boundary. They are not
//! awaited; work already in flight is allowed to finish.

use airgap_core::{
    Authenticator, Category, ChartRef, ClientFactory, Destination, DistributionRelease, ImageRef,
    ReleaseManifest,
};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::aggregator::{CancelFlag, CompletionHandle, ErrorAggregator, Outcome};
use crate::error::SyncError;
use crate::events::ProgressReporter;
use crate::item::{ArtifactItem, PlanEntry};
use crate::pipeline::{Pipeline, PipelineContext, PipelineResult};

/// Everything a run needs from the outside
#[derive(Clone)]
pub struct Collaborators {
    pub distribution: Arc<dyn ClientFactory<DistributionRelease>>,
    pub charts: Arc<dyn ClientFactory<ChartRef>>,
    pub images: Arc<dyn ClientFactory<ImageRef>>,
    pub authenticator: Arc<dyn Authenticator>,
    pub reporter: Arc<dyn ProgressReporter>,
}

/// Drives the three category pipelines of a run
pub struct SyncManager {
    collaborators: Collaborators,
}

/// Per-category results of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub dry_run: bool,
    /// Ordered by category
    pub results: Vec<PipelineResult>,
}

impl SyncReport {
    pub fn result(&self, category: Category) -> Option<&PipelineResult> {
        self.results.iter().find(|r| r.category == category)
    }

    /// Items fully processed across all categories
    pub fn completed(&self) -> usize {
        self.results.iter().map(|r| r.completed).sum()
    }

    /// Dry-run plan entries of one category
    pub fn plan(&self, category: Category) -> &[PlanEntry] {
        self.result(category).map(|r| r.plan.as_slice()).unwrap_or(&[])
    }

    /// Every dry-run plan entry, distribution first
    pub fn plan_entries(&self) -> impl Iterator<Item = &PlanEntry> {
        self.results.iter().flat_map(|r| r.plan.iter())
    }
}

impl SyncManager {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    /// Mirror everything in `manifest` to `destination`
    ///
    /// With `dry_run`, pipelines only validate and describe their items.
    /// Must be called from within a tokio runtime.
    pub async fn run(
        &self,
        manifest: &ReleaseManifest,
        destination: &Destination,
        dry_run: bool,
    ) -> Result<SyncReport, SyncError> {
        let cancel = CancelFlag::new();
        let context = PipelineContext {
            destination: Arc::new(destination.clone()),
            authenticator: self.collaborators.authenticator.clone(),
            reporter: self.collaborators.reporter.clone(),
            cancel: cancel.clone(),
            dry_run,
        };

        tracing::info!(
            %destination,
            distribution = %manifest.distribution_version,
            charts = manifest.charts.len(),
            images = manifest.images.len(),
            dry_run,
            "starting sync"
        );

        let (aggregator, [distribution_done, charts_done, images_done]) =
            ErrorAggregator::new(Category::ALL);

        spawn_pipeline(
            Pipeline::new(
                vec![manifest.distribution()],
                self.collaborators.distribution.clone(),
                context.clone(),
            ),
            distribution_done,
        );
        spawn_pipeline(
            Pipeline::new(
                manifest.charts.clone(),
                self.collaborators.charts.clone(),
                context.clone(),
            ),
            charts_done,
        );
        spawn_pipeline(
            Pipeline::new(
                manifest.images.clone(),
                self.collaborators.images.clone(),
                context,
            ),
            images_done,
        );

        match aggregator.wait().await {
            Outcome::Completed(mut results) => {
                results.sort_by_key(|r| r.category);
                tracing::info!(dry_run, "sync finished");
                Ok(SyncReport { dry_run, results })
            }
            Outcome::Failed(result) => {
                cancel.cancel();
                let error = match result.error {
                    Some(source) => SyncError::CategoryFailed {
                        category: result.category,
                        source,
                    },
                    None => SyncError::PipelineAborted {
                        category: result.category,
                        reason: result
                            .aborted
                            .unwrap_or_else(|| "no result reported".to_string()),
                    },
                };
                tracing::error!(category = %error.category(), "sync failed: {}", error);
                Err(error)
            }
        }
    }
}

/// Run a pipeline on its own task and hand its result to `done`
///
/// The task is detached. A panic becomes an aborted result for the
/// pipeline's category.
fn spawn_pipeline<I: ArtifactItem>(mut pipeline: Pipeline<I>, done: CompletionHandle) {
    tokio::spawn(async move {
        let category = pipeline.category();
        let result = match AssertUnwindSafe(pipeline.run()).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => PipelineResult::aborted(category, panic_message(panic.as_ref())),
        };
        done.finish(result);
    });
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
