//! Per-category pipeline
//!
//! A [`Pipeline`] owns the items of one category and drives each of them
//! through `download -> verify -> upload`, strictly in manifest order. The
//! first error stops the pipeline. Items after the failing one are never
//! started.
//!
//! Lifecycle:
//!
//! ```text
//! NotStarted -> Running -> Succeeded
//!                       -> Failed
//! ```

use airgap_core::{
    ArtifactClient, ArtifactError, Authenticator, Category, ClientFactory, Destination,
};
use std::sync::Arc;

use crate::aggregator::CancelFlag;
use crate::events::{ProgressReporter, Stage, SyncEvent};
use crate::item::{ArtifactItem, PlanEntry};

/// Pipeline lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    NotStarted,
    Running,
    Succeeded,
    Failed,
}

/// Run-wide collaborators shared by every pipeline
#[derive(Clone)]
pub struct PipelineContext {
    pub destination: Arc<Destination>,
    pub authenticator: Arc<dyn Authenticator>,
    pub reporter: Arc<dyn ProgressReporter>,
    pub cancel: CancelFlag,
    pub dry_run: bool,
}

/// Final report of one pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResult {
    pub category: Category,
    pub succeeded: bool,
    /// First error of the pipeline, if it failed
    pub error: Option<ArtifactError>,
    /// Set when the pipeline task ended without producing a result
    pub aborted: Option<String>,
    /// Items that went through all three operations
    pub completed: usize,
    /// Dry-run plan, one entry per item
    pub plan: Vec<PlanEntry>,
}

impl PipelineResult {
    pub fn success(category: Category, completed: usize) -> Self {
        Self {
            category,
            succeeded: true,
            error: None,
            aborted: None,
            completed,
            plan: Vec::new(),
        }
    }

    pub fn planned(category: Category, plan: Vec<PlanEntry>) -> Self {
        Self {
            plan,
            ..Self::success(category, 0)
        }
    }

    pub fn failure(category: Category, completed: usize, error: ArtifactError) -> Self {
        Self {
            category,
            succeeded: false,
            error: Some(error),
            aborted: None,
            completed,
            plan: Vec::new(),
        }
    }

    pub fn aborted(category: Category, reason: impl Into<String>) -> Self {
        Self {
            category,
            succeeded: false,
            error: None,
            aborted: Some(reason.into()),
            completed: 0,
            plan: Vec::new(),
        }
    }
}

/// Sequential download/verify/upload driver for one category
pub struct Pipeline<I: ArtifactItem> {
    items: Vec<I>,
    factory: Arc<dyn ClientFactory<I>>,
    context: PipelineContext,
    state: PipelineState,
    completed: usize,
}

impl<I: ArtifactItem> Pipeline<I> {
    pub fn new(
        items: Vec<I>,
        factory: Arc<dyn ClientFactory<I>>,
        context: PipelineContext,
    ) -> Self {
        Self {
            items,
            factory,
            context,
            state: PipelineState::NotStarted,
            completed: 0,
        }
    }

    pub fn category(&self) -> Category {
        I::CATEGORY
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Process every item, or plan them in a dry run
    pub async fn run(&mut self) -> PipelineResult {
        if self.state != PipelineState::NotStarted {
            return PipelineResult::failure(
                I::CATEGORY,
                self.completed,
                ArtifactError::configuration(format!("{} pipeline already ran", I::CATEGORY)),
            );
        }
        self.state = PipelineState::Running;
        self.emit(SyncEvent::PipelineStarted {
            category: I::CATEGORY,
            items: self.items.len(),
            dry_run: self.context.dry_run,
        });

        let result = if self.context.dry_run {
            match self.plan() {
                Ok(plan) => PipelineResult::planned(I::CATEGORY, plan),
                Err(e) => PipelineResult::failure(I::CATEGORY, 0, e),
            }
        } else {
            match self.sync().await {
                Ok(()) => PipelineResult::success(I::CATEGORY, self.completed),
                Err(e) => PipelineResult::failure(I::CATEGORY, self.completed, e),
            }
        };

        self.state = if result.succeeded {
            PipelineState::Succeeded
        } else {
            PipelineState::Failed
        };
        self.emit(SyncEvent::PipelineFinished {
            category: I::CATEGORY,
            succeeded: result.succeeded,
            error: result.error.as_ref().map(ToString::to_string),
        });
        result
    }

    /// Validate and describe every item without creating clients
    fn plan(&self) -> Result<Vec<PlanEntry>, ArtifactError> {
        let destination = self.context.destination.as_ref();
        let mut plan = Vec::with_capacity(self.items.len());
        for item in &self.items {
            item.validate()?;
            let entry = PlanEntry::new(item, self.factory.transfer(item, destination));
            self.emit(SyncEvent::Planned(entry.clone()));
            plan.push(entry);
        }
        Ok(plan)
    }

    async fn sync(&mut self) -> Result<(), ArtifactError> {
        // A misconfigured item fails the category before any network traffic
        self.items.iter().try_for_each(|item| item.validate())?;
        self.login().await?;

        let total = self.items.len();
        for index in 0..total {
            if self.context.cancel.is_cancelled() {
                self.emit(SyncEvent::Skipped {
                    category: I::CATEGORY,
                    remaining: total - index,
                });
                return Err(ArtifactError::Cancelled);
            }

            let item = self.items[index].clone();
            let mut client = self.factory.create(&item, &self.context.destination)?;
            self.process(&item, client.as_mut()).await?;

            self.completed += 1;
            self.emit(SyncEvent::ItemCompleted {
                category: I::CATEGORY,
                item: item.id(),
                position: index + 1,
                total,
            });
        }
        Ok(())
    }

    /// Authenticate once before the first upload of the category
    async fn login(&self) -> Result<(), ArtifactError> {
        if !I::REQUIRES_LOGIN || self.items.is_empty() {
            return Ok(());
        }
        let Some(target) = self.context.destination.registry() else {
            return Ok(());
        };
        self.context.authenticator.login(target).await?;
        self.emit(SyncEvent::LoggedIn {
            category: I::CATEGORY,
            registry: target.host().to_string(),
        });
        Ok(())
    }

    async fn process(
        &self,
        item: &I,
        client: &mut dyn ArtifactClient,
    ) -> Result<(), ArtifactError> {
        let id = item.id();

        self.stage(&id, Stage::Downloading);
        client.download().await?;
        self.stage(&id, Stage::Downloaded);

        self.stage(&id, Stage::Verifying);
        client.verify().await?;
        self.stage(&id, Stage::Verified);

        self.stage(&id, Stage::Uploading);
        client.upload().await?;
        self.stage(&id, Stage::Done);
        Ok(())
    }

    fn stage(&self, item: &str, stage: Stage) {
        tracing::debug!(category = %I::CATEGORY, item, %stage, "entering stage");
        self.emit(SyncEvent::StageEntered {
            category: I::CATEGORY,
            item: item.to_string(),
            stage,
        });
    }

    fn emit(&self, event: SyncEvent) {
        self.context.reporter.report(&event);
    }
}
