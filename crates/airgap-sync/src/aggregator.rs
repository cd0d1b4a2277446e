//! First-failure-wins result collection across pipelines

use airgap_core::Category;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

use crate::pipeline::PipelineResult;

/// Cooperative cancellation shared by the pipelines of one run
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How the run ended, as seen by the aggregator
#[derive(Debug)]
pub enum Outcome {
    /// Every pipeline succeeded; results in arrival order
    Completed(Vec<PipelineResult>),
    /// The first failure delivered
    Failed(PipelineResult),
}

/// Collects exactly one result per pipeline and stops at the first failure
#[derive(Debug)]
pub struct ErrorAggregator {
    receiver: mpsc::UnboundedReceiver<PipelineResult>,
    categories: Vec<Category>,
}

/// Single-use token through which a pipeline reports its result
///
/// A handle dropped without [`finish`](Self::finish) reports an aborted
/// result for its category, so the aggregator never waits on a pipeline
/// that is gone.
#[derive(Debug)]
pub struct CompletionHandle {
    category: Category,
    sender: mpsc::UnboundedSender<PipelineResult>,
    finished: bool,
}

impl ErrorAggregator {
    pub fn new<const N: usize>(categories: [Category; N]) -> (Self, [CompletionHandle; N]) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handles = categories.map(|category| CompletionHandle {
            category,
            sender: sender.clone(),
            finished: false,
        });
        let aggregator = Self {
            receiver,
            categories: categories.to_vec(),
        };
        (aggregator, handles)
    }

    /// Wait until every pipeline succeeded or one failed
    pub async fn wait(mut self) -> Outcome {
        let mut completed = Vec::with_capacity(self.categories.len());
        while completed.len() < self.categories.len() {
            match self.receiver.recv().await {
                Some(result) if result.succeeded => completed.push(result),
                Some(result) => return Outcome::Failed(result),
                None => {
                    // Handles always report on drop, so only a category
                    // that never got a handle can be missing here
                    let missing = self
                        .categories
                        .iter()
                        .copied()
                        .find(|c| !completed.iter().any(|r: &PipelineResult| r.category == *c))
                        .unwrap_or(Category::Distribution);
                    return Outcome::Failed(PipelineResult::aborted(
                        missing,
                        "result channel closed",
                    ));
                }
            }
        }
        Outcome::Completed(completed)
    }
}

impl CompletionHandle {
    pub fn category(&self) -> Category {
        self.category
    }

    pub fn finish(mut self, result: PipelineResult) {
        self.finished = true;
        // The aggregator may already have returned on another failure
        let _ = self.sender.send(result);
    }
}

impl Drop for CompletionHandle {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.sender.send(PipelineResult::aborted(
                self.category,
                "pipeline ended without reporting a result",
            ));
        }
    }
}
