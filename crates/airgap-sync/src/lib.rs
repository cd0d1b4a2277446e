//! Airgap Sync - concurrent artifact pipelines
//!
//! A run mirrors three artifact categories (distribution bundle, charts,
//! images). Each category is handled by one [`Pipeline`] that drives every
//! item of the category through download, verify and upload in manifest
//! order. The three pipelines run concurrently under a [`SyncManager`],
//! which reports success once all of them finish or the first failure as
//! soon as any of them fails.
//!
//! The engine knows nothing about registries or file formats: concrete
//! clients come in through [`ClientFactory`](airgap_core::ClientFactory)
//! and [`Authenticator`](airgap_core::Authenticator) implementations.

pub mod aggregator;
pub mod error;
pub mod events;
pub mod item;
pub mod manager;
pub mod mock;
pub mod pipeline;

pub use aggregator::{CancelFlag, CompletionHandle, ErrorAggregator, Outcome};
pub use error::SyncError;
pub use events::{ProgressReporter, Stage, SyncEvent, TracingReporter};
pub use item::{ArtifactItem, PlanEntry};
pub use manager::{Collaborators, SyncManager, SyncReport};
pub use pipeline::{Pipeline, PipelineContext, PipelineResult, PipelineState};
