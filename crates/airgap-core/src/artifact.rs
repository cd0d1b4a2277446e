//! The artifact client contract
//!
//! Every artifact category (distribution bundle, chart, image) is handled by
//! a client implementing [`ArtifactClient`]. Clients are created per item by
//! a [`ClientFactory`] and driven by the sync pipeline, which guarantees the
//! call order `download` -> `verify` -> `upload`. Clients do not re-check that
//! order themselves.

use async_trait::async_trait;
use std::fmt;

use crate::destination::{Destination, RegistryTarget};
use crate::error::ArtifactError;

/// Artifact categories, one pipeline each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Distribution,
    Chart,
    Image,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Distribution, Category::Chart, Category::Image];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Distribution => "distribution",
            Category::Chart => "chart",
            Category::Image => "image",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Download / verify / upload operations for one artifact
#[async_trait]
pub trait ArtifactClient: Send {
    /// Fetch the artifact into local scratch space
    ///
    /// Must be safe to call again after a partial failure.
    async fn download(&mut self) -> Result<(), ArtifactError>;

    /// Confirm the downloaded artifact is present and well-formed
    async fn verify(&mut self) -> Result<(), ArtifactError>;

    /// Push the verified artifact to its destination
    async fn upload(&mut self) -> Result<(), ArtifactError>;
}

/// Where an item is fetched from and where it ends up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub source: String,
    pub target: String,
}

/// Builds one [`ArtifactClient`] per manifest item
pub trait ClientFactory<I>: Send + Sync {
    fn create(
        &self,
        item: &I,
        destination: &Destination,
    ) -> Result<Box<dyn ArtifactClient>, ArtifactError>;

    /// Describe the transfer without touching the network or filesystem
    fn transfer(&self, item: &I, destination: &Destination) -> Transfer;
}

/// Performs the registry login that must precede a category's uploads
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, target: &RegistryTarget) -> Result<(), ArtifactError>;
}
