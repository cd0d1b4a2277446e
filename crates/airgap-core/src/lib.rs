//! Airgap Core - shared types for building air-gapped release bundles
//!
//! This crate provides the foundational types used throughout airgap:
//! - `ReleaseManifest`: what a run must produce (distribution, charts, images)
//! - `Destination`: a local directory or a private registry
//! - `Credentials`: the registry credential handle
//! - `ArtifactClient` / `ClientFactory` / `Authenticator`: the contracts the
//!   sync engine drives
//! - `ArtifactError`: the failure taxonomy shared by every category

pub mod artifact;
pub mod config;
pub mod credentials;
pub mod destination;
pub mod error;
pub mod manifest;

pub use artifact::{ArtifactClient, Authenticator, Category, ClientFactory, Transfer};
pub use config::{AirgapConfig, RegistrySettings, ReleaseMode, ReleaseVersion};
pub use credentials::{Credentials, DockerConfig, ResolvedCredentials};
pub use destination::{Destination, RegistryTarget};
pub use error::{ArtifactError, CoreError, ErrorKind};
pub use manifest::{ChartRef, DistributionRelease, ImageRef, ReleaseManifest};
