//! Airgap Registry - concrete artifact clients
//!
//! This crate talks to the outside world:
//! - [`RegistryClient`]: registry login (basic auth and bearer token handshake)
//! - [`DistributionFactory`]: RKE2 release bundle from GitHub releases
//! - [`ChartFactory`]: Helm charts from OCI registries or `index.yaml` repositories
//! - [`ImageFactory`]: container images over the OCI distribution API
//! - [`ReleaseSource`]: release manifests published as container images
//!
//! Every client reports failures as [`ArtifactError`](airgap_core::ArtifactError).

pub mod chart;
pub mod digest;
pub mod distribution;
pub mod error;
pub mod http;
pub mod image;
pub mod index;
pub mod login;
pub mod oci;
pub mod release;
pub mod tls;

pub use chart::{ChartClient, ChartFactory};
pub use distribution::{DistributionClient, DistributionFactory};
pub use error::{RegistryError, Result};
pub use http::DownloadClient;
pub use image::{ImageClient, ImageFactory};
pub use index::{ChartEntry, RepositoryIndex};
pub use login::{BearerChallenge, RegistryClient};
pub use oci::{OciReference, OciTransport};
pub use release::{ReleaseDocuments, ReleaseSource};
pub use tls::TlsSettings;
