//! OCI registry transport
//!
//! Thin wrapper over `oci-distribution` used for charts, images and the
//! release manifest image. Pulls from public sources use the system trust
//! store; pushes to the destination registry use its TLS settings.

use airgap_core::{ArtifactError, RegistryTarget, ResolvedCredentials};
use oci_distribution::Reference;
use oci_distribution::client::{Client, Config, ImageData, ImageLayer};
use oci_distribution::manifest::OciImageManifest;
use oci_distribution::secrets::RegistryAuth;

use crate::error::{RegistryError, Result};
use crate::tls::TlsSettings;

/// Media types handled by airgap
pub mod media_types {
    /// Helm chart config
    pub const HELM_CONFIG: &str = "application/vnd.cncf.helm.config.v1+json";
    /// Helm chart content layer
    pub const HELM_CONTENT: &str = "application/vnd.cncf.helm.chart.content.v1.tar+gzip";

    pub const OCI_LAYER: &str = "application/vnd.oci.image.layer.v1.tar";
    pub const OCI_LAYER_GZIP: &str = "application/vnd.oci.image.layer.v1.tar+gzip";
    pub const OCI_LAYER_ZSTD: &str = "application/vnd.oci.image.layer.v1.tar+zstd";
    pub const DOCKER_LAYER_GZIP: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";
    pub const DOCKER_FOREIGN_LAYER_GZIP: &str =
        "application/vnd.docker.image.rootfs.foreign.diff.tar.gzip";

    /// Layer types accepted when pulling container images
    pub const IMAGE_LAYERS: &[&str] = &[
        OCI_LAYER,
        OCI_LAYER_GZIP,
        OCI_LAYER_ZSTD,
        DOCKER_LAYER_GZIP,
        DOCKER_FOREIGN_LAYER_GZIP,
    ];
}

/// OCI client bound to one set of credentials
pub struct OciTransport {
    client: Client,
    auth: RegistryAuth,
}

impl OciTransport {
    pub fn new(settings: &TlsSettings, credentials: &ResolvedCredentials) -> Self {
        let auth = match credentials.basic() {
            Some((username, password)) => {
                RegistryAuth::Basic(username.to_string(), password.to_string())
            }
            None => RegistryAuth::Anonymous,
        };
        Self {
            client: Client::new(settings.oci_config()),
            auth,
        }
    }

    /// Anonymous HTTPS transport for public sources
    pub fn anonymous() -> Self {
        Self::new(&TlsSettings::default(), &ResolvedCredentials::Anonymous)
    }

    /// Authenticated transport for a destination registry
    pub fn for_target(target: &RegistryTarget) -> std::result::Result<Self, ArtifactError> {
        let credentials = target.credentials.resolve(target.authority())?;
        let settings = TlsSettings::for_target(target)?;
        Ok(Self::new(&settings, &credentials))
    }

    /// Parse an OCI reference string
    ///
    /// Format: oci://registry/repo:tag or registry/repo:tag
    pub fn parse_reference(reference: &str) -> Result<Reference> {
        let clean = strip_scheme(reference);
        Reference::try_from(clean).map_err(|e| RegistryError::InvalidOciReference {
            reference: format!("{}: {}", reference, e),
        })
    }

    /// Pull manifest, config and the layers of the accepted media types
    pub async fn pull(&self, reference: &str, accepted: &[&str]) -> Result<ImageData> {
        let reference = Self::parse_reference(reference)?;
        tracing::debug!(reference = %reference, "pulling");
        let data = self
            .client
            .pull(&reference, &self.auth, accepted.to_vec())
            .await?;
        Ok(data)
    }

    /// Push layers, config and optionally a prepared manifest
    pub async fn push(
        &self,
        reference: &str,
        layers: &[ImageLayer],
        config: Config,
        manifest: Option<OciImageManifest>,
    ) -> Result<String> {
        let reference = Self::parse_reference(reference)?;
        tracing::debug!(reference = %reference, layers = layers.len(), "pushing");
        let response = self
            .client
            .push(&reference, layers, config, &self.auth, manifest)
            .await
            .map_err(|e| RegistryError::OciPushFailed {
                message: e.to_string(),
            })?;
        Ok(response.manifest_url)
    }
}

fn strip_scheme(reference: &str) -> &str {
    reference
        .trim_start_matches("oci://")
        .trim_start_matches("https://")
        .trim_start_matches("http://")
}

/// OCI reference helper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OciReference {
    pub registry: String,
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl OciReference {
    /// Parse an OCI reference string
    pub fn parse(s: &str) -> Result<Self> {
        let clean = strip_scheme(s);

        let (registry, rest) =
            clean
                .split_once('/')
                .ok_or_else(|| RegistryError::InvalidOciReference {
                    reference: s.to_string(),
                })?;
        if registry.is_empty() || rest.is_empty() {
            return Err(RegistryError::InvalidOciReference {
                reference: s.to_string(),
            });
        }

        let (repo_tag, digest) = match rest.rsplit_once('@') {
            Some((repo_tag, digest)) => (repo_tag, Some(digest.to_string())),
            None => (rest, None),
        };

        let (repository, tag) = match repo_tag.rsplit_once(':') {
            Some((repository, tag)) if !tag.contains('/') => {
                (repository.to_string(), Some(tag.to_string()))
            }
            _ => (repo_tag.to_string(), None),
        };

        Ok(Self {
            registry: registry.to_string(),
            repository,
            tag,
            digest,
        })
    }

    /// Same reference with a different tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self.digest = None;
        self
    }

    /// Last path segment of the repository
    pub fn name(&self) -> &str {
        self.repository
            .rsplit('/')
            .next()
            .unwrap_or(&self.repository)
    }

    /// Convert to string representation
    pub fn to_oci_string(&self) -> String {
        let mut s = format!("{}/{}", self.registry, self.repository);
        if let Some(tag) = &self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(digest) = &self.digest {
            s.push('@');
            s.push_str(digest);
        }
        s
    }
}
