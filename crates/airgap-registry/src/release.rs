//! Release manifests published as container images
//!
//! Each Edge release ships a `release-manifest` image whose filesystem holds
//! `release_manifest.yaml` (distribution and charts) and
//! `release_images.yaml` (images).

use airgap_core::{ArtifactError, ReleaseManifest, ReleaseMode, ReleaseVersion};
use flate2::read::GzDecoder;
use std::io::Read;

use crate::oci::{OciTransport, media_types};

pub const RELEASE_MANIFEST_FILE: &str = "release_manifest.yaml";
pub const RELEASE_IMAGES_FILE: &str = "release_images.yaml";

/// Fetches release manifests from the release channel images
pub struct ReleaseSource {
    transport: OciTransport,
}

impl Default for ReleaseSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseSource {
    pub fn new() -> Self {
        Self {
            transport: OciTransport::anonymous(),
        }
    }

    /// Pull the release image for `version` and parse its manifests
    pub async fn fetch(
        &self,
        mode: ReleaseMode,
        version: &ReleaseVersion,
    ) -> Result<ReleaseManifest, ArtifactError> {
        let reference = mode.manifest_image(version);
        tracing::info!(%reference, "fetching release manifest");

        let image = self
            .transport
            .pull(&reference, media_types::IMAGE_LAYERS)
            .await?;
        let documents = ReleaseDocuments::extract(image.layers.iter().map(|l| l.data.as_slice()))?;
        documents.into_manifest()
    }
}

/// The two YAML documents of a release image
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReleaseDocuments {
    pub release: String,
    pub images: String,
}

impl ReleaseDocuments {
    /// Find both documents in the image layers, later layers winning
    pub fn extract<'a>(
        layers: impl IntoIterator<Item = &'a [u8]>,
    ) -> Result<Self, ArtifactError> {
        let mut release = None;
        let mut images = None;

        for layer in layers {
            for (name, content) in layer_files(layer)? {
                match name.as_str() {
                    RELEASE_MANIFEST_FILE => release = Some(content),
                    RELEASE_IMAGES_FILE => images = Some(content),
                    _ => {}
                }
            }
        }

        let missing = |file: &str| {
            ArtifactError::not_found(format!("{} in release manifest image", file))
        };
        Ok(Self {
            release: release.ok_or_else(|| missing(RELEASE_MANIFEST_FILE))?,
            images: images.ok_or_else(|| missing(RELEASE_IMAGES_FILE))?,
        })
    }

    pub fn into_manifest(self) -> Result<ReleaseManifest, ArtifactError> {
        ReleaseManifest::from_release_documents(&self.release, &self.images)
            .map_err(|e| ArtifactError::configuration(e.to_string()))
    }
}

/// Release YAML files of one layer, gzip-compressed or plain tar
fn layer_files(layer: &[u8]) -> Result<Vec<(String, String)>, ArtifactError> {
    let gzipped = layer.starts_with(&[0x1f, 0x8b]);
    if gzipped {
        read_tar(GzDecoder::new(layer))
    } else {
        read_tar(layer)
    }
}

fn read_tar<R: Read>(reader: R) -> Result<Vec<(String, String)>, ArtifactError> {
    let mut archive = tar::Archive::new(reader);
    let mut files = Vec::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry
            .path()?
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name != RELEASE_MANIFEST_FILE && name != RELEASE_IMAGES_FILE {
            continue;
        }
        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        files.push((name, content));
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::tests::tgz;
    use airgap_core::ErrorKind;

    const RELEASE: &str = r#"
apiVersion: lifecycle.suse.com/v1alpha1
kind: ReleaseManifest
spec:
  releaseVersion: 3.1.0
  components:
    kubernetes:
      rke2:
        version: v1.30.3+rke2r1
    workloads:
      helm:
        - releaseName: metallb
          chart: oci://registry.suse.com/edge/3.1/metallb-chart
          version: 0.14.9
        - releaseName: rancher
          chart: rancher
          version: 2.9.1
          repository: https://charts.rancher.com/server-charts/prime
"#;

    const IMAGES: &str = r#"
images:
  - name: registry.suse.com/edge/3.1/kubevirt-manager:1.1.0
  - name: registry.rancher.com/rancher/hardened-sriov-network-operator:v1.3.0
"#;

    #[test]
    fn test_extract_from_gzip_layer() {
        let layer = tgz(&[
            ("release_manifest.yaml", RELEASE),
            ("release_images.yaml", IMAGES),
            ("README", "ignored"),
        ]);
        let documents = ReleaseDocuments::extract([layer.as_slice()]).unwrap();
        let manifest = documents.into_manifest().unwrap();

        assert_eq!(manifest.distribution_version, "v1.30.3+rke2r1");
        assert_eq!(manifest.charts.len(), 2);
        assert!(manifest.charts[0].is_oci());
        assert_eq!(manifest.images.len(), 2);
    }

    #[test]
    fn test_documents_across_layers() {
        let first = tgz(&[("release_manifest.yaml", RELEASE)]);
        let second = tgz(&[("etc/release_images.yaml", IMAGES)]);
        let documents = ReleaseDocuments::extract([first.as_slice(), second.as_slice()]).unwrap();
        assert!(documents.images.contains("kubevirt-manager"));
    }

    #[test]
    fn test_missing_document() {
        let layer = tgz(&[("release_manifest.yaml", RELEASE)]);
        let err = ReleaseDocuments::extract([layer.as_slice()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains(RELEASE_IMAGES_FILE));
    }
}
