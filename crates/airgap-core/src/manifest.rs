//! Release manifests
//!
//! A [`ReleaseManifest`] is the validated, read-only description of what a
//! run must produce: one distribution version, an ordered list of charts and
//! an ordered list of images.
//!
//! Two on-disk formats are understood:
//!
//! - the *airgap manifest*, a single document listing rke2, helm and images
//!   under `components`
//! - the *release manifest* published in release container images, whose
//!   images are listed in a separate *images manifest*

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ArtifactError, CoreError, Result};

/// Desired state of an air-gap run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseManifest {
    /// Kubernetes distribution version (e.g. `v1.28.9+rke2r1`)
    pub distribution_version: String,
    /// Charts in manifest order
    #[serde(default)]
    pub charts: Vec<ChartRef>,
    /// Images in manifest order
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

/// The distribution bundle, handled as a single composite artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionRelease {
    pub version: String,
}

/// A Helm chart to mirror
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRef {
    /// Release name (e.g. `rancher`)
    pub release_name: String,
    /// Chart name, or a full `oci://` reference
    pub chart: String,
    pub version: String,
    /// Repository URL, required for non-OCI charts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

/// A container image to mirror
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub name: String,
    #[serde(default)]
    pub version: String,
    /// Source location prefix (e.g. `docker.io/library`), may be empty
    #[serde(default)]
    pub location: String,
}

impl ReleaseManifest {
    pub fn new(distribution_version: impl Into<String>) -> Self {
        Self {
            distribution_version: distribution_version.into(),
            charts: Vec::new(),
            images: Vec::new(),
        }
    }

    pub fn with_chart(mut self, chart: ChartRef) -> Self {
        self.charts.push(chart);
        self
    }

    pub fn with_image(mut self, image: ImageRef) -> Self {
        self.images.push(image);
        self
    }

    /// The single distribution item of this manifest
    pub fn distribution(&self) -> DistributionRelease {
        DistributionRelease {
            version: self.distribution_version.clone(),
        }
    }

    /// Parse an airgap manifest document
    pub fn from_airgap_yaml(yaml: &str) -> Result<Self> {
        let doc: raw::AirgapManifest = serde_yaml::from_str(yaml)?;
        let manifest = doc.into_manifest();
        manifest.check()?;
        Ok(manifest)
    }

    /// Load an airgap manifest file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::ManifestNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_airgap_yaml(&content)
    }

    /// Build from a release manifest and its separate images manifest
    pub fn from_release_documents(release_yaml: &str, images_yaml: &str) -> Result<Self> {
        let release: raw::ReleaseDocument = serde_yaml::from_str(release_yaml)?;
        let images: raw::ImagesDocument = serde_yaml::from_str(images_yaml)?;

        let components = release.spec.components;
        let manifest = Self {
            distribution_version: components.kubernetes.rke2.version,
            charts: components
                .workloads
                .helm
                .into_iter()
                .map(|h| ChartRef {
                    release_name: h.release_name,
                    chart: h.chart,
                    version: h.version,
                    repository: h.repository.filter(|r| !r.is_empty()),
                })
                .collect(),
            images: images.images.into_iter().map(raw::ImageEntry::into_ref).collect(),
        };
        manifest.check()?;
        Ok(manifest)
    }

    /// Structural checks shared by every format
    fn check(&self) -> Result<()> {
        if self.distribution_version.trim().is_empty() {
            return Err(CoreError::InvalidManifest {
                message: "kubernetes distribution version is missing".to_string(),
            });
        }
        if let Some(image) = self.images.iter().find(|i| i.name.trim().is_empty()) {
            return Err(CoreError::InvalidManifest {
                message: format!("image entry with empty name (version '{}')", image.version),
            });
        }
        Ok(())
    }
}

impl ChartRef {
    pub fn new(
        release_name: impl Into<String>,
        chart: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            release_name: release_name.into(),
            chart: chart.into(),
            version: version.into(),
            repository: None,
        }
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    /// Whether `chart` is a self-contained `oci://` reference
    pub fn is_oci(&self) -> bool {
        self.chart.starts_with("oci://")
    }

    /// Bare chart name, the last path segment of `chart`
    pub fn chart_name(&self) -> &str {
        let trimmed = self.chart.trim_end_matches('/');
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }

    /// Archive file name Helm produces for this chart
    pub fn archive_name(&self) -> String {
        format!("{}-{}.tgz", self.chart_name(), self.version)
    }

    /// Repository URL for non-OCI charts, without trailing slash
    pub fn repository_url(&self) -> Option<&str> {
        self.repository
            .as_deref()
            .map(|r| r.trim_end_matches('/'))
            .filter(|r| !r.is_empty())
    }

    /// Checks that must pass before any network call
    pub fn validate(&self) -> std::result::Result<(), ArtifactError> {
        if self.chart.trim().is_empty() {
            return Err(ArtifactError::configuration(format!(
                "chart reference is missing for release {}",
                self.release_name
            )));
        }
        if self.version.trim().is_empty() {
            return Err(ArtifactError::configuration(format!(
                "chart version is missing for release {}",
                self.release_name
            )));
        }
        if !self.is_oci() && self.repository_url().is_none() {
            return Err(ArtifactError::configuration(format!(
                "repository URL is missing for chart {}",
                self.release_name
            )));
        }
        Ok(())
    }
}

impl ImageRef {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            location: location.into(),
        }
    }

    /// Fully qualified reference to pull from
    pub fn source_reference(&self) -> String {
        let location = self.location.trim_end_matches('/');
        let repository = if location.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", location, self.name)
        };
        if self.version.is_empty() || has_tag_or_digest(&self.name) {
            repository
        } else {
            format!("{}:{}", repository, self.version)
        }
    }

    /// Reference to push to inside `registry`
    ///
    /// Any registry host already present in `name` is replaced by `registry`.
    pub fn destination_reference(&self, registry: &str) -> String {
        let registry = registry.trim_end_matches('/');
        let (repository, tag) = split_tag(&self.name);
        let repository = strip_registry_host(repository);
        let tag = if self.version.is_empty() {
            tag.unwrap_or("latest")
        } else {
            self.version.as_str()
        };
        format!("{}/{}:{}", registry, repository, tag)
    }
}

/// Whether the last path segment carries `:tag` or `@digest`
fn has_tag_or_digest(name: &str) -> bool {
    let last = name.rsplit('/').next().unwrap_or(name);
    last.contains(':') || last.contains('@')
}

fn split_tag(name: &str) -> (&str, Option<&str>) {
    let name = name.split('@').next().unwrap_or(name);
    match name.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => (repo, Some(tag)),
        _ => (name, None),
    }
}

/// Drop the first segment when it looks like a registry host
fn strip_registry_host(repository: &str) -> &str {
    match repository.split_once('/') {
        Some((first, rest))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            rest
        }
        _ => repository,
    }
}

mod raw {
    use serde::Deserialize;

    use super::{ChartRef, ImageRef};

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AirgapManifest {
        #[allow(dead_code)]
        #[serde(default)]
        pub api_version: Option<serde_yaml::Value>,
        pub components: AirgapComponents,
    }

    #[derive(Deserialize)]
    pub struct AirgapComponents {
        pub kubernetes: Kubernetes,
        #[serde(default)]
        pub helm: Vec<AirgapHelm>,
        #[serde(default)]
        pub images: Vec<ImageEntry>,
    }

    #[derive(Deserialize)]
    pub struct Kubernetes {
        pub rke2: Rke2,
    }

    #[derive(Deserialize)]
    pub struct Rke2 {
        pub version: String,
    }

    #[derive(Deserialize)]
    pub struct AirgapHelm {
        pub name: String,
        pub version: String,
        #[serde(default)]
        pub location: String,
        #[allow(dead_code)]
        #[serde(default)]
        pub namespace: Option<String>,
    }

    #[derive(Deserialize)]
    pub struct ImageEntry {
        pub name: String,
        #[serde(default)]
        pub version: String,
        #[serde(default)]
        pub location: String,
    }

    impl ImageEntry {
        pub fn into_ref(self) -> ImageRef {
            ImageRef {
                name: self.name,
                version: self.version,
                location: self.location,
            }
        }
    }

    impl AirgapManifest {
        pub fn into_manifest(self) -> super::ReleaseManifest {
            let components = self.components;
            super::ReleaseManifest {
                distribution_version: components.kubernetes.rke2.version,
                charts: components.helm.into_iter().map(AirgapHelm::into_ref).collect(),
                images: components.images.into_iter().map(ImageEntry::into_ref).collect(),
            }
        }
    }

    impl AirgapHelm {
        fn into_ref(self) -> ChartRef {
            let location = self.location.trim_end_matches('/');
            if location.starts_with("oci://") {
                ChartRef {
                    chart: format!("{}/{}", location, self.name),
                    release_name: self.name,
                    version: self.version,
                    repository: None,
                }
            } else {
                ChartRef {
                    chart: self.name.clone(),
                    release_name: self.name,
                    version: self.version,
                    repository: Some(location.to_string()).filter(|l| !l.is_empty()),
                }
            }
        }
    }

    #[derive(Deserialize)]
    pub struct ReleaseDocument {
        pub spec: ReleaseSpec,
    }

    #[derive(Deserialize)]
    pub struct ReleaseSpec {
        pub components: ReleaseComponents,
    }

    #[derive(Deserialize)]
    pub struct ReleaseComponents {
        pub kubernetes: Kubernetes,
        #[serde(default)]
        pub workloads: Workloads,
    }

    #[derive(Deserialize, Default)]
    pub struct Workloads {
        #[serde(default)]
        pub helm: Vec<ReleaseHelm>,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ReleaseHelm {
        pub release_name: String,
        pub chart: String,
        pub version: String,
        #[serde(default)]
        pub repository: Option<String>,
    }

    #[derive(Deserialize)]
    pub struct ImagesDocument {
        #[serde(default)]
        pub images: Vec<ImageEntry>,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const AIRGAP_YAML: &str = r#"
apiVersion: 1.0
components:
  kubernetes:
    rke2:
      version: v1.28.9+rke2r1
  helm:
    - name: sriov-crd-chart
      version: 1.2.2
      location: oci://registry.suse.com/edge/
      namespace: sriov-network-operator
    - name: rancher
      version: 2.8.4
      location: https://releases.rancher.com/server-charts/stable
  images:
    - name: hardened-sriov-network-operator
      version: v1.2.0-build20240327
      location: docker.io/rancher
"#;

    #[test]
    fn test_parse_airgap_manifest() {
        let manifest = ReleaseManifest::from_airgap_yaml(AIRGAP_YAML).unwrap();
        assert_eq!(manifest.distribution_version, "v1.28.9+rke2r1");
        assert_eq!(manifest.charts.len(), 2);
        assert_eq!(manifest.images.len(), 1);

        let sriov = &manifest.charts[0];
        assert!(sriov.is_oci());
        assert_eq!(sriov.chart, "oci://registry.suse.com/edge/sriov-crd-chart");
        assert!(sriov.repository.is_none());
        assert!(sriov.validate().is_ok());

        let rancher = &manifest.charts[1];
        assert!(!rancher.is_oci());
        assert_eq!(
            rancher.repository_url(),
            Some("https://releases.rancher.com/server-charts/stable")
        );
    }

    #[test]
    fn test_parse_release_documents() {
        let release = r#"
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
        - releaseName: metal3
          chart: oci://registry.suse.com/edge/3.1/metal3-chart
          version: 0.8.1
        - releaseName: rancher
          chart: rancher
          version: 2.9.1
          repository: https://releases.rancher.com/server-charts/stable
"#;
        let images = r#"
images:
  - name: registry.suse.com/edge/3.1/ironic:24.1.2.0
  - name: registry.rancher.com/rancher/hardened-calico:v3.28.1-build20240806
"#;
        let manifest = ReleaseManifest::from_release_documents(release, images).unwrap();
        assert_eq!(manifest.distribution_version, "v1.30.3+rke2r1");
        assert_eq!(manifest.charts.len(), 2);
        assert_eq!(manifest.charts[0].release_name, "metal3");
        assert_eq!(manifest.images.len(), 2);
        assert_eq!(
            manifest.images[0].source_reference(),
            "registry.suse.com/edge/3.1/ironic:24.1.2.0"
        );
    }

    #[test]
    fn test_missing_distribution_version() {
        let yaml = r#"
components:
  kubernetes:
    rke2:
      version: ""
"#;
        let err = ReleaseManifest::from_airgap_yaml(yaml).unwrap_err();
        assert!(matches!(err, CoreError::InvalidManifest { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ReleaseManifest::load(Path::new("/nonexistent/manifest.yaml")).unwrap_err();
        assert!(matches!(err, CoreError::ManifestNotFound { .. }));
    }

    #[test]
    fn test_chart_validation() {
        let oci = ChartRef::new("sriov", "oci://registry.example/edge/sriov", "1.2.2");
        assert!(oci.validate().is_ok());
        assert_eq!(oci.chart_name(), "sriov");
        assert_eq!(oci.archive_name(), "sriov-1.2.2.tgz");

        let no_repo = ChartRef::new("rancher", "rancher", "2.8.4");
        assert_eq!(
            no_repo.validate().unwrap_err().kind(),
            ErrorKind::Configuration
        );

        let empty_repo = ChartRef::new("rancher", "rancher", "2.8.4").with_repository("");
        assert_eq!(
            empty_repo.validate().unwrap_err().kind(),
            ErrorKind::Configuration
        );

        let with_repo = ChartRef::new("rancher", "rancher", "2.8.4")
            .with_repository("https://releases.rancher.com/server-charts/stable/");
        assert!(with_repo.validate().is_ok());
        assert_eq!(
            with_repo.repository_url(),
            Some("https://releases.rancher.com/server-charts/stable")
        );
    }

    #[test]
    fn test_image_references() {
        let nginx = ImageRef::new("nginx", "1.19.6", "docker.io/library");
        assert_eq!(nginx.source_reference(), "docker.io/library/nginx:1.19.6");
        assert_eq!(
            nginx.destination_reference("registry.local:5000"),
            "registry.local:5000/nginx:1.19.6"
        );

        let qualified = ImageRef::new("registry.suse.com/edge/3.1/ironic:24.1.2.0", "", "");
        assert_eq!(
            qualified.source_reference(),
            "registry.suse.com/edge/3.1/ironic:24.1.2.0"
        );
        assert_eq!(
            qualified.destination_reference("registry.local/"),
            "registry.local/edge/3.1/ironic:24.1.2.0"
        );

        let untagged = ImageRef::new("rancher/shell", "v0.1.24", "");
        assert_eq!(untagged.source_reference(), "rancher/shell:v0.1.24");
        assert_eq!(
            untagged.destination_reference("reg.local"),
            "reg.local/rancher/shell:v0.1.24"
        );
    }

    #[test]
    fn test_located_image_without_version_or_with_tag() {
        let yaml = r#"components:
  kubernetes:
    rke2:
      version: v1.28.9+rke2r1
  images:
    - name: nginx
      location: docker.io/library
"#;
        let manifest = ReleaseManifest::from_airgap_yaml(yaml).unwrap();
        let nginx = &manifest.images[0];
        assert_eq!(nginx.source_reference(), "docker.io/library/nginx");
        assert_eq!(
            nginx.destination_reference("reg.local"),
            "reg.local/nginx:latest"
        );

        let tagged = ImageRef::new("nginx:1.19.6", "1.19.6", "docker.io/library");
        assert_eq!(tagged.source_reference(), "docker.io/library/nginx:1.19.6");

        let digest = ImageRef::new("nginx@sha256:abcd", "1.19.6", "docker.io/library/");
        assert_eq!(digest.source_reference(), "docker.io/library/nginx@sha256:abcd");
    }

    #[test]
    fn test_registry_with_port_in_name() {
        let image = ImageRef::new("localhost:5000/team/app", "1.0", "");
        assert_eq!(
            image.destination_reference("mirror.local"),
            "mirror.local/team/app:1.0"
        );
    }
}
