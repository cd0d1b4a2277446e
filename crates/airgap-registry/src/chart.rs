//! Helm chart client
//!
//! Charts are fetched either from an OCI registry (`oci://` references) or
//! from a classic repository through its `index.yaml`, and stored as
//! `<root>/charts/<chart>-<version>.tgz`.

use airgap_core::{
    ArtifactClient, ArtifactError, ChartRef, ClientFactory, Destination, RegistryTarget, Transfer,
};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use oci_distribution::client::{Config, ImageLayer};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::digest::{compute_digest, digest_matches};
use crate::error::RegistryError;
use crate::http::DownloadClient;
use crate::index::RepositoryIndex;
use crate::oci::{OciReference, OciTransport, media_types};

/// Creates [`ChartClient`]s
#[derive(Debug, Clone)]
pub struct ChartFactory {
    staging_dir: PathBuf,
}

impl ChartFactory {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
        }
    }

    fn archive_path(&self, chart: &ChartRef, destination: &Destination) -> PathBuf {
        destination
            .local_dir()
            .unwrap_or(&self.staging_dir)
            .join("charts")
            .join(chart.archive_name())
    }
}

impl ClientFactory<ChartRef> for ChartFactory {
    fn create(
        &self,
        item: &ChartRef,
        destination: &Destination,
    ) -> Result<Box<dyn ArtifactClient>, ArtifactError> {
        item.validate()?;
        if item.is_oci() {
            OciReference::parse(&item.chart)?;
        }
        Ok(Box::new(ChartClient {
            chart: item.clone(),
            archive: self.archive_path(item, destination),
            registry: destination.registry().cloned(),
        }))
    }

    fn transfer(&self, item: &ChartRef, destination: &Destination) -> Transfer {
        let source = if item.is_oci() {
            format!("{}:{}", item.chart, item.version)
        } else {
            format!(
                "{}/{}",
                item.repository_url().unwrap_or_default(),
                item.chart_name()
            )
        };
        let target = match destination.registry() {
            Some(target) => push_reference(target, item),
            None => self.archive_path(item, destination).display().to_string(),
        };
        Transfer { source, target }
    }
}

/// `<registry>/<chart>:<version>`
fn push_reference(target: &RegistryTarget, chart: &ChartRef) -> String {
    format!("{}/{}:{}", target.host(), chart.chart_name(), chart.version)
}

/// Downloads, checks and pushes one chart archive
pub struct ChartClient {
    chart: ChartRef,
    archive: PathBuf,
    registry: Option<RegistryTarget>,
}

impl ChartClient {
    pub fn archive_path(&self) -> &Path {
        &self.archive
    }

    async fn fetch_oci(&self) -> Result<Vec<u8>, ArtifactError> {
        let reference = OciReference::parse(&self.chart.chart)?
            .with_tag(&self.chart.version)
            .to_oci_string();
        let image = OciTransport::anonymous()
            .pull(&reference, &[media_types::HELM_CONFIG, media_types::HELM_CONTENT])
            .await?;

        let layer = image
            .layers
            .into_iter()
            .find(|l| l.media_type == media_types::HELM_CONTENT)
            .ok_or_else(|| RegistryError::OciError {
                message: format!("No chart content layer found in {}", reference),
            })?;
        Ok(layer.data)
    }

    async fn fetch_from_repository(&self) -> Result<Vec<u8>, ArtifactError> {
        let repository = self.chart.repository_url().ok_or_else(|| {
            ArtifactError::configuration(format!(
                "repository URL is missing for chart {}",
                self.chart.release_name
            ))
        })?;
        let http = DownloadClient::new()?;

        let index_url = format!("{}/index.yaml", repository);
        let index = RepositoryIndex::from_bytes(&http.get_bytes(&index_url).await?)?;

        let name = self.chart.chart_name();
        let entry = index
            .get_version(name, &self.chart.version)
            .ok_or_else(|| RegistryError::ChartNotFound {
                name: name.to_string(),
                version: self.chart.version.clone(),
                repo: repository.to_string(),
            })?;
        let url = entry
            .download_url(repository)
            .ok_or_else(|| RegistryError::ChartNotFound {
                name: name.to_string(),
                version: self.chart.version.clone(),
                repo: repository.to_string(),
            })?;

        let data = http.get_bytes(&url).await?;
        if let Some(expected) = &entry.digest {
            let actual = compute_digest(&data);
            if !digest_matches(expected, &actual) {
                return Err(RegistryError::IntegrityCheckFailed {
                    name: self.chart.archive_name(),
                    expected: expected.clone(),
                    actual,
                }
                .into());
            }
        }
        Ok(data)
    }
}

#[async_trait]
impl ArtifactClient for ChartClient {
    async fn download(&mut self) -> Result<(), ArtifactError> {
        let data = if self.chart.is_oci() {
            self.fetch_oci().await?
        } else {
            self.fetch_from_repository().await?
        };

        if let Some(parent) = self.archive.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.archive, &data).await?;
        tracing::debug!(
            chart = %self.chart.chart_name(),
            path = %self.archive.display(),
            "chart downloaded"
        );
        Ok(())
    }

    async fn verify(&mut self) -> Result<(), ArtifactError> {
        let data = read_archive(&self.archive).await?;
        chart_metadata(&data).map_err(|message| {
            ArtifactError::missing(self.archive.display().to_string(), message)
        })?;
        Ok(())
    }

    async fn upload(&mut self) -> Result<(), ArtifactError> {
        let Some(target) = &self.registry else {
            tracing::debug!(path = %self.archive.display(), "chart kept in output tree");
            return Ok(());
        };

        let data = read_archive(&self.archive).await?;
        let metadata = chart_metadata(&data).map_err(|message| {
            ArtifactError::missing(self.archive.display().to_string(), message)
        })?;

        let reference = push_reference(target, &self.chart);
        let config = Config {
            data: metadata,
            media_type: media_types::HELM_CONFIG.to_string(),
            annotations: None,
        };
        let layers = vec![ImageLayer {
            data,
            media_type: media_types::HELM_CONTENT.to_string(),
            annotations: None,
        }];

        let url = OciTransport::for_target(target)?
            .push(&reference, &layers, config, None)
            .await?;
        tracing::info!(%reference, manifest = %url, "chart pushed");
        Ok(())
    }
}

async fn read_archive(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    tokio::fs::read(path).await.map_err(|e| {
        ArtifactError::missing(path.display().to_string(), format!("cannot read archive: {}", e))
    })
}

/// `Chart.yaml` of a chart archive, converted to the JSON Helm stores as config
fn chart_metadata(archive: &[u8]) -> Result<Vec<u8>, String> {
    let mut tar = tar::Archive::new(GzDecoder::new(archive));
    let entries = tar
        .entries()
        .map_err(|e| format!("not a gzip tar archive: {}", e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| format!("corrupt archive: {}", e))?;
        let path = entry
            .path()
            .map_err(|e| format!("corrupt archive: {}", e))?
            .into_owned();
        if !is_chart_yaml(&path) {
            continue;
        }

        let mut yaml = String::new();
        entry
            .read_to_string(&mut yaml)
            .map_err(|e| format!("unreadable Chart.yaml: {}", e))?;
        let value: serde_yaml::Value =
            serde_yaml::from_str(&yaml).map_err(|e| format!("invalid Chart.yaml: {}", e))?;
        return serde_json::to_vec(&value).map_err(|e| format!("invalid Chart.yaml: {}", e));
    }
    Err("archive does not contain a Chart.yaml".to_string())
}

/// `Chart.yaml` at the archive root or one directory below it
fn is_chart_yaml(path: &Path) -> bool {
    path.file_name().is_some_and(|n| n == "Chart.yaml") && path.components().count() <= 2
}
