//! RKE2 distribution bundle
//!
//! The bundle is the install script plus the release tarballs of one RKE2
//! version, written to `<root>/rke2/`. It is never pushed to a registry:
//! with a registry destination it lands in the staging directory.

use airgap_core::{
    ArtifactClient, ArtifactError, ClientFactory, Destination, DistributionRelease, Transfer,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::digest::file_sha256_hex;
use crate::http::DownloadClient;

/// GitHub release download base
pub const RELEASE_BASE_URL: &str = "https://github.com/rancher/rke2/releases/download/";
/// Install script location
pub const INSTALL_SCRIPT_URL: &str = "https://get.rke2.io";
pub const INSTALL_SCRIPT: &str = "install.sh";
pub const CHECKSUM_FILE: &str = "sha256sum-amd64.txt";

/// Release assets fetched for every version
pub const RELEASE_FILES: &[&str] = &[
    "rke2-images.linux-amd64.tar.zst",
    "rke2-images-calico.linux-amd64.tar.zst",
    "rke2-images-flannel.linux-amd64.tar.zst",
    "rke2-images-cilium.linux-amd64.tar.zst",
    "rke2-images-canal.linux-amd64.tar.zst",
    "rke2-images-multus.linux-amd64.tar.zst",
    "rke2-images-core.linux-amd64.tar.zst",
    "rke2.linux-amd64.tar.gz",
    CHECKSUM_FILE,
];

/// Release page URL for `version` (`+` must be escaped in the path)
pub fn release_url(base: &str, version: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), version.replace('+', "%2B"))
}

/// Creates [`DistributionClient`]s
#[derive(Debug, Clone)]
pub struct DistributionFactory {
    staging_dir: PathBuf,
    release_base: String,
    install_script_url: String,
}

impl DistributionFactory {
    /// `staging_dir` receives the bundle when the destination is a registry
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            release_base: RELEASE_BASE_URL.to_string(),
            install_script_url: INSTALL_SCRIPT_URL.to_string(),
        }
    }

    /// Override the download locations (mirrors, tests)
    pub fn with_endpoints(
        mut self,
        release_base: impl Into<String>,
        install_script_url: impl Into<String>,
    ) -> Self {
        self.release_base = release_base.into();
        self.install_script_url = install_script_url.into();
        self
    }

    fn output_dir(&self, destination: &Destination) -> PathBuf {
        destination
            .local_dir()
            .unwrap_or(&self.staging_dir)
            .join("rke2")
    }
}

impl ClientFactory<DistributionRelease> for DistributionFactory {
    fn create(
        &self,
        item: &DistributionRelease,
        destination: &Destination,
    ) -> Result<Box<dyn ArtifactClient>, ArtifactError> {
        Ok(Box::new(DistributionClient {
            release_url: release_url(&self.release_base, &item.version),
            install_script_url: self.install_script_url.clone(),
            dir: self.output_dir(destination),
            http: DownloadClient::new()?,
        }))
    }

    fn transfer(&self, item: &DistributionRelease, destination: &Destination) -> Transfer {
        Transfer {
            source: release_url(&self.release_base, &item.version),
            target: self.output_dir(destination).display().to_string(),
        }
    }
}

/// Downloads and checks the RKE2 release files of one version
pub struct DistributionClient {
    release_url: String,
    install_script_url: String,
    dir: PathBuf,
    http: DownloadClient,
}

impl DistributionClient {
    pub fn output_dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArtifactClient for DistributionClient {
    async fn download(&mut self) -> Result<(), ArtifactError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        self.http
            .download_to(&self.install_script_url, &self.dir.join(INSTALL_SCRIPT))
            .await?;

        for file in RELEASE_FILES {
            let url = format!("{}/{}", self.release_url, file);
            self.http.download_to(&url, &self.dir.join(file)).await?;
        }
        Ok(())
    }

    async fn verify(&mut self) -> Result<(), ArtifactError> {
        let expected_files = RELEASE_FILES.iter().copied().chain([INSTALL_SCRIPT]);
        for file in expected_files {
            let path = self.dir.join(file);
            if !path.is_file() {
                return Err(ArtifactError::missing(
                    path.display().to_string(),
                    "file was not downloaded",
                ));
            }
        }

        let listing = tokio::fs::read_to_string(self.dir.join(CHECKSUM_FILE)).await?;
        let checksums = parse_checksums(&listing);
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || verify_checksums(&dir, &checksums))
            .await
            .map_err(|e| ArtifactError::Io {
                message: format!("checksum task failed: {}", e),
            })??;

        tracing::info!(dir = %self.dir.display(), "distribution bundle verified");
        Ok(())
    }

    async fn upload(&mut self) -> Result<(), ArtifactError> {
        tracing::debug!(dir = %self.dir.display(), "distribution bundle stays in the output tree");
        Ok(())
    }
}

/// Parse `<sha256>  <file>` lines
fn parse_checksums(listing: &str) -> HashMap<String, String> {
    listing
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let sum = parts.next()?;
            let name = parts.next()?.trim_start_matches('*');
            Some((name.to_string(), sum.to_lowercase()))
        })
        .collect()
}

/// Check every downloaded release file the listing mentions
fn verify_checksums(dir: &Path, checksums: &HashMap<String, String>) -> Result<(), ArtifactError> {
    for file in RELEASE_FILES.iter().filter(|f| **f != CHECKSUM_FILE) {
        let Some(expected) = checksums.get(*file) else {
            continue;
        };
        let path = dir.join(file);
        let actual = file_sha256_hex(&path)?;
        if &actual != expected {
            return Err(ArtifactError::missing(
                path.display().to_string(),
                format!("checksum mismatch: expected {}, got {}", expected, actual),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::sha256_hex;
    use airgap_core::ErrorKind;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VERSION: &str = "v1.28.9+rke2r1";

    fn content(file: &str) -> Vec<u8> {
        format!("contents of {}", file).into_bytes()
    }

    async fn mount_release(server: &MockServer) {
        let listing: String = RELEASE_FILES
            .iter()
            .filter(|f| **f != CHECKSUM_FILE)
            .map(|f| format!("{}  {}\n", sha256_hex(&content(f)), f))
            .collect();

        for file in RELEASE_FILES {
            let body = if *file == CHECKSUM_FILE {
                listing.clone().into_bytes()
            } else {
                content(file)
            };
            Mock::given(method("GET"))
                .and(path_regex(format!(r"^/releases/v1\.28\.9%2Brke2r1/{}$", regex_escape(file))))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
                .mount(server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/install"))
            .respond_with(ResponseTemplate::new(200).set_body_string("#!/bin/sh\n"))
            .mount(server)
            .await;
    }

    fn regex_escape(file: &str) -> String {
        file.replace('.', r"\.")
    }

    fn factory(server: &MockServer, staging: &Path) -> DistributionFactory {
        DistributionFactory::new(staging).with_endpoints(
            format!("{}/releases/", server.uri()),
            format!("{}/install", server.uri()),
        )
    }

    fn release() -> DistributionRelease {
        DistributionRelease {
            version: VERSION.to_string(),
        }
    }

    #[test]
    fn test_release_url_escapes_plus() {
        assert_eq!(
            release_url(RELEASE_BASE_URL, "v1.21.3+rke2r1"),
            "https://github.com/rancher/rke2/releases/download/v1.21.3%2Brke2r1"
        );
    }

    #[test]
    fn test_parse_checksums() {
        let sums = parse_checksums(
            "ABC  rke2.linux-amd64.tar.gz\ndef *rke2-images.linux-amd64.tar.zst\n\n",
        );
        assert_eq!(sums.get("rke2.linux-amd64.tar.gz").map(String::as_str), Some("abc"));
        assert_eq!(sums.get("rke2-images.linux-amd64.tar.zst").map(String::as_str), Some("def"));
    }

    #[test]
    fn test_transfer_targets() {
        let factory = DistributionFactory::new("/tmp/staging");
        let local = Destination::LocalDirectory(PathBuf::from("/srv/out"));
        let transfer = factory.transfer(&release(), &local);
        assert_eq!(transfer.target, "/srv/out/rke2");
        assert!(transfer.source.ends_with("v1.28.9%2Brke2r1"));

        let registry = Destination::Registry(airgap_core::RegistryTarget::new("reg.local"));
        assert_eq!(factory.transfer(&release(), &registry).target, "/tmp/staging/rke2");
    }

    #[tokio::test]
    async fn test_download_and_verify() {
        let server = MockServer::start().await;
        mount_release(&server).await;
        let dir = tempfile::tempdir().unwrap();
        let destination = Destination::LocalDirectory(dir.path().to_path_buf());

        let mut client = factory(&server, Path::new("/unused"))
            .create(&release(), &destination)
            .unwrap();
        client.download().await.unwrap();
        client.verify().await.unwrap();
        client.upload().await.unwrap();

        let out = dir.path().join("rke2");
        assert!(out.join(INSTALL_SCRIPT).is_file());
        for file in RELEASE_FILES {
            assert!(out.join(file).is_file(), "{} missing", file);
        }
    }

    #[tokio::test]
    async fn test_download_is_repeatable() {
        let server = MockServer::start().await;
        mount_release(&server).await;
        let dir = tempfile::tempdir().unwrap();
        let destination = Destination::LocalDirectory(dir.path().to_path_buf());

        let mut client = factory(&server, Path::new("/unused"))
            .create(&release(), &destination)
            .unwrap();
        client.download().await.unwrap();
        client.download().await.unwrap();
        client.verify().await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_detects_tampering() {
        let server = MockServer::start().await;
        mount_release(&server).await;
        let dir = tempfile::tempdir().unwrap();
        let destination = Destination::LocalDirectory(dir.path().to_path_buf());

        let mut client = factory(&server, Path::new("/unused"))
            .create(&release(), &destination)
            .unwrap();
        client.download().await.unwrap();
        std::fs::write(
            dir.path().join("rke2").join("rke2.linux-amd64.tar.gz"),
            b"tampered",
        )
        .unwrap();

        let err = client.verify().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingArtifact);
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[tokio::test]
    async fn test_verify_without_download() {
        let dir = tempfile::tempdir().unwrap();
        let destination = Destination::LocalDirectory(dir.path().to_path_buf());
        let mut client = DistributionFactory::new("/unused")
            .create(&release(), &destination)
            .unwrap();

        let err = client.verify().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingArtifact);
    }

    #[tokio::test]
    async fn test_unknown_version_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/install"))
            .respond_with(ResponseTemplate::new(200).set_body_string("#!/bin/sh\n"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let staging = tempfile::tempdir().unwrap();
        let destination = Destination::Registry(airgap_core::RegistryTarget::new("reg.local"));
        let mut client = factory(&server, staging.path()).create(&release(), &destination).unwrap();

        let err = client.download().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(staging.path().join("rke2").join(INSTALL_SCRIPT).is_file());
    }
}
