//! Container image client
//!
//! An image is pulled into `<root>/images/<sanitized reference>/`:
//!
//! ```text
//! manifest.json   image manifest
//! config.json     image config blob
//! <hex digest>    one file per layer
//! ```
//!
//! Verify re-hashes every blob against the manifest; upload pushes the same
//! blobs and manifest to the destination registry.

use airgap_core::{
    ArtifactClient, ArtifactError, ClientFactory, Destination, ImageRef, RegistryTarget, Transfer,
};
use async_trait::async_trait;
use oci_distribution::client::{Config, ImageLayer};
use oci_distribution::manifest::{OciDescriptor, OciImageManifest};
use std::path::{Path, PathBuf};

use crate::digest::{compute_digest, digest_matches, file_sha256_hex};
use crate::oci::{OciTransport, media_types};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const CONFIG_FILE: &str = "config.json";

/// Creates [`ImageClient`]s
#[derive(Debug, Clone)]
pub struct ImageFactory {
    staging_dir: PathBuf,
}

impl ImageFactory {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
        }
    }

    fn image_dir(&self, image: &ImageRef, destination: &Destination) -> PathBuf {
        destination
            .local_dir()
            .unwrap_or(&self.staging_dir)
            .join("images")
            .join(sanitize(&image.source_reference()))
    }
}

impl ClientFactory<ImageRef> for ImageFactory {
    fn create(
        &self,
        item: &ImageRef,
        destination: &Destination,
    ) -> Result<Box<dyn ArtifactClient>, ArtifactError> {
        let source = item.source_reference();
        OciTransport::parse_reference(&source)?;
        Ok(Box::new(ImageClient {
            source,
            dir: self.image_dir(item, destination),
            push_to: destination
                .registry()
                .map(|target| (target.clone(), item.destination_reference(target.host()))),
        }))
    }

    fn transfer(&self, item: &ImageRef, destination: &Destination) -> Transfer {
        let target = match destination.registry() {
            Some(target) => item.destination_reference(target.host()),
            None => self.image_dir(item, destination).display().to_string(),
        };
        Transfer {
            source: item.source_reference(),
            target,
        }
    }
}

/// Directory name for a reference
fn sanitize(reference: &str) -> String {
    reference
        .chars()
        .map(|c| match c {
            '/' | ':' | '@' => '_',
            c => c,
        })
        .collect()
}

/// Pulls, checks and pushes one image
pub struct ImageClient {
    source: String,
    dir: PathBuf,
    push_to: Option<(RegistryTarget, String)>,
}

impl ImageClient {
    pub fn image_dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArtifactClient for ImageClient {
    async fn download(&mut self) -> Result<(), ArtifactError> {
        let image = OciTransport::anonymous()
            .pull(&self.source, media_types::IMAGE_LAYERS)
            .await?;

        let manifest = image
            .manifest
            .unwrap_or_else(|| build_manifest(&image.layers, &image.config));
        let dir = self.dir.clone();
        let layers = image.layers;
        let config = image.config;
        tokio::task::spawn_blocking(move || write_image(&dir, &manifest, &config, &layers))
            .await
            .map_err(|e| ArtifactError::Io {
                message: format!("image write task failed: {}", e),
            })??;

        tracing::debug!(image = %self.source, dir = %self.dir.display(), "image downloaded");
        Ok(())
    }

    async fn verify(&mut self) -> Result<(), ArtifactError> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || verify_image(&dir))
            .await
            .map_err(|e| ArtifactError::Io {
                message: format!("image verify task failed: {}", e),
            })?
    }

    async fn upload(&mut self) -> Result<(), ArtifactError> {
        let Some((target, reference)) = &self.push_to else {
            tracing::debug!(image = %self.source, "image kept in output tree");
            return Ok(());
        };

        let dir = self.dir.clone();
        let (manifest, config, layers) = tokio::task::spawn_blocking(move || read_image(&dir))
            .await
            .map_err(|e| ArtifactError::Io {
                message: format!("image read task failed: {}", e),
            })??;

        let url = OciTransport::for_target(target)?
            .push(reference, &layers, config, Some(manifest))
            .await?;
        tracing::info!(image = %self.source, %reference, manifest = %url, "image pushed");
        Ok(())
    }
}

fn descriptor(media_type: &str, data: &[u8]) -> OciDescriptor {
    OciDescriptor {
        media_type: media_type.to_string(),
        digest: compute_digest(data),
        size: data.len() as i64,
        ..Default::default()
    }
}

/// Manifest describing exactly the given blobs
pub fn build_manifest(layers: &[ImageLayer], config: &Config) -> OciImageManifest {
    OciImageManifest {
        config: descriptor(&config.media_type, &config.data),
        layers: layers
            .iter()
            .map(|l| descriptor(&l.media_type, &l.data))
            .collect(),
        ..Default::default()
    }
}

/// File name of a blob, the hex part of its digest
fn blob_file(digest: &str) -> Result<String, ArtifactError> {
    let hex = digest.split_once(':').map(|(_, h)| h).unwrap_or(digest);
    if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ArtifactError::invalid_reference(digest, "not a sha256 digest"));
    }
    Ok(hex.to_lowercase())
}

/// Write an image directory from scratch
pub fn write_image(
    dir: &Path,
    manifest: &OciImageManifest,
    config: &Config,
    layers: &[ImageLayer],
) -> Result<(), ArtifactError> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;

    for layer in layers {
        let name = blob_file(&compute_digest(&layer.data))?;
        std::fs::write(dir.join(name), &layer.data)?;
    }
    std::fs::write(dir.join(CONFIG_FILE), &config.data)?;

    let json = serde_json::to_vec_pretty(manifest).map_err(|e| ArtifactError::Io {
        message: format!("cannot encode manifest: {}", e),
    })?;
    std::fs::write(dir.join(MANIFEST_FILE), json)?;
    Ok(())
}

fn load_manifest(dir: &Path) -> Result<OciImageManifest, ArtifactError> {
    let path = dir.join(MANIFEST_FILE);
    let data = std::fs::read(&path).map_err(|e| {
        ArtifactError::missing(path.display().to_string(), format!("cannot read manifest: {}", e))
    })?;
    serde_json::from_slice(&data).map_err(|e| {
        ArtifactError::missing(path.display().to_string(), format!("invalid manifest: {}", e))
    })
}

fn check_blob(path: &Path, expected: &str) -> Result<(), ArtifactError> {
    if !path.is_file() {
        return Err(ArtifactError::missing(
            path.display().to_string(),
            "blob was not downloaded",
        ));
    }
    let actual = file_sha256_hex(path)?;
    if !digest_matches(expected, &actual) {
        return Err(ArtifactError::missing(
            path.display().to_string(),
            format!("digest mismatch: expected {}, got sha256:{}", expected, actual),
        ));
    }
    Ok(())
}

/// Check manifest, config and every layer against their digests
pub fn verify_image(dir: &Path) -> Result<(), ArtifactError> {
    let manifest = load_manifest(dir)?;
    check_blob(&dir.join(CONFIG_FILE), &manifest.config.digest)?;
    for layer in &manifest.layers {
        check_blob(&dir.join(blob_file(&layer.digest)?), &layer.digest)?;
    }
    Ok(())
}

fn read_image(dir: &Path) -> Result<(OciImageManifest, Config, Vec<ImageLayer>), ArtifactError> {
    let manifest = load_manifest(dir)?;
    let config = Config {
        data: std::fs::read(dir.join(CONFIG_FILE))?,
        media_type: manifest.config.media_type.clone(),
        annotations: None,
    };
    let layers = manifest
        .layers
        .iter()
        .map(|descriptor| {
            Ok(ImageLayer {
                data: std::fs::read(dir.join(blob_file(&descriptor.digest)?))?,
                media_type: descriptor.media_type.clone(),
                annotations: None,
            })
        })
        .collect::<Result<Vec<_>, ArtifactError>>()?;
    Ok((manifest, config, layers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use airgap_core::ErrorKind;

    fn sample() -> (OciImageManifest, Config, Vec<ImageLayer>) {
        let layers = vec![
            ImageLayer {
                data: b"layer one".to_vec(),
                media_type: media_types::DOCKER_LAYER_GZIP.to_string(),
                annotations: None,
            },
            ImageLayer {
                data: b"layer two".to_vec(),
                media_type: media_types::OCI_LAYER_GZIP.to_string(),
                annotations: None,
            },
        ];
        let config = Config {
            data: br#"{"architecture":"amd64","os":"linux"}"#.to_vec(),
            media_type: "application/vnd.oci.image.config.v1+json".to_string(),
            annotations: None,
        };
        let manifest = build_manifest(&layers, &config);
        (manifest, config, layers)
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("docker.io/library/nginx:1.19.6"), "docker.io_library_nginx_1.19.6");
    }

    #[test]
    fn test_blob_file_rejects_paths() {
        assert_eq!(blob_file("sha256:ABCdef").unwrap(), "abcdef");
        assert!(blob_file("sha256:../../etc/passwd").is_err());
    }

    #[test]
    fn test_write_verify_read() {
        let dir = tempfile::tempdir().unwrap();
        let image_dir = dir.path().join("nginx");
        let (manifest, config, layers) = sample();

        write_image(&image_dir, &manifest, &config, &layers).unwrap();
        verify_image(&image_dir).unwrap();

        let (read_manifest, read_config, read_layers) = read_image(&image_dir).unwrap();
        assert_eq!(read_manifest.layers.len(), 2);
        assert_eq!(read_config.data, config.data);
        assert_eq!(read_layers[1].data, b"layer two");
        assert_eq!(read_layers[0].media_type, media_types::DOCKER_LAYER_GZIP);
    }

    #[test]
    fn test_verify_detects_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let (manifest, config, layers) = sample();
        write_image(dir.path(), &manifest, &config, &layers).unwrap();

        let blob = blob_file(&manifest.layers[0].digest).unwrap();
        std::fs::write(dir.path().join(&blob), b"corrupted").unwrap();
        let err = verify_image(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingArtifact);

        std::fs::remove_file(dir.path().join(&blob)).unwrap();
        let err = verify_image(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingArtifact);
    }

    #[test]
    fn test_verify_without_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let err = verify_image(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingArtifact);
    }

    #[test]
    fn test_transfer_and_paths() {
        let factory = ImageFactory::new("/tmp/staging");
        let nginx = ImageRef::new("nginx", "1.19.6", "docker.io/library");

        let local = Destination::LocalDirectory(PathBuf::from("/srv/out"));
        let transfer = factory.transfer(&nginx, &local);
        assert_eq!(transfer.source, "docker.io/library/nginx:1.19.6");
        assert_eq!(transfer.target, "/srv/out/images/docker.io_library_nginx_1.19.6");

        let registry = Destination::Registry(RegistryTarget::new("registry.local:5000"));
        assert_eq!(
            factory.transfer(&nginx, &registry).target,
            "registry.local:5000/nginx:1.19.6"
        );
    }

    #[tokio::test]
    async fn test_local_upload_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let destination = Destination::LocalDirectory(dir.path().to_path_buf());
        let nginx = ImageRef::new("nginx", "1.19.6", "docker.io/library");
        let mut client = ImageFactory::new("/unused").create(&nginx, &destination).unwrap();
        client.upload().await.unwrap();
    }

    #[test]
    fn test_invalid_source_reference() {
        let factory = ImageFactory::new("/tmp/staging");
        let bad = ImageRef::new("Not Valid", "1.0", "docker.io/library");
        let local = Destination::LocalDirectory(PathBuf::from("/srv/out"));
        let err = factory.create(&bad, &local).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidReference);
    }
}
