//! HTTP downloads of public release assets
//!
//! Release assets and Helm repositories are fetched anonymously. Release
//! assets are typically served through a redirect to a CDN.

use futures::StreamExt;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::error::{RegistryError, Result};
use crate::tls::HTTP_TIMEOUT;

const MAX_REDIRECTS: usize = 10;

/// Anonymous HTTP client for upstream artifacts
#[derive(Debug, Clone)]
pub struct DownloadClient {
    client: reqwest::Client,
}

impl DownloadClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| RegistryError::NetworkError {
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }

    /// Fetch a URL, following redirects, and map error statuses
    pub async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let url = response.url().to_string();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound { url });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(RegistryError::AuthRequired { url });
        }
        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(RegistryError::AuthFailed {
                message: format!("Access denied to {}", url),
            });
        }
        if !status.is_success() {
            return Err(RegistryError::HttpError {
                status: status.as_u16(),
                message: format!("Request to {} failed", url),
            });
        }
        Ok(response)
    }

    /// Fetch bytes from URL
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.get(url).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    /// Stream a URL into `dest`, replacing any partial file
    ///
    /// The body is written to a `.part` file first and renamed on success.
    pub async fn download_to(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self.get(url).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = dest.with_extension(match dest.extension() {
            Some(ext) => format!("{}.part", ext.to_string_lossy()),
            None => "part".to_string(),
        });

        let mut file = tokio::fs::File::create(&partial).await?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&partial, dest).await?;
        tracing::debug!(%url, path = %dest.display(), bytes = written, "downloaded");
        Ok(written)
    }
}
