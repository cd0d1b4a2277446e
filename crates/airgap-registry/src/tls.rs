//! TLS settings for talking to a destination registry
//!
//! `insecure` wins over everything: certificate validation is disabled and
//! the CA path is never read, even when it points at garbage.

use airgap_core::{ArtifactError, RegistryTarget};
use oci_distribution::client::{Certificate, CertificateEncoding, ClientConfig, ClientProtocol};
use std::path::Path;
use std::time::Duration;

const PEM_CERTIFICATE_HEADER: &str = "-----BEGIN CERTIFICATE-----";

/// Request timeout for registry and repository HTTP calls
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Resolved TLS behaviour for one registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    pub insecure: bool,
    /// Extra trusted root, PEM encoded
    pub ca_pem: Option<Vec<u8>>,
    /// Talk plain HTTP (explicit `http://` registry URL)
    pub plain_http: bool,
}

impl TlsSettings {
    /// Settings for a destination registry
    pub fn for_target(target: &RegistryTarget) -> Result<Self, ArtifactError> {
        let plain_http = target.scheme() == "http";
        if target.insecure {
            return Ok(Self {
                insecure: true,
                ca_pem: None,
                plain_http,
            });
        }
        let ca_pem = match &target.ca_cert {
            Some(path) => Some(read_ca(path)?),
            None => None,
        };
        Ok(Self {
            insecure: false,
            ca_pem,
            plain_http,
        })
    }

    /// Apply to a reqwest builder
    pub fn apply(
        &self,
        builder: reqwest::ClientBuilder,
    ) -> Result<reqwest::ClientBuilder, ArtifactError> {
        if self.insecure {
            return Ok(builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true));
        }
        match &self.ca_pem {
            Some(pem) => {
                let cert = reqwest::Certificate::from_pem(pem)
                    .map_err(|e| ArtifactError::tls(format!("invalid CA certificate: {}", e)))?;
                Ok(builder.add_root_certificate(cert))
            }
            None => Ok(builder),
        }
    }

    /// HTTP client following the default redirect policy
    pub fn http_client(&self) -> Result<reqwest::Client, ArtifactError> {
        self.apply(reqwest::Client::builder().timeout(HTTP_TIMEOUT))?
            .build()
            .map_err(|e| ArtifactError::tls(format!("failed to build HTTP client: {}", e)))
    }

    /// Configuration for the OCI distribution client
    pub fn oci_config(&self) -> ClientConfig {
        let extra_root_certificates = self
            .ca_pem
            .iter()
            .map(|pem| Certificate {
                encoding: CertificateEncoding::Pem,
                data: pem.clone(),
            })
            .collect();
        ClientConfig {
            protocol: if self.plain_http {
                ClientProtocol::Http
            } else {
                ClientProtocol::Https
            },
            accept_invalid_certificates: self.insecure,
            extra_root_certificates,
            ..Default::default()
        }
    }
}

fn read_ca(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    let pem = std::fs::read(path).map_err(|e| {
        ArtifactError::tls(format!("failed to read CA certificate {}: {}", path.display(), e))
    })?;
    let text = String::from_utf8_lossy(&pem);
    if !text.contains(PEM_CERTIFICATE_HEADER) {
        return Err(ArtifactError::tls(format!(
            "{} does not contain a PEM certificate",
            path.display()
        )));
    }
    Ok(pem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use airgap_core::ErrorKind;

    #[test]
    fn test_insecure_never_reads_ca() {
        let target = RegistryTarget::new("registry.local:5000")
            .with_ca_cert("/nonexistent/ca.pem")
            .insecure(true);
        let settings = TlsSettings::for_target(&target).unwrap();
        assert!(settings.insecure);
        assert!(settings.ca_pem.is_none());
        assert!(settings.http_client().is_ok());
        assert!(settings.oci_config().accept_invalid_certificates);
    }

    #[test]
    fn test_missing_ca_is_tls_error() {
        let target = RegistryTarget::new("registry.local:5000").with_ca_cert("/nonexistent/ca.pem");
        let err = TlsSettings::for_target(&target).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Tls);
    }

    #[test]
    fn test_non_pem_ca_is_tls_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ca.pem");
        std::fs::write(&path, "not a certificate").unwrap();

        let target = RegistryTarget::new("registry.local:5000").with_ca_cert(&path);
        let err = TlsSettings::for_target(&target).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Tls);
    }

    #[test]
    fn test_default_settings() {
        let target = RegistryTarget::new("registry.local:5000");
        let settings = TlsSettings::for_target(&target).unwrap();
        assert_eq!(settings, TlsSettings::default());
        let config = settings.oci_config();
        assert!(!config.accept_invalid_certificates);
        assert!(config.extra_root_certificates.is_empty());
    }

    #[test]
    fn test_plain_http_target() {
        let target = RegistryTarget::new("http://127.0.0.1:5000");
        let settings = TlsSettings::for_target(&target).unwrap();
        assert!(settings.plain_http);
        assert!(matches!(settings.oci_config().protocol, ClientProtocol::Http));
    }
}
