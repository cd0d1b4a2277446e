//! Output targets of an air-gap run

use std::fmt;
use std::path::{Path, PathBuf};

use crate::credentials::Credentials;

/// Where the artifacts of a run end up
///
/// Selected once per run and shared read-only by every pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A local directory tree
    LocalDirectory(PathBuf),
    /// A private registry to pre-load
    Registry(RegistryTarget),
}

impl Destination {
    /// Local output directory, if this is a local destination
    pub fn local_dir(&self) -> Option<&Path> {
        match self {
            Destination::LocalDirectory(path) => Some(path),
            Destination::Registry(_) => None,
        }
    }

    /// Registry target, if this is a registry destination
    pub fn registry(&self) -> Option<&RegistryTarget> {
        match self {
            Destination::LocalDirectory(_) => None,
            Destination::Registry(target) => Some(target),
        }
    }

    /// Whether uploads go to a registry
    pub fn is_registry(&self) -> bool {
        matches!(self, Destination::Registry(_))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::LocalDirectory(path) => write!(f, "{}", path.display()),
            Destination::Registry(target) => write!(f, "oci://{}", target.host()),
        }
    }
}

/// A private registry and how to talk to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryTarget {
    /// Registry URL, with or without scheme and path (e.g. `registry.local:5000/edge`)
    pub url: String,
    /// Credential handle, resolved lazily
    pub credentials: Credentials,
    /// CA certificate used to validate the registry, ignored when insecure
    pub ca_cert: Option<PathBuf>,
    /// Skip all certificate validation
    pub insecure: bool,
}

impl RegistryTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credentials: Credentials::Anonymous,
            ca_cert: None,
            insecure: false,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_ca_cert(mut self, ca_cert: impl Into<PathBuf>) -> Self {
        self.ca_cert = Some(ca_cert.into());
        self
    }

    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Registry location without scheme or trailing slash
    ///
    /// `https://registry.local:5000/edge/` -> `registry.local:5000/edge`
    pub fn host(&self) -> &str {
        self.url
            .trim_start_matches("oci://")
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
    }

    /// `http` when the URL asks for plain HTTP, `https` otherwise
    pub fn scheme(&self) -> &'static str {
        if self.url.starts_with("http://") {
            "http"
        } else {
            "https"
        }
    }

    /// Registry authority only (host and port)
    pub fn authority(&self) -> &str {
        let host = self.host();
        host.split('/').next().unwrap_or(host)
    }
}
