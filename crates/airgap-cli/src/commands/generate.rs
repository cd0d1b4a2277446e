//! Generate command - mirror a release into a registry or a directory

use airgap_core::{
    AirgapConfig, ArtifactError, Credentials, Destination, ErrorKind, RegistryTarget,
    ReleaseManifest, ReleaseMode, ReleaseVersion,
};
use airgap_registry::{
    ChartFactory, DistributionFactory, ImageFactory, RegistryClient, ReleaseSource,
};
use airgap_sync::{Collaborators, SyncManager};
use clap::Args;
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::display::{self, ConsoleReporter};
use crate::error::{CliError, Result};

const USERNAME_VAR: &str = "AIRGAP_REGISTRY_USERNAME";
const PASSWORD_VAR: &str = "AIRGAP_REGISTRY_PASSWORD";

#[derive(Args, Debug, Clone, Default)]
pub struct GenerateArgs {
    /// Edge release version (X.Y.Z); the manifest is pulled from the release channel
    #[arg(short = 'v', long, conflicts_with = "manifest")]
    pub release_version: Option<String>,

    /// Release channel: 'factory' or 'production' [default: factory]
    #[arg(short = 'm', long)]
    pub release_mode: Option<String>,

    /// Local airgap manifest instead of a published release
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Registry to pre-load
    #[arg(short = 'r', long, env = "AIRGAP_REGISTRY_URL")]
    pub registry_url: Option<String>,

    /// Auth file holding base64 `username:password`
    #[arg(short = 'a', long, env = "AIRGAP_REGISTRY_AUTHFILE")]
    pub registry_authfile: Option<PathBuf>,

    /// CA certificate for the registry
    #[arg(short = 'c', long, env = "AIRGAP_REGISTRY_CACERT")]
    pub registry_cacert: Option<PathBuf>,

    /// Skip TLS verification of the registry
    #[arg(short = 'k', long)]
    pub insecure: bool,

    /// Output directory for downloaded artifacts
    #[arg(short = 'o', long, env = "AIRGAP_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Print what would be done without downloading or uploading anything
    #[arg(short = 'd', long)]
    pub dry_run: bool,

    /// Configuration file [default: ~/.config/airgap/config.yaml]
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Where the release manifest comes from
#[derive(Debug, Clone, PartialEq, Eq)]
enum ManifestSource {
    File(PathBuf),
    Release {
        mode: ReleaseMode,
        version: ReleaseVersion,
    },
}

/// Flags merged over the configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
    source: ManifestSource,
    destination: Destination,
    staging_dir: PathBuf,
}

impl Settings {
    fn resolve(args: &GenerateArgs, config: &AirgapConfig) -> Result<Self> {
        let mode = match &args.release_mode {
            Some(mode) => mode.parse::<ReleaseMode>()?,
            None => config.release_mode.unwrap_or_default(),
        };

        let source = match (&args.manifest, &args.release_version) {
            (Some(path), _) => ManifestSource::File(path.clone()),
            (None, Some(version)) => ManifestSource::Release {
                mode,
                version: version.parse()?,
            },
            (None, None) => {
                return Err(CliError::usage_with_help(
                    "No release to mirror",
                    "pass --release-version X.Y.Z or --manifest <file>",
                ));
            }
        };

        let output = args.output.clone().or_else(|| config.output.clone());
        let registry_url = args
            .registry_url
            .clone()
            .or_else(|| config.registry.url.clone());

        let destination = match (registry_url, &output) {
            (Some(url), _) => Destination::Registry(registry_target(url, args, config)),
            (None, Some(dir)) => Destination::LocalDirectory(dir.clone()),
            (None, None) => {
                return Err(CliError::usage_with_help(
                    "No destination",
                    "pass --registry-url to pre-load a registry or --output to write to a directory",
                ));
            }
        };

        let staging_dir = output.unwrap_or_else(|| std::env::temp_dir().join("airgap"));

        Ok(Self {
            source,
            destination,
            staging_dir,
        })
    }
}

fn registry_target(url: String, args: &GenerateArgs, config: &AirgapConfig) -> RegistryTarget {
    let auth_file = args
        .registry_authfile
        .clone()
        .or_else(|| config.registry.auth_file.clone());
    let credentials = match auth_file {
        Some(path) => Credentials::auth_file(path),
        None if std::env::var_os(USERNAME_VAR).is_some() => {
            Credentials::from_env(USERNAME_VAR, PASSWORD_VAR)
        }
        None => Credentials::DockerConfig { path: None },
    };

    let mut target = RegistryTarget::new(url)
        .with_credentials(credentials)
        .insecure(args.insecure || config.registry.insecure);
    if let Some(ca_cert) = args
        .registry_cacert
        .clone()
        .or_else(|| config.registry.ca_cert.clone())
    {
        target = target.with_ca_cert(ca_cert);
    }
    target
}

fn load_config(path: Option<&Path>) -> Result<AirgapConfig> {
    let loaded = match path {
        Some(path) => AirgapConfig::load_from(path),
        None => AirgapConfig::load(),
    };
    loaded.map_err(|e| {
        CliError::usage_with_help(
            format!("Could not load configuration: {}", e),
            "check the file passed to --config",
        )
    })
}

async fn load_manifest(source: &ManifestSource) -> Result<ReleaseManifest> {
    match source {
        ManifestSource::File(path) => Ok(ReleaseManifest::load(path)?),
        ManifestSource::Release { mode, version } => {
            println!("Fetching {} release manifest {}", mode, style(version).bold());
            ReleaseSource::new()
                .fetch(*mode, version)
                .await
                .map_err(|e| fetch_error(e, &mode.manifest_image(version)))
        }
    }
}

fn fetch_error(err: ArtifactError, image: &str) -> CliError {
    match err.kind() {
        ErrorKind::Auth | ErrorKind::Tls => CliError::Auth {
            message: err.to_string(),
        },
        _ => CliError::Manifest {
            message: err.to_string(),
            help: Some(format!("release manifest image: {}", image)),
        },
    }
}

/// Mirror the release described by `args`
pub async fn run(args: GenerateArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let settings = Settings::resolve(&args, &config)?;
    let manifest = load_manifest(&settings.source).await?;

    tracing::debug!(staging = %settings.staging_dir.display(), "resolved settings");

    let collaborators = Collaborators {
        distribution: Arc::new(DistributionFactory::new(settings.staging_dir.clone())),
        charts: Arc::new(ChartFactory::new(settings.staging_dir.clone())),
        images: Arc::new(ImageFactory::new(settings.staging_dir.clone())),
        authenticator: Arc::new(RegistryClient::new()),
        reporter: Arc::new(ConsoleReporter::default()),
    };

    if !args.dry_run {
        println!(
            "Mirroring RKE2 {}, {} chart(s) and {} image(s) to {}",
            manifest.distribution_version,
            manifest.charts.len(),
            manifest.images.len(),
            style(&settings.destination).cyan()
        );
    }

    let report = SyncManager::new(collaborators)
        .run(&manifest, &settings.destination, args.dry_run)
        .await?;

    if report.dry_run {
        display::print_plan(&report);
    } else {
        display::print_summary(&report);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use airgap_core::RegistrySettings;
    use crate::exit_codes;

    fn args() -> GenerateArgs {
        GenerateArgs {
            release_version: Some("3.4.0".to_string()),
            output: Some(PathBuf::from("/srv/airgap")),
            ..Default::default()
        }
    }

    #[test]
    fn test_local_destination_from_output() {
        let settings = Settings::resolve(&args(), &AirgapConfig::default()).unwrap();
        assert_eq!(
            settings.destination,
            Destination::LocalDirectory(PathBuf::from("/srv/airgap"))
        );
        assert_eq!(settings.staging_dir, PathBuf::from("/srv/airgap"));
        assert_eq!(
            settings.source,
            ManifestSource::Release {
                mode: ReleaseMode::Factory,
                version: "3.4.0".parse().unwrap(),
            }
        );
    }

    #[test]
    fn test_registry_destination_with_flags_over_config() {
        let config = AirgapConfig {
            registry: RegistrySettings {
                url: Some("config.local".to_string()),
                auth_file: Some(PathBuf::from("/etc/airgap/auth")),
                ca_cert: Some(PathBuf::from("/etc/airgap/ca.pem")),
                insecure: false,
            },
            output: None,
            release_mode: Some(ReleaseMode::Production),
        };
        let args = GenerateArgs {
            registry_url: Some("flag.local:5000".to_string()),
            insecure: true,
            release_mode: Some("factory".to_string()),
            ..args()
        };

        let settings = Settings::resolve(&args, &config).unwrap();
        let target = settings.destination.registry().unwrap();
        assert_eq!(target.url, "flag.local:5000");
        assert!(target.insecure);
        assert_eq!(target.ca_cert, Some(PathBuf::from("/etc/airgap/ca.pem")));
        assert_eq!(
            target.credentials,
            Credentials::auth_file("/etc/airgap/auth")
        );
        assert!(matches!(
            settings.source,
            ManifestSource::Release {
                mode: ReleaseMode::Factory,
                ..
            }
        ));
    }

    #[test]
    fn test_config_release_mode_used_without_flag() {
        let config = AirgapConfig {
            release_mode: Some(ReleaseMode::Production),
            ..Default::default()
        };
        let settings = Settings::resolve(&args(), &config).unwrap();
        assert!(matches!(
            settings.source,
            ManifestSource::Release {
                mode: ReleaseMode::Production,
                ..
            }
        ));
    }

    #[test]
    fn test_manifest_file_source() {
        let args = GenerateArgs {
            release_version: None,
            manifest: Some(PathBuf::from("airgap.yaml")),
            ..args()
        };
        let settings = Settings::resolve(&args, &AirgapConfig::default()).unwrap();
        assert_eq!(
            settings.source,
            ManifestSource::File(PathBuf::from("airgap.yaml"))
        );
    }

    #[test]
    fn test_usage_errors() {
        let bad_mode = GenerateArgs {
            release_mode: Some("staging".to_string()),
            ..args()
        };
        let err = Settings::resolve(&bad_mode, &AirgapConfig::default()).unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::USAGE_ERROR);

        let bad_version = GenerateArgs {
            release_version: Some("3.4".to_string()),
            ..args()
        };
        let err = Settings::resolve(&bad_version, &AirgapConfig::default()).unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::USAGE_ERROR);

        let no_release = GenerateArgs {
            release_version: None,
            ..args()
        };
        assert!(Settings::resolve(&no_release, &AirgapConfig::default()).is_err());

        let no_destination = GenerateArgs {
            output: None,
            ..args()
        };
        let err = Settings::resolve(&no_destination, &AirgapConfig::default()).unwrap_err();
        assert!(err.to_string().contains("No destination"));
    }

    #[test]
    fn test_auth_errors_while_fetching_release() {
        let err = fetch_error(ArtifactError::auth("denied"), "registry.suse.com/edge");
        assert_eq!(err.exit_code(), exit_codes::AUTH_ERROR);

        let err = fetch_error(ArtifactError::not_found("release_manifest.yaml"), "img");
        assert_eq!(err.exit_code(), exit_codes::MANIFEST_ERROR);
    }
}
