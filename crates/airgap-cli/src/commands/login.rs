//! Login command - check registry credentials before a run

use airgap_core::{ArtifactError, Authenticator, Credentials, ErrorKind, RegistryTarget};
use airgap_registry::RegistryClient;
use clap::Args;
use console::style;
use std::path::PathBuf;

use crate::error::{CliError, Result};

#[derive(Args, Debug, Clone, Default)]
pub struct LoginArgs {
    /// Registry URL
    #[arg(short = 'r', long)]
    pub url: String,

    /// Registry username
    #[arg(short = 'u', long)]
    pub user: Option<String>,

    /// Registry password
    #[arg(
        short = 'p',
        long,
        env = "AIRGAP_REGISTRY_PASSWORD",
        hide_env_values = true
    )]
    pub password: Option<String>,

    /// Registry CA certificate file
    #[arg(short = 'c', long)]
    pub cacert: Option<PathBuf>,

    /// Skip TLS verification
    #[arg(short = 'k', long)]
    pub insecure: bool,
}

fn target(args: &LoginArgs) -> Result<RegistryTarget> {
    let credentials = match (&args.user, &args.password) {
        (Some(user), Some(password)) => Credentials::basic(user, password),
        (Some(_), None) => {
            return Err(CliError::usage(
                "password is required when username is provided",
            ));
        }
        (None, _) => Credentials::Anonymous,
    };

    let mut target = RegistryTarget::new(&args.url)
        .with_credentials(credentials)
        .insecure(args.insecure);
    if let Some(cacert) = &args.cacert {
        target = target.with_ca_cert(cacert.clone());
    }
    Ok(target)
}

fn login_error(err: ArtifactError) -> CliError {
    match err.kind() {
        ErrorKind::Auth | ErrorKind::Tls => CliError::Auth {
            message: err.to_string(),
        },
        ErrorKind::Io => CliError::Io {
            message: err.to_string(),
        },
        _ => CliError::Sync {
            message: err.to_string(),
        },
    }
}

/// Perform the registry handshake once
pub async fn run(args: LoginArgs) -> Result<()> {
    let target = target(&args)?;
    RegistryClient::new()
        .login(&target)
        .await
        .map_err(login_error)?;

    println!(
        "{} Logged in to {}",
        style("✓").green().bold(),
        target.authority()
    );
    Ok(())
}
