//! Command-line surface and top-level wiring.

use crate::error::DevbridgeError;
use crate::logger;
use crate::shell;

use session_core::certificate::{Identity, SubjectPrincipal};
use session_core::config::{SessionConfig, default_config_dir};
use session_core::error::certificate::CertificateError;
use session_core::session::SessionFacade;

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::panic::Location;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::info;

const LOG_DIR_NAME: &str = "logs";

#[derive(Debug, Parser)]
#[command(name = "devbridge", version, about = "Device bridge debugging client")]
pub struct Cli {
    /// Directory holding config.json and flags.json
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Directory for devbridge.log (default: <config dir>/logs)
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Log at trace level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Start the bridge session and read commands from stdin
    Shell,

    /// Print the certificate of a fresh self-signed pairing identity
    IssueCert {
        /// Common name of the certificate subject
        #[arg(long)]
        subject: String,

        /// Organization of the certificate subject
        #[arg(long)]
        organization: Option<String>,
    },
}

pub async fn run(cli: Cli) -> Result<(), DevbridgeError> {
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => default_config_dir()
            .map_err(|e| DevbridgeError::core("Failed to locate config directory", e))?,
    };
    let log_dir = cli.log_dir.unwrap_or_else(|| config_dir.join(LOG_DIR_NAME));

    create_dir_all(&log_dir).map_err(|e| DevbridgeError::Devbridge {
        message: format!("Failed to create log directory {}: {e}", log_dir.display()),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Initialize logger FIRST
    logger::initialize(&log_dir, cli.verbose)?;

    info!("devbridge starting");
    info!("Config directory: {}", config_dir.display());
    info!("Log directory: {}", log_dir.display());

    match cli.command {
        Command::IssueCert {
            subject,
            organization,
        } => {
            let mut principal = SubjectPrincipal::new(subject);
            if let Some(organization) = organization {
                principal = principal.with_organization(organization);
            }
            let pem = issue_certificate(principal).await?;
            print!("{pem}");
            Ok(())
        }
        Command::Shell => {
            let config = SessionConfig::load(&config_dir)
                .map_err(|e| DevbridgeError::core("Failed to load config", e))?;
            let facade = SessionFacade::with_process_driver(&config, &config_dir)
                .map_err(|e| DevbridgeError::core("Failed to set up session", e))?;
            shell::run(Arc::new(facade)).await
        }
    }
}

/// PEM of a certificate for a freshly generated identity.
///
/// Key generation runs off the async runtime's worker threads.
pub async fn issue_certificate(subject: SubjectPrincipal) -> Result<String, DevbridgeError> {
    let identity = tokio::task::spawn_blocking(move || Identity::generate(&subject))
        .await
        .map_err(|e| {
            DevbridgeError::core(
                "Identity generation task failed",
                CertificateError::CryptoFailure {
                    message: e.to_string(),
                    location: ErrorLocation::from(Location::caller()),
                    source: Some(Box::new(e)),
                },
            )
        })?
        .map_err(|e| DevbridgeError::core("Failed to issue certificate", e))?;

    info!(
        "Issued certificate for CN={}",
        identity.certificate.subject.common_name
    );
    Ok(identity.certificate.pem.clone())
}
