pub mod certificate;
pub mod config;
pub mod correlator;
pub mod discovery;
pub mod driver;
pub mod output;
pub mod package;
pub mod supervisor;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Certificate(#[from] certificate::CertificateError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Correlator(#[from] correlator::CorrelatorError),

    #[error(transparent)]
    Discovery(#[from] discovery::DiscoveryError),

    #[error(transparent)]
    Driver(#[from] driver::DriverError),

    #[error(transparent)]
    Output(#[from] output::OutputError),

    #[error(transparent)]
    Supervisor(#[from] supervisor::SupervisorError),
}
