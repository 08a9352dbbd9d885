//! Error types for the runner.

use std::path::PathBuf;

use tickbroker::BrokerError;
use tickbroker_client::ClientError;

/// All errors that can occur during a run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("plan error: {0}")]
    Plan(String),

    #[error("failed to read plan file {path}: {source}")]
    PlanRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse plan JSON: {0}")]
    PlanParse(#[from] serde_json::Error),

    #[error("service client error: {0}")]
    Client(#[from] ClientError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("audit log error: {0}")]
    Audit(#[from] std::io::Error),
}

impl Error {
    /// True when the run stopped because a fill would have overdrawn cash.
    pub fn is_insolvency(&self) -> bool {
        matches!(self, Error::Broker(BrokerError::Insolvency { .. }))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
