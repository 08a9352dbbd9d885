//! TOML configuration loading and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tickbroker::InitRequest;
use tickbroker_client::RetryPolicy;

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub session: SessionConfig,
    pub account: AccountConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff")]
    pub backoff_ms: u64,
    #[serde(default = "default_true")]
    pub retry_submissions: bool,
}

fn default_timeout() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff() -> u64 {
    100
}
fn default_true() -> bool {
    true
}

/// Either a named dataset or an explicit date range.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    pub dataset: Option<String>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub frequency: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub initial_cash: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Stop after this many ticks even if the session has more.
    pub max_ticks: Option<u64>,
    #[serde(default = "default_tick_retries")]
    pub max_tick_retries: u32,
}

fn default_tick_retries() -> u32 {
    1
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_ticks: None,
            max_tick_retries: default_tick_retries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_audit_file")]
    pub audit_file: String,
}

fn default_log_dir() -> String {
    "./logs".into()
}
fn default_audit_file() -> String {
    "audit.jsonl".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            audit_file: default_audit_file(),
        }
    }
}

impl SessionConfig {
    /// The session request this config describes.
    pub fn request(&self) -> Result<InitRequest> {
        match (self.dataset.as_ref(), self.start_date, self.end_date, self.frequency) {
            (Some(dataset), None, None, None) => Ok(InitRequest::Dataset {
                dataset: dataset.clone(),
            }),
            (None, Some(start_date), Some(end_date), Some(frequency)) => Ok(InitRequest::Range {
                start_date,
                end_date,
                frequency,
            }),
            (Some(_), ..) => Err(Error::Config(
                "session takes either a dataset or a date range, not both".into(),
            )),
            _ => Err(Error::Config(
                "session needs a dataset or start_date, end_date and frequency".into(),
            )),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse from a TOML string (useful for testing).
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    fn validate(&self) -> Result<()> {
        if self.service.url.is_empty() {
            return Err(Error::Config("service url must not be empty".into()));
        }
        if self.service.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be > 0".into()));
        }
        if self.service.max_attempts == 0 {
            return Err(Error::Config("max_attempts must be >= 1".into()));
        }
        if !self.account.initial_cash.is_finite() || self.account.initial_cash < 0.0 {
            return Err(Error::Config("initial_cash must be >= 0".into()));
        }
        let request = self.session.request()?;
        if let InitRequest::Range {
            start_date,
            end_date,
            frequency,
        } = request
        {
            if end_date < start_date {
                return Err(Error::Config("end_date must not precede start_date".into()));
            }
            if frequency == 0 {
                return Err(Error::Config("frequency must be > 0".into()));
            }
        }
        if self.run.max_ticks == Some(0) {
            return Err(Error::Config("max_ticks must be > 0 when set".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.service.timeout_secs)
    }

    /// Retry policy for the HTTP client.
    pub fn retry_policy(&self) -> RetryPolicy {
        let initial = Duration::from_millis(self.service.backoff_ms);
        RetryPolicy::default()
            .with_max_attempts(self.service.max_attempts)
            .with_backoff(initial, initial.max(RetryPolicy::default().max_backoff))
            .with_retry_submissions(self.service.retry_submissions)
    }

    /// Full path to the audit log file.
    pub fn audit_path(&self) -> PathBuf {
        Path::new(&self.logging.dir).join(&self.logging.audit_file)
    }
}
