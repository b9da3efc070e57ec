//! Runtime configuration from environment variables.
//!
//! Every setting has a default suitable for running in-cluster with the
//! policy and TLS material mounted at their well-known paths.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::engine::{DEFAULT_DECISION_TIMEOUT, DEFAULT_SCAN_CONCURRENCY, EngineSettings};
use crate::exemptions::DEFAULT_POLICY_PATH;

/// Default path to webhook TLS certificate
pub const DEFAULT_TLS_CERT_PATH: &str = "/etc/admission-webhook/tls/tls.crt";
/// Default path to webhook TLS private key
pub const DEFAULT_TLS_KEY_PATH: &str = "/etc/admission-webhook/tls/tls.key";
/// Default webhook server port
pub const DEFAULT_WEBHOOK_PORT: u16 = 9443;
/// Default health server port
pub const DEFAULT_HEALTH_PORT: u16 = 8080;

const ENV_POLICY_PATH: &str = "NSGUARD_POLICY_PATH";
const ENV_TLS_CERT_PATH: &str = "NSGUARD_TLS_CERT_PATH";
const ENV_TLS_KEY_PATH: &str = "NSGUARD_TLS_KEY_PATH";
const ENV_WEBHOOK_PORT: &str = "NSGUARD_WEBHOOK_PORT";
const ENV_HEALTH_PORT: &str = "NSGUARD_HEALTH_PORT";
const ENV_DECISION_TIMEOUT_SECS: &str = "NSGUARD_DECISION_TIMEOUT_SECS";
const ENV_SCAN_CONCURRENCY: &str = "NSGUARD_SCAN_CONCURRENCY";

/// Errors raised while reading configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {var}: {message}")]
    Invalid {
        var: &'static str,
        value: String,
        message: String,
    },
}

/// Process configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub policy_path: PathBuf,
    pub tls_cert_path: PathBuf,
    pub tls_key_path: PathBuf,
    pub webhook_port: u16,
    pub health_port: u16,
    pub decision_timeout: Duration,
    pub scan_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            policy_path: PathBuf::from(DEFAULT_POLICY_PATH),
            tls_cert_path: PathBuf::from(DEFAULT_TLS_CERT_PATH),
            tls_key_path: PathBuf::from(DEFAULT_TLS_KEY_PATH),
            webhook_port: DEFAULT_WEBHOOK_PORT,
            health_port: DEFAULT_HEALTH_PORT,
            decision_timeout: DEFAULT_DECISION_TIMEOUT,
            scan_concurrency: DEFAULT_SCAN_CONCURRENCY,
        }
    }
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults for unset variables
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let scan_concurrency = match get(ENV_SCAN_CONCURRENCY) {
            Some(value) => match value.trim().parse::<usize>() {
                Ok(n) if n >= 1 => n,
                Ok(_) => return Err(invalid(ENV_SCAN_CONCURRENCY, value, "must be at least 1")),
                Err(e) => return Err(invalid(ENV_SCAN_CONCURRENCY, value, e)),
            },
            None => defaults.scan_concurrency,
        };

        let decision_timeout = match get(ENV_DECISION_TIMEOUT_SECS) {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(secs) if secs >= 1 => Duration::from_secs(secs),
                Ok(_) => {
                    return Err(invalid(ENV_DECISION_TIMEOUT_SECS, value, "must be at least 1"));
                }
                Err(e) => return Err(invalid(ENV_DECISION_TIMEOUT_SECS, value, e)),
            },
            None => defaults.decision_timeout,
        };

        Ok(Self {
            policy_path: get(ENV_POLICY_PATH)
                .map(PathBuf::from)
                .unwrap_or(defaults.policy_path),
            tls_cert_path: get(ENV_TLS_CERT_PATH)
                .map(PathBuf::from)
                .unwrap_or(defaults.tls_cert_path),
            tls_key_path: get(ENV_TLS_KEY_PATH)
                .map(PathBuf::from)
                .unwrap_or(defaults.tls_key_path),
            webhook_port: parse_port(ENV_WEBHOOK_PORT, get(ENV_WEBHOOK_PORT))?
                .unwrap_or(defaults.webhook_port),
            health_port: parse_port(ENV_HEALTH_PORT, get(ENV_HEALTH_PORT))?
                .unwrap_or(defaults.health_port),
            decision_timeout,
            scan_concurrency,
        })
    }

    /// Whether both TLS files are present
    pub fn tls_available(&self) -> bool {
        self.tls_cert_path.exists() && self.tls_key_path.exists()
    }

    /// Engine settings derived from this configuration
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            policy_path: self.policy_path.clone(),
            decision_timeout: self.decision_timeout,
            scan_concurrency: self.scan_concurrency,
        }
    }
}

fn invalid(var: &'static str, value: String, message: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        value,
        message: message.to_string(),
    }
}

fn parse_port(var: &'static str, value: Option<String>) -> Result<Option<u16>, ConfigError> {
    match value {
        Some(value) => match value.trim().parse::<u16>() {
            Ok(0) => Err(invalid(var, value, "port must be non-zero")),
            Ok(port) => Ok(Some(port)),
            Err(e) => Err(invalid(var, value, e)),
        },
        None => Ok(None),
    }
}
