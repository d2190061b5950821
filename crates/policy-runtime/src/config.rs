//! # Runtime Configuration
//!
//! Read from `PE_*` environment variables on top of the defaults below.
//!
//! | Variable               | Field              | Default     |
//! |------------------------|--------------------|-------------|
//! | `PE_POLICY_PATH`       | `policy_path`      | (required)  |
//! | `PE_DRY_RUN`           | `dry_run`          | `true`      |
//! | `PE_OPERATOR_DID`      | `operator_did`     | unset       |
//! | `PE_OPERATOR_ACCOUNT`  | `operator_account` | unset       |
//! | `PE_LOG`               | `log_filter`       | `info`      |
//! | `PE_EVENT_CAPACITY`    | `event_capacity`   | `1024`      |
//! | `PE_RETRY_ATTEMPTS`    | `retry_attempts`   | transport   |

use pe_02_message_transport::TransportConfig;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("PE_POLICY_PATH is not set")]
    MissingPolicyPath,

    #[error("{var} has an invalid value: {value}")]
    InvalidValue { var: &'static str, value: String },

    #[error("event channel capacity must be positive")]
    ZeroCapacity,

    /// Only the in-memory adapters ship with the runtime.
    #[error("live mode is not supported, set PE_DRY_RUN=true")]
    LiveModeUnsupported,

    #[error("operator account {0} is not a Hedera account id")]
    InvalidAccount(String),

    #[error("transport: {0}")]
    Transport(#[from] pe_02_message_transport::ConfigError),
}

/// Runtime parameters.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Policy JSON to run.
    pub policy_path: PathBuf,
    pub dry_run: bool,
    /// Owner used when the policy file names none.
    pub operator_did: Option<String>,
    pub operator_account: Option<String>,
    /// Fallback filter when `RUST_LOG` is not set.
    pub log_filter: String,
    /// Buffered notifications per subscriber.
    pub event_capacity: usize,
    pub transport: TransportConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            policy_path: PathBuf::new(),
            dry_run: true,
            operator_did: None,
            operator_account: None,
            log_filter: "info".to_string(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            transport: TransportConfig::default(),
        }
    }
}

fn parse<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { var, value })
}

fn parse_bool(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { var, value }),
    }
}

/// `shard.realm.num`
fn is_account_id(account: &str) -> bool {
    let parts: Vec<&str> = account.split('.').collect();
    parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}

impl RuntimeConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = lookup("PE_POLICY_PATH") {
            config.policy_path = PathBuf::from(path);
        }
        if let Some(value) = lookup("PE_DRY_RUN") {
            config.dry_run = parse_bool("PE_DRY_RUN", value)?;
        }
        config.operator_did = lookup("PE_OPERATOR_DID").filter(|v| !v.trim().is_empty());
        config.operator_account = lookup("PE_OPERATOR_ACCOUNT").filter(|v| !v.trim().is_empty());
        if let Some(filter) = lookup("PE_LOG") {
            config.log_filter = filter;
        }
        if let Some(value) = lookup("PE_EVENT_CAPACITY") {
            config.event_capacity = parse("PE_EVENT_CAPACITY", value)?;
        }
        if let Some(value) = lookup("PE_RETRY_ATTEMPTS") {
            config.transport.retry_attempts = parse("PE_RETRY_ATTEMPTS", value)?;
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.policy_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingPolicyPath);
        }
        if !self.dry_run {
            return Err(ConfigError::LiveModeUnsupported);
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if let Some(account) = &self.operator_account {
            if !is_account_id(account) {
                return Err(ConfigError::InvalidAccount(account.clone()));
            }
        }
        self.transport.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<RuntimeConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        RuntimeConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults_need_policy_path() {
        let config = load(&[]).unwrap();
        assert!(config.dry_run);
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);
        assert_eq!(config.validate(), Err(ConfigError::MissingPolicyPath));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("PE_POLICY_PATH", "policy.json"),
            ("PE_OPERATOR_DID", "did:hedera:testnet:op"),
            ("PE_OPERATOR_ACCOUNT", "0.0.1234"),
            ("PE_EVENT_CAPACITY", "64"),
            ("PE_RETRY_ATTEMPTS", "5"),
        ])
        .unwrap();
        assert_eq!(config.policy_path, PathBuf::from("policy.json"));
        assert_eq!(config.event_capacity, 64);
        assert_eq!(config.transport.retry_attempts, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            load(&[("PE_EVENT_CAPACITY", "lots")]),
            Err(ConfigError::InvalidValue { var: "PE_EVENT_CAPACITY", .. })
        ));
        let live = load(&[("PE_POLICY_PATH", "p.json"), ("PE_DRY_RUN", "false")]).unwrap();
        assert_eq!(live.validate(), Err(ConfigError::LiveModeUnsupported));
        let account = load(&[("PE_POLICY_PATH", "p.json"), ("PE_OPERATOR_ACCOUNT", "0.0.x")]).unwrap();
        assert_eq!(
            account.validate(),
            Err(ConfigError::InvalidAccount("0.0.x".into()))
        );
        let retries = load(&[("PE_POLICY_PATH", "p.json"), ("PE_RETRY_ATTEMPTS", "0")]).unwrap();
        assert!(matches!(retries.validate(), Err(ConfigError::Transport(_))));
    }
}
