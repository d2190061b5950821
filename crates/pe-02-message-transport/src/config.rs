//! Transport configuration

use pe_01_message_envelope::DEFAULT_LANG;
use std::fmt;
use std::time::Duration;

/// Retryable ledger tasks get this many attempts unless configured.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 10;

/// Pause between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Message transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Dry-run session id. When set, nothing reaches the real ledger or
    /// blob store and messages are kept in the virtual store.
    pub dry_run: Option<String>,
    /// Store off-ledger documents before submitting.
    pub send_to_ipfs: bool,
    /// Attempts per retryable ledger task.
    pub retry_attempts: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Language tag stamped on outgoing messages.
    pub lang: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            dry_run: None,
            send_to_ipfs: true,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            lang: DEFAULT_LANG.to_string(),
        }
    }
}

impl TransportConfig {
    /// Configuration for a dry-run session.
    pub fn dry_run(session: impl Into<String>) -> Self {
        Self {
            dry_run: Some(session.into()),
            ..Self::default()
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run.is_some()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_attempts == 0 {
            return Err(ConfigError::InvalidRetryAttempts);
        }
        if matches!(&self.dry_run, Some(session) if session.is_empty()) {
            return Err(ConfigError::EmptyDryRunSession);
        }
        Ok(())
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidRetryAttempts,
    EmptyDryRunSession,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRetryAttempts => write!(f, "retry_attempts must be at least 1"),
            Self::EmptyDryRunSession => write!(f, "dry_run session id must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.retry_attempts, 10);
        assert!(config.send_to_ipfs);
        assert!(!config.is_dry_run());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let config = TransportConfig {
            retry_attempts: 0,
            ..TransportConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidRetryAttempts));
        assert_eq!(
            TransportConfig::dry_run("").validate(),
            Err(ConfigError::EmptyDryRunSession)
        );
    }
}
