//! Purchasing configuration, read from environment variables.

use thiserror::Error;

pub const INVOICE_PREFIX_VAR: &str = "STOCKWISE_INVOICE_PREFIX";
pub const MAX_RECEIVE_BATCH_VAR: &str = "STOCKWISE_MAX_RECEIVE_BATCH";

const DEFAULT_INVOICE_PREFIX: &str = "PO";
const DEFAULT_MAX_RECEIVE_BATCH: usize = 500;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchasingConfig {
    /// Leading segment of allocated invoice numbers (`PO-20260101-0001`).
    pub invoice_prefix: String,
    /// Upper bound on records in a single receive request.
    pub max_receive_batch: usize,
}

impl Default for PurchasingConfig {
    fn default() -> Self {
        Self {
            invoice_prefix: DEFAULT_INVOICE_PREFIX.to_string(),
            max_receive_batch: DEFAULT_MAX_RECEIVE_BATCH,
        }
    }
}

impl PurchasingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source; unset keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(INVOICE_PREFIX_VAR) {
            let prefix = raw.trim();
            if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ConfigError::Invalid {
                    key: INVOICE_PREFIX_VAR,
                    value: raw,
                    reason: "expected a non-empty alphanumeric prefix",
                });
            }
            config.invoice_prefix = prefix.to_string();
        }

        if let Some(raw) = lookup(MAX_RECEIVE_BATCH_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n >= 1 => config.max_receive_batch = n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: MAX_RECEIVE_BATCH_VAR,
                        value: raw,
                        reason: "expected a positive integer",
                    });
                }
            }
        }

        Ok(config)
    }
}
