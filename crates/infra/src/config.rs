//! Configuration loading and representation.
//!
//! Read once from the environment at startup:
//!
//! - `STOCKFLOW_SELECTION_POLICY` (default `fifo-with-expiry`)
//! - `STOCKFLOW_REFERENCE_PREFIX` (default `TRF`)

use thiserror::Error;

use stockflow_inventory::SelectionPolicy;

pub const SELECTION_POLICY_VAR: &str = "STOCKFLOW_SELECTION_POLICY";
pub const REFERENCE_PREFIX_VAR: &str = "STOCKFLOW_REFERENCE_PREFIX";

const DEFAULT_REFERENCE_PREFIX: &str = "TRF";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// Settings for the transfer engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    pub selection_policy: SelectionPolicy,
    /// Reference tags are `<prefix>-<uuid>`.
    pub reference_prefix: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            selection_policy: SelectionPolicy::default(),
            reference_prefix: DEFAULT_REFERENCE_PREFIX.to_string(),
        }
    }
}

impl TransferConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or blank keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = non_blank(lookup(SELECTION_POLICY_VAR)) {
            config.selection_policy = raw
                .parse::<SelectionPolicy>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: SELECTION_POLICY_VAR,
                    message: e.to_string(),
                })?;
        }

        if let Some(raw) = non_blank(lookup(REFERENCE_PREFIX_VAR)) {
            if raw.chars().any(char::is_whitespace) {
                return Err(ConfigError::InvalidValue {
                    key: REFERENCE_PREFIX_VAR,
                    message: format!("prefix cannot contain whitespace: {raw:?}"),
                });
            }
            config.reference_prefix = raw;
        }

        Ok(config)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
