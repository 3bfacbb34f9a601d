//! # Sync Configuration
//!
//! Process-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_MAX_CONCURRENT_TARGETS, DEFAULT_POLICY_SECRET_ID, DEFAULT_ROLE_NAME,
    DEFAULT_SESSION_NAME,
};
use std::path::PathBuf;

/// Process-level configuration
///
/// All settings have sensible defaults and can be overridden via environment
/// variables. CLI flags override a subset of them in `main`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Management account id written on the ownership tag.
    /// Looked up through STS when unset.
    pub management_account_id: Option<String>,
    /// Role assumed in every target account
    pub role_name: String,
    /// STS session name used for the assumed role
    pub session_name: String,
    /// Id of the policy document in the management account
    pub policy_secret_id: String,
    /// Ambient region; the SDK default chain applies when unset
    pub region: Option<String>,
    /// Targets of one secret processed concurrently
    pub max_concurrent_targets: usize,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Enable color in text format logs
    pub log_enable_color: bool,
    /// Prometheus textfile written at the end of a run
    pub metrics_file: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            management_account_id: None,
            role_name: DEFAULT_ROLE_NAME.to_string(),
            session_name: DEFAULT_SESSION_NAME.to_string(),
            policy_secret_id: DEFAULT_POLICY_SECRET_ID.to_string(),
            region: None,
            max_concurrent_targets: DEFAULT_MAX_CONCURRENT_TARGETS,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
            log_enable_color: false,
            metrics_file: None,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            management_account_id: optional("SECRET_SYNC_MANAGEMENT_ACCOUNT_ID"),
            role_name: string("SECRET_SYNC_ROLE_NAME", DEFAULT_ROLE_NAME),
            session_name: string("SECRET_SYNC_SESSION_NAME", DEFAULT_SESSION_NAME),
            policy_secret_id: string("SECRET_SYNC_POLICY_SECRET_ID", DEFAULT_POLICY_SECRET_ID),
            region: optional("SECRET_SYNC_REGION").or_else(|| optional("AWS_REGION")),
            max_concurrent_targets: lookup("SECRET_SYNC_MAX_CONCURRENT_TARGETS")
                .and_then(|v| v.parse().ok())
                .filter(|v: &usize| *v > 0)
                .unwrap_or(DEFAULT_MAX_CONCURRENT_TARGETS),
            log_level: string("LOG_LEVEL", "INFO"),
            log_format: string("LOG_FORMAT", "json"),
            log_enable_color: lookup("LOG_ENABLE_COLOR").is_some_and(|v| parse_bool(&v)),
            metrics_file: optional("SECRET_SYNC_METRICS_FILE").map(PathBuf::from),
        }
    }
}

fn parse_bool(value: &str) -> bool {
    let value = value.to_lowercase();
    value == "true" || value == "1" || value == "yes" || value == "on"
}
