//! # Errors
//!
//! Typed errors for the failure classes the replicator distinguishes.
//! Provider plumbing uses `anyhow` and is wrapped here only where the
//! orchestrator needs to branch on the cause.

use thiserror::Error;

/// Failures loading the policy document. All of them abort the run.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy document {id} not found; it is required when group-based tags are in use")]
    Missing { id: String },

    #[error("policy document {id} is not a valid policy: {source}")]
    Malformed {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to retrieve policy document {id}: {source}")]
    Unavailable {
        id: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Failures resolving the targets of a single secret
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("policy document is required when using group-based tags: {}", keys.join(", "))]
    PolicyRequired { keys: Vec<String> },
}

/// Failures that abort a whole run before any secret is processed
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("failed to discover tagged secrets: {0}")]
    Discovery(#[source] anyhow::Error),
}
