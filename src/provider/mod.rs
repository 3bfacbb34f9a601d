//! # Provider Modules
//!
//! Traits for the secret stores the replicator talks to, plus the plain data
//! types that cross them.
//!
//! - `SourceSecretStore` for the management account (discovery, policy, reads)
//! - `TargetConnector` for assuming an identity in a target account
//! - `TargetSecretStore` for secret CRUD inside one target account and region

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Key/value tag attached to a secret
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A source secret returned by discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredSecret {
    /// ARN (or any id the source store accepts)
    pub resource_id: String,
    pub tags: Vec<Tag>,
}

/// Lifecycle state of the source secret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Live,
    PendingDeletion {
        /// When the secret is scheduled to be removed
        deletion_date: Option<DateTime<Utc>>,
        /// When the deletion was requested
        deleted_at: Option<DateTime<Utc>>,
    },
}

/// Description of the source secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSecret {
    pub name: String,
    pub arn: String,
    pub state: SourceState,
}

/// Description of a secret inside a target account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSecret {
    pub name: String,
    pub arn: String,
    pub pending_deletion: bool,
    /// Value of the ownership tag, if any
    pub owner: Option<String>,
}

impl TargetSecret {
    /// Only secrets carrying this management account's ownership tag may be retired
    #[must_use]
    pub fn is_owned_by(&self, management_account_id: &str) -> bool {
        self.owner.as_deref() == Some(management_account_id)
    }
}

/// Account plus optional region; `None` means the ambient default region
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TargetLocation {
    pub account_id: String,
    pub region: Option<String>,
}

impl TargetLocation {
    pub fn new(account_id: impl Into<String>, region: Option<String>) -> Self {
        Self {
            account_id: account_id.into(),
            region,
        }
    }
}

impl fmt::Display for TargetLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.account_id,
            self.region.as_deref().unwrap_or("default")
        )
    }
}

/// The management account's secret store
#[async_trait]
pub trait SourceSecretStore: Send + Sync {
    /// Every secret carrying at least one of `tag_keys`
    async fn discover_tagged_secrets(&self, tag_keys: &[&str]) -> Result<Vec<DiscoveredSecret>>;

    /// Raw policy document text, or `None` if it does not exist
    async fn load_policy_document(&self, id: &str) -> Result<Option<String>>;

    async fn describe_secret(&self, resource_id: &str) -> Result<SourceSecret>;

    async fn get_secret_value(&self, resource_id: &str) -> Result<Zeroizing<String>>;
}

/// Assumes an identity in a target account
#[async_trait]
pub trait TargetConnector: Send + Sync {
    async fn connect(&self, location: &TargetLocation) -> Result<Arc<dyn TargetSecretStore>>;
}

/// Secret CRUD inside one target account and region
#[async_trait]
pub trait TargetSecretStore: Send + Sync {
    /// Describe a secret by name; `None` if it does not exist
    async fn describe_secret(&self, name: &str) -> Result<Option<TargetSecret>>;

    /// Current value of a secret; `None` if it does not exist
    async fn get_secret_value(&self, name: &str) -> Result<Option<Zeroizing<String>>>;

    /// Create a secret with its value and tags in one call
    async fn create_secret(&self, name: &str, value: &str, tags: &[Tag]) -> Result<()>;

    /// Overwrite the value of an existing secret
    async fn put_secret_value(&self, name: &str, value: &str) -> Result<()>;

    /// Add or overwrite a tag on a secret
    async fn tag_secret(&self, arn: &str, tag: &Tag) -> Result<()>;

    /// Schedule deletion with a recovery window (7 to 30 days)
    async fn soft_delete_secret(&self, name: &str, recovery_window_days: i64) -> Result<()>;

    /// Cancel a scheduled deletion
    async fn restore_secret(&self, name: &str) -> Result<()>;

    /// Delete immediately, without recovery
    async fn hard_delete_secret(&self, name: &str) -> Result<()>;

    /// Secrets (not pending deletion) tagged as owned by `owner`
    async fn list_owned_secrets(&self, owner_tag_key: &str, owner: &str)
        -> Result<Vec<TargetSecret>>;
}

// Provider implementations
pub mod aws;
