//! # Policy Document
//!
//! The shared configuration that maps group names to account lists and
//! carries the global deletion defaults.
//!
//! ```json
//! {
//!   "AccountGroups": {
//!     "legacy": ["111111111111", "222222222222"],
//!     "prod": { "Accounts": ["333333333333"], "Region": "eu-west-1", "DeleteSync": true }
//!   },
//!   "DeleteSync": false,
//!   "NeverDelete": false
//! }
//! ```

use crate::constants::GROUP_TAG_KEYS;
use crate::error::PolicyError;
use crate::provider::{DiscoveredSecret, SourceSecretStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Account group as stored in the policy document
///
/// The bare list is the original encoding and carries no overrides.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AccountGroup {
    Legacy(Vec<String>),
    Structured {
        #[serde(rename = "Accounts", default)]
        accounts: Vec<String>,
        #[serde(rename = "Region", default, skip_serializing_if = "Option::is_none")]
        region: Option<String>,
        #[serde(rename = "DeleteSync", default, skip_serializing_if = "Option::is_none")]
        delete_sync: Option<bool>,
    },
}

/// Uniform view of an [`AccountGroup`], whatever its encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupSpec<'a> {
    pub accounts: &'a [String],
    pub region: Option<&'a str>,
    pub delete_sync: Option<bool>,
}

impl AccountGroup {
    /// Normalize both encodings into one shape
    #[must_use]
    pub fn normalize(&self) -> GroupSpec<'_> {
        match self {
            AccountGroup::Legacy(accounts) => GroupSpec {
                accounts,
                region: None,
                delete_sync: None,
            },
            AccountGroup::Structured {
                accounts,
                region,
                delete_sync,
            } => GroupSpec {
                accounts,
                region: region.as_deref(),
                delete_sync: *delete_sync,
            },
        }
    }
}

/// Policy document, fetched once per run
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PolicyDocument {
    #[serde(rename = "AccountGroups", default)]
    pub account_groups: BTreeMap<String, AccountGroup>,
    /// Global default for deletion sync
    #[serde(rename = "DeleteSync", default)]
    pub delete_sync: bool,
    /// Never hard-delete; always retire with the minimum recovery window
    #[serde(rename = "NeverDelete", default)]
    pub never_delete: bool,
}

impl PolicyDocument {
    /// Parse a policy document from its raw JSON text
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if the text is not a policy document.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Look up a group. Unknown groups are `None`, not an error.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<GroupSpec<'_>> {
        self.account_groups.get(name).map(AccountGroup::normalize)
    }
}

/// Whether any discovered secret needs the policy document to resolve
#[must_use]
pub fn policy_required(secrets: &[DiscoveredSecret]) -> bool {
    secrets.iter().any(|secret| {
        secret
            .tags
            .iter()
            .any(|tag| GROUP_TAG_KEYS.contains(&tag.key.as_str()))
    })
}

/// Fetch and parse the policy document
///
/// A missing document is only fatal when `required` is set. A document that
/// exists but does not parse is always fatal.
///
/// # Errors
///
/// Returns [`PolicyError`] when the run must abort.
pub async fn load_policy(
    source: &dyn SourceSecretStore,
    id: &str,
    required: bool,
) -> Result<Option<PolicyDocument>, PolicyError> {
    let raw = source
        .load_policy_document(id)
        .await
        .map_err(|source| PolicyError::Unavailable {
            id: id.to_string(),
            source,
        })?;

    let Some(raw) = raw else {
        if required {
            return Err(PolicyError::Missing { id: id.to_string() });
        }
        warn!(
            policy_id = id,
            "Policy document {} not found, using individual account tags only", id
        );
        return Ok(None);
    };

    let policy = PolicyDocument::from_json(&raw).map_err(|source| PolicyError::Malformed {
        id: id.to_string(),
        source,
    })?;

    info!(
        policy_id = id,
        groups = policy.account_groups.len(),
        delete_sync = policy.delete_sync,
        never_delete = policy.never_delete,
        "Loaded policy document"
    );
    Ok(Some(policy))
}
