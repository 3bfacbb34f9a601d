//! # Propagation
//!
//! Single-target actions: copy a live value into a target, mirror a pending
//! deletion, or retire a secret the management account owns.
//!
//! Every function here works against one `TargetSecretStore` and is
//! idempotent; running it twice leaves the target in the same state.

use crate::constants::TAG_MANAGED_BY;
use crate::controller::recovery::RecoveryWindow;
use crate::provider::{Tag, TargetSecret, TargetSecretStore};
use anyhow::{Context, Result};
use tracing::{debug, info, warn};

/// What happened to one secret in one target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOutcome {
    Created,
    Updated,
    /// Value already matched; only the ownership tag may have been touched
    Unchanged,
    /// Scheduled deletion was cancelled and the value written
    Restored,
    /// Target is pending deletion and deletion sync is off for it
    SkippedPendingDeletion,
    /// Source is pending deletion and deletion sync is off for this target
    SkippedDeleteSyncDisabled,
    SoftDeleted(RecoveryWindow),
    HardDeleted,
    AlreadyAbsent,
    AlreadyPendingDeletion,
    /// Target secret is missing the ownership tag or belongs to another account
    NotOwned,
}

impl TargetOutcome {
    /// Stable label for logs and metrics
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetOutcome::Created => "create",
            TargetOutcome::Updated => "update",
            TargetOutcome::Unchanged => "no_change",
            TargetOutcome::Restored => "restore",
            TargetOutcome::SkippedPendingDeletion => "skip_pending_deletion",
            TargetOutcome::SkippedDeleteSyncDisabled => "skip_delete_sync_disabled",
            TargetOutcome::SoftDeleted(_) => "soft_delete",
            TargetOutcome::HardDeleted => "hard_delete",
            TargetOutcome::AlreadyAbsent => "absent",
            TargetOutcome::AlreadyPendingDeletion => "already_pending_deletion",
            TargetOutcome::NotOwned => "not_owned",
        }
    }
}

/// How an owned secret is retired by cleanup or an explicit delete tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetirePolicy {
    SoftDelete(RecoveryWindow),
    HardDelete,
}

impl RetirePolicy {
    /// `NeverDelete` turns every retirement into a minimum-window soft delete
    #[must_use]
    pub fn from_never_delete(never_delete: bool) -> Self {
        if never_delete {
            RetirePolicy::SoftDelete(RecoveryWindow::MIN)
        } else {
            RetirePolicy::HardDelete
        }
    }
}

fn ownership_tag(management_account_id: &str) -> Tag {
    Tag::new(TAG_MANAGED_BY, management_account_id)
}

/// Create or update `name` in the target with `value`
///
/// A target secret that is pending deletion is only restored when deletion
/// sync is enabled for the target; otherwise it is left alone.
///
/// # Errors
///
/// Returns an error if any target call fails.
pub async fn propagate_value(
    store: &dyn TargetSecretStore,
    name: &str,
    value: &str,
    delete_sync: bool,
    management_account_id: &str,
) -> Result<TargetOutcome> {
    let owner_tag = ownership_tag(management_account_id);

    let Some(existing) = store
        .describe_secret(name)
        .await
        .with_context(|| format!("Failed to describe target secret {name}"))?
    else {
        store
            .create_secret(name, value, std::slice::from_ref(&owner_tag))
            .await
            .with_context(|| format!("Failed to create target secret {name}"))?;
        info!(secret_name = name, operation = "create", "Created secret {}", name);
        return Ok(TargetOutcome::Created);
    };

    let mut restored = false;
    if existing.pending_deletion {
        if !delete_sync {
            warn!(
                secret_name = name,
                "Target secret {} is pending deletion and deletion sync is disabled, not restoring",
                name
            );
            return Ok(TargetOutcome::SkippedPendingDeletion);
        }
        store
            .restore_secret(name)
            .await
            .with_context(|| format!("Failed to restore target secret {name}"))?;
        info!(secret_name = name, operation = "restore", "Restored secret {}", name);
        restored = true;
    }

    if let Some(owner) = existing.owner.as_deref() {
        if owner != management_account_id {
            warn!(
                secret_name = name,
                current_owner = owner,
                "Target secret {} is owned by another management account, taking ownership",
                name
            );
        }
    }

    // An unreadable replica is overwritten rather than left stale
    let unchanged = match store.get_secret_value(name).await {
        Ok(current) => current.as_deref().is_some_and(|current| current == value),
        Err(e) => {
            warn!(
                secret_name = name,
                "Could not read target secret {}, writing it anyway: {:#}",
                name,
                e
            );
            false
        }
    };

    if unchanged {
        debug!(secret_name = name, operation = "no_change", "Secret {} unchanged", name);
    } else {
        store
            .put_secret_value(name, value)
            .await
            .with_context(|| format!("Failed to update target secret {name}"))?;
        info!(secret_name = name, operation = "update", "Updated secret {}", name);
    }

    if !existing.is_owned_by(management_account_id) {
        store
            .tag_secret(&existing.arn, &owner_tag)
            .await
            .with_context(|| format!("Failed to tag target secret {name}"))?;
    }

    Ok(match (restored, unchanged) {
        (true, _) => TargetOutcome::Restored,
        (false, true) => TargetOutcome::Unchanged,
        (false, false) => TargetOutcome::Updated,
    })
}

/// Mirror a pending source deletion into the target
///
/// # Errors
///
/// Returns an error if any target call fails.
pub async fn propagate_deletion(
    store: &dyn TargetSecretStore,
    name: &str,
    window: RecoveryWindow,
    management_account_id: &str,
) -> Result<TargetOutcome> {
    let Some(existing) = store
        .describe_secret(name)
        .await
        .with_context(|| format!("Failed to describe target secret {name}"))?
    else {
        debug!(secret_name = name, "Target secret {} does not exist, nothing to delete", name);
        return Ok(TargetOutcome::AlreadyAbsent);
    };

    if existing.pending_deletion {
        return Ok(TargetOutcome::AlreadyPendingDeletion);
    }

    retire_secret(
        store,
        &existing,
        RetirePolicy::SoftDelete(window),
        management_account_id,
    )
    .await
}

/// Remove `name` from the target because of an explicit delete tag
///
/// # Errors
///
/// Returns an error if any target call fails.
pub async fn remove_secret(
    store: &dyn TargetSecretStore,
    name: &str,
    policy: RetirePolicy,
    management_account_id: &str,
) -> Result<TargetOutcome> {
    match store
        .describe_secret(name)
        .await
        .with_context(|| format!("Failed to describe target secret {name}"))?
    {
        None => Ok(TargetOutcome::AlreadyAbsent),
        Some(existing) if existing.pending_deletion => Ok(TargetOutcome::AlreadyPendingDeletion),
        Some(existing) => retire_secret(store, &existing, policy, management_account_id).await,
    }
}

/// Retire a secret, but only if this management account owns it
///
/// # Errors
///
/// Returns an error if the delete call fails.
pub async fn retire_secret(
    store: &dyn TargetSecretStore,
    secret: &TargetSecret,
    policy: RetirePolicy,
    management_account_id: &str,
) -> Result<TargetOutcome> {
    if !secret.is_owned_by(management_account_id) {
        warn!(
            secret_name = %secret.name,
            owner = secret.owner.as_deref().unwrap_or("<none>"),
            "Refusing to delete {}: not owned by this management account",
            secret.name
        );
        return Ok(TargetOutcome::NotOwned);
    }

    match policy {
        RetirePolicy::SoftDelete(window) => {
            store
                .soft_delete_secret(&secret.name, window.days())
                .await
                .with_context(|| format!("Failed to schedule deletion of {}", secret.name))?;
            info!(
                secret_name = %secret.name,
                operation = "soft_delete",
                recovery_window_days = window.days(),
                "Scheduled deletion of {} with a {} recovery window",
                secret.name,
                window
            );
            Ok(TargetOutcome::SoftDeleted(window))
        }
        RetirePolicy::HardDelete => {
            store
                .hard_delete_secret(&secret.name)
                .await
                .with_context(|| format!("Failed to delete {}", secret.name))?;
            info!(
                secret_name = %secret.name,
                operation = "hard_delete",
                "Deleted {} without recovery",
                secret.name
            );
            Ok(TargetOutcome::HardDeleted)
        }
    }
}
