//! # Orphan Cleanup
//!
//! After every secret of a run has been propagated, each target location with
//! deletion sync enabled is scanned for secrets this management account owns
//! but did not declare this run. Those orphans are retired under the current
//! retire policy.
//!
//! Ownership is checked again on every candidate right before it is retired;
//! a secret without the ownership tag, or owned by another management
//! account, is never touched.

use crate::constants::TAG_MANAGED_BY;
use crate::controller::orchestrator::Replicator;
use crate::controller::propagation::{retire_secret, RetirePolicy, TargetOutcome};
use crate::controller::report::RunReport;
use crate::observability::metrics;
use crate::provider::{TargetLocation, TargetSecretStore};
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, info, info_span, warn, Instrument};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ManagedLocation {
    /// Last deletion-sync flag observed for this location
    delete_sync: bool,
    /// Cleanup is suppressed because a secret targeting it failed early
    held: bool,
    names: BTreeSet<String>,
}

/// Secret names declared managed this run, per target location
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedSecrets {
    locations: BTreeMap<TargetLocation, ManagedLocation>,
}

impl ManagedSecrets {
    /// Declare `name` managed in `location`; the flag of the latest call wins
    pub fn record(&mut self, location: TargetLocation, delete_sync: bool, name: &str) {
        let entry = self.locations.entry(location).or_default();
        entry.delete_sync = delete_sync;
        entry.names.insert(name.to_string());
    }

    /// Suppress cleanup for `location` for the rest of this run
    pub fn hold(&mut self, location: TargetLocation) {
        self.locations.entry(location).or_default().held = true;
    }

    #[must_use]
    pub fn contains(&self, location: &TargetLocation, name: &str) -> bool {
        self.locations
            .get(location)
            .is_some_and(|entry| entry.names.contains(name))
    }

    /// Names declared managed anywhere in `account_id`, across all regions
    fn account_names(&self, account_id: &str) -> BTreeSet<String> {
        self.locations
            .iter()
            .filter(|(location, _)| location.account_id == account_id)
            .flat_map(|(_, entry)| entry.names.iter().cloned())
            .collect()
    }

    fn account_held(&self, account_id: &str) -> bool {
        self.locations
            .iter()
            .any(|(location, entry)| location.account_id == account_id && entry.held)
    }

    /// Locations eligible for cleanup, each with the managed names of its account
    ///
    /// A location without a region and one naming the ambient region can be
    /// the same store, so names are unioned per account.
    #[must_use]
    pub fn cleanup_candidates(&self) -> Vec<(TargetLocation, BTreeSet<String>)> {
        self.locations
            .iter()
            .filter(|(_, entry)| entry.delete_sync)
            .filter_map(|(location, _)| {
                if self.account_held(&location.account_id) {
                    warn!(
                        location = %location,
                        "Skipping orphan cleanup in {}: a secret targeting account {} could not be read",
                        location,
                        location.account_id
                    );
                    return None;
                }
                Some((location.clone(), self.account_names(&location.account_id)))
            })
            .collect()
    }
}

/// Result of cleaning one location
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    pub retired: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Retire every owned secret in `store` whose name is not in `managed`
///
/// # Errors
///
/// Returns an error only if the owned secrets cannot be listed. Failures on
/// individual secrets are logged and counted.
pub async fn cleanup_location(
    store: &dyn TargetSecretStore,
    managed: &BTreeSet<String>,
    policy: RetirePolicy,
    management_account_id: &str,
) -> Result<CleanupSummary> {
    let owned = store
        .list_owned_secrets(TAG_MANAGED_BY, management_account_id)
        .await
        .context("Failed to list owned secrets")?;

    let mut summary = CleanupSummary::default();
    for secret in owned.iter().filter(|s| !managed.contains(&s.name)) {
        match retire_secret(store, secret, policy, management_account_id).await {
            Ok(TargetOutcome::NotOwned) => summary.skipped += 1,
            Ok(outcome) => {
                info!(
                    secret_name = %secret.name,
                    operation = outcome.as_str(),
                    "Retired orphaned secret {}",
                    secret.name
                );
                summary.retired += 1;
            }
            Err(e) => {
                error!(
                    secret_name = %secret.name,
                    "Failed to retire orphaned secret {}: {:#}",
                    secret.name,
                    e
                );
                summary.failed += 1;
            }
        }
    }

    debug!(
        owned = owned.len(),
        managed = managed.len(),
        retired = summary.retired,
        "Cleanup pass finished"
    );
    Ok(summary)
}

impl Replicator {
    pub(crate) async fn cleanup_orphans(
        &self,
        managed: &ManagedSecrets,
        policy: RetirePolicy,
        report: &mut RunReport,
    ) {
        for (location, names) in managed.cleanup_candidates() {
            let span = info_span!("secret_sync.cleanup", location = %location);
            let result = async {
                let store = self.connect(&location).await?;
                cleanup_location(
                    store.as_ref(),
                    &names,
                    policy,
                    &self.settings.management_account_id,
                )
                .await
            }
            .instrument(span)
            .await;

            match result {
                Ok(summary) => {
                    report.orphans_retired += summary.retired;
                    report.cleanup_failures += summary.failed;
                    metrics::increment_orphans_retired(summary.retired);
                }
                Err(e) => {
                    error!(location = %location, "Orphan cleanup failed in {}: {:#}", location, e);
                    report.cleanup_failures += 1;
                }
            }
        }
    }
}
