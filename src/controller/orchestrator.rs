//! # Replication Orchestrator
//!
//! Drives one replication run:
//!
//! 1. Discover tagged source secrets
//! 2. Load the policy document (mandatory only if group tags are in use)
//! 3. For each secret: resolve targets, read the source, propagate to every
//!    target, honour explicit delete targets
//! 4. Retire orphans in every location with deletion sync enabled
//!
//! Failures are isolated: a bad secret never stops the run and a bad target
//! never stops its siblings. Only discovery and policy failures are fatal.

use crate::constants::RECOGNIZED_TAG_KEYS;
use crate::controller::cleanup::ManagedSecrets;
use crate::controller::propagation::{
    propagate_deletion, propagate_value, remove_secret, RetirePolicy, TargetOutcome,
};
use crate::controller::recovery::RecoveryWindow;
use crate::controller::report::RunReport;
use crate::controller::resolver::{resolve_targets, DeleteTarget, SyncTarget};
use crate::error::RunError;
use crate::observability::metrics;
use crate::policy::{load_policy, policy_required, PolicyDocument};
use crate::provider::{
    DiscoveredSecret, SourceSecretStore, SourceState, TargetConnector, TargetLocation,
    TargetSecretStore,
};
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info, info_span, warn, Instrument};
use zeroize::Zeroizing;

/// Identity and tuning injected at construction
#[derive(Debug, Clone)]
pub struct ReplicatorSettings {
    /// Value written to, and required on, the ownership tag
    pub management_account_id: String,
    pub policy_secret_id: String,
    /// Targets of one secret processed concurrently (1 = sequential)
    pub max_concurrent_targets: usize,
    /// Region used for targets that name none
    pub default_region: Option<String>,
}

/// What to do with every sync target of one secret
enum SecretAction {
    Copy(Zeroizing<String>),
    Delete(RecoveryWindow),
}

pub struct Replicator {
    pub(crate) source: Arc<dyn SourceSecretStore>,
    pub(crate) connector: Arc<dyn TargetConnector>,
    pub(crate) settings: ReplicatorSettings,
    // Assumed-role clients, reused for the rest of the run
    connections: Mutex<HashMap<TargetLocation, Arc<dyn TargetSecretStore>>>,
}

impl std::fmt::Debug for Replicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replicator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Replicator {
    pub fn new(
        source: Arc<dyn SourceSecretStore>,
        connector: Arc<dyn TargetConnector>,
        settings: ReplicatorSettings,
    ) -> Self {
        Self {
            source,
            connector,
            settings,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Run one full replication pass
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] only when nothing can be processed: discovery
    /// failed, or the policy document is required but missing or malformed.
    pub async fn run(&self) -> Result<RunReport, RunError> {
        let start = Instant::now();

        let secrets = self
            .source
            .discover_tagged_secrets(&RECOGNIZED_TAG_KEYS)
            .await
            .map_err(RunError::Discovery)?;
        info!("Found {} secrets with sync-related tags", secrets.len());

        let required = policy_required(&secrets);
        let policy = load_policy(
            self.source.as_ref(),
            &self.settings.policy_secret_id,
            required,
        )
        .await?;

        let mut report = RunReport {
            secrets_discovered: secrets.len(),
            ..RunReport::default()
        };
        let mut managed = ManagedSecrets::default();

        for secret in &secrets {
            let span = info_span!("secret_sync.secret", resource_id = %secret.resource_id);
            self.process_secret(secret, policy.as_ref(), &mut managed, &mut report)
                .instrument(span)
                .await;
        }

        let retire = RetirePolicy::from_never_delete(policy.as_ref().is_some_and(|p| p.never_delete));
        self.cleanup_orphans(&managed, retire, &mut report).await;

        metrics::observe_run_duration(start.elapsed().as_secs_f64());
        info!(
            discovered = report.secrets_discovered,
            processed = report.secrets_processed,
            skipped = report.secrets_skipped,
            failed = report.secrets_failed,
            target_failures = report.target_failures,
            orphans_retired = report.orphans_retired,
            cleanup_failures = report.cleanup_failures,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Secret sync run completed"
        );
        Ok(report)
    }

    async fn process_secret(
        &self,
        secret: &DiscoveredSecret,
        policy: Option<&PolicyDocument>,
        managed: &mut ManagedSecrets,
        report: &mut RunReport,
    ) {
        let targets = match resolve_targets(&secret.tags, policy) {
            Ok(targets) => targets,
            Err(e) => {
                error!("Could not resolve targets for {}: {}", secret.resource_id, e);
                report.secrets_failed += 1;
                metrics::increment_secrets_failed();
                return;
            }
        };

        if targets.is_empty() {
            info!(
                "Skipping secret {}: no target accounts after applying rules",
                secret.resource_id
            );
            report.secrets_skipped += 1;
            return;
        }

        let source = match self.source.describe_secret(&secret.resource_id).await {
            Ok(source) => source,
            Err(e) => {
                error!("Could not describe secret {}: {:#}", secret.resource_id, e);
                // The name is unknown, so no location these targets touch can
                // be trusted for cleanup this run
                for target in &targets.sync {
                    managed.hold(self.locate(target.location()));
                }
                report.secrets_failed += 1;
                metrics::increment_secrets_failed();
                return;
            }
        };

        // An explicit delete tag beats a sync rule for the same account
        let deleting: BTreeSet<&str> = targets
            .delete
            .iter()
            .map(|t| t.account_id.as_str())
            .collect();
        let sync_targets: Vec<&SyncTarget> = targets
            .sync
            .iter()
            .filter(|t| {
                let conflicted = deleting.contains(t.account_id.as_str());
                if conflicted {
                    warn!(
                        account_id = %t.account_id,
                        "Account {} is both a sync and a delete target for {}, deleting",
                        t.account_id,
                        source.name
                    );
                }
                !conflicted
            })
            .collect();

        info!(
            secret_name = %source.name,
            sync_targets = sync_targets.len(),
            delete_targets = targets.delete.len(),
            "Processing secret {}",
            source.name
        );

        let action = if sync_targets.is_empty() {
            None
        } else {
            match source.state {
                SourceState::PendingDeletion {
                    deletion_date,
                    deleted_at,
                } => {
                    let never_delete = policy.is_some_and(|p| p.never_delete);
                    Some(SecretAction::Delete(RecoveryWindow::compute(
                        deletion_date,
                        deleted_at,
                        never_delete,
                    )))
                }
                SourceState::Live => match self.source.get_secret_value(&secret.resource_id).await
                {
                    Ok(value) => Some(SecretAction::Copy(value)),
                    Err(e) => {
                        error!("Could not read value of {}: {:#}", source.name, e);
                        // Targets keep their last synced value and stay managed
                        for target in &sync_targets {
                            managed.record(
                                self.locate(target.location()),
                                target.delete_sync,
                                &source.name,
                            );
                        }
                        report.secrets_failed += 1;
                        metrics::increment_secrets_failed();
                        return;
                    }
                },
            }
        };

        report.secrets_processed += 1;
        metrics::increment_secrets_processed();

        if let Some(action) = &action {
            self.sync_all(&sync_targets, &source.name, action, managed, report)
                .await;
        }

        if !targets.delete.is_empty() {
            let retire = RetirePolicy::from_never_delete(policy.is_some_and(|p| p.never_delete));
            self.delete_all(&targets.delete, &source.name, retire, report)
                .await;
        }
    }

    async fn sync_all(
        &self,
        targets: &[&SyncTarget],
        name: &str,
        action: &SecretAction,
        managed: &mut ManagedSecrets,
        report: &mut RunReport,
    ) {
        let results: Vec<(&SyncTarget, Result<TargetOutcome>)> = stream::iter(targets.iter().copied())
            .map(|target| {
                let span = info_span!(
                    "secret_sync.target",
                    account_id = %target.account_id,
                    region = target.region.as_deref().unwrap_or("default"),
                );
                async move { (target, self.sync_one(target, name, action).await) }.instrument(span)
            })
            .buffer_unordered(self.settings.max_concurrent_targets.max(1))
            .collect()
            .await;

        for (target, result) in results {
            let location = self.locate(target.location());
            self.tally(&location, name, result, report);
            managed.record(location, target.delete_sync, name);
        }
    }

    async fn sync_one(
        &self,
        target: &SyncTarget,
        name: &str,
        action: &SecretAction,
    ) -> Result<TargetOutcome> {
        match action {
            SecretAction::Delete(_) if !target.delete_sync => {
                info!(
                    "Deletion sync disabled for account {}, keeping {}",
                    target.account_id, name
                );
                Ok(TargetOutcome::SkippedDeleteSyncDisabled)
            }
            SecretAction::Delete(window) => {
                let store = self.connect(&self.locate(target.location())).await?;
                propagate_deletion(
                    store.as_ref(),
                    name,
                    *window,
                    &self.settings.management_account_id,
                )
                .await
            }
            SecretAction::Copy(value) => {
                let store = self.connect(&self.locate(target.location())).await?;
                propagate_value(
                    store.as_ref(),
                    name,
                    value,
                    target.delete_sync,
                    &self.settings.management_account_id,
                )
                .await
            }
        }
    }

    async fn delete_all(
        &self,
        targets: &[DeleteTarget],
        name: &str,
        retire: RetirePolicy,
        report: &mut RunReport,
    ) {
        let results: Vec<(TargetLocation, Result<TargetOutcome>)> = stream::iter(targets)
            .map(|target| {
                let location = self.locate(target.location());
                let span = info_span!(
                    "secret_sync.delete_target",
                    account_id = %target.account_id,
                    region = target.region.as_deref().unwrap_or("default"),
                );
                async move {
                    let result = match self.connect(&location).await {
                        Ok(store) => {
                            remove_secret(
                                store.as_ref(),
                                name,
                                retire,
                                &self.settings.management_account_id,
                            )
                            .await
                        }
                        Err(e) => Err(e),
                    };
                    (location, result)
                }
                .instrument(span)
            })
            .buffer_unordered(self.settings.max_concurrent_targets.max(1))
            .collect()
            .await;

        for (location, result) in results {
            self.tally(&location, name, result, report);
        }
    }

    fn tally(
        &self,
        location: &TargetLocation,
        name: &str,
        result: Result<TargetOutcome>,
        report: &mut RunReport,
    ) {
        match result {
            Ok(outcome) => {
                report.record_outcome(outcome);
                metrics::record_target_outcome(outcome.as_str());
            }
            Err(e) => {
                error!(
                    location = %location,
                    secret_name = name,
                    management_account_id = %self.settings.management_account_id,
                    "Failed to sync {} to {}: {:#}",
                    name,
                    location,
                    e
                );
                report.target_failures += 1;
                metrics::increment_target_errors();
            }
        }
    }

    /// Fills in the ambient region so one store always has one location
    fn locate(&self, location: TargetLocation) -> TargetLocation {
        match location.region {
            Some(_) => location,
            None => TargetLocation {
                region: self.settings.default_region.clone(),
                ..location
            },
        }
    }

    /// Client for a target location, assuming the role on first use
    pub(crate) async fn connect(
        &self,
        location: &TargetLocation,
    ) -> Result<Arc<dyn TargetSecretStore>> {
        if let Some(store) = self.connections.lock().await.get(location) {
            return Ok(Arc::clone(store));
        }

        let store = self
            .connector
            .connect(location)
            .await
            .with_context(|| format!("Failed to assume identity in {location}"))?;

        let mut connections = self.connections.lock().await;
        Ok(Arc::clone(
            connections.entry(location.clone()).or_insert(store),
        ))
    }
}
