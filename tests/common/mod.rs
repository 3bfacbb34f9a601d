//! Common test utilities for replication tests
//!
//! In-memory stand-ins for the management account and the target accounts.
//! Every target store records the calls made against it so tests can assert
//! on what was (and was not) done.

#![allow(dead_code, reason = "Each test binary uses a different subset of the helpers")]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secret_sync::constants::{DEFAULT_POLICY_SECRET_ID, TAG_MANAGED_BY};
use secret_sync::controller::{Replicator, ReplicatorSettings};
use secret_sync::provider::{
    DiscoveredSecret, SourceSecret, SourceSecretStore, SourceState, Tag, TargetConnector,
    TargetLocation, TargetSecret, TargetSecretStore,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use zeroize::Zeroizing;

pub const MANAGEMENT_ACCOUNT: &str = "999999999999";

pub fn tag(key: &str, value: &str) -> Tag {
    Tag::new(key, value)
}

pub fn location(account_id: &str) -> TargetLocation {
    TargetLocation::new(account_id, None)
}

fn arn(location: &TargetLocation, name: &str) -> String {
    format!(
        "arn:aws:secretsmanager:{}:{}:secret:{}",
        location.region.as_deref().unwrap_or("us-east-1"),
        location.account_id,
        name
    )
}

// Management account

#[derive(Debug, Clone)]
struct SourceEntry {
    name: String,
    tags: Vec<Tag>,
    value: String,
    state: SourceState,
}

#[derive(Debug, Default)]
pub struct FakeSource {
    secrets: Mutex<Vec<SourceEntry>>,
    policy: Mutex<Option<String>>,
    policy_unavailable: Mutex<bool>,
    discovery_fails: Mutex<bool>,
    describe_failures: Mutex<HashSet<String>>,
    value_failures: Mutex<HashSet<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(self, raw: &str) -> Self {
        *self.policy.lock().unwrap() = Some(raw.to_string());
        self
    }

    pub fn with_secret(self, name: &str, value: &str, tags: Vec<Tag>) -> Self {
        self.secrets.lock().unwrap().push(SourceEntry {
            name: name.to_string(),
            tags,
            value: value.to_string(),
            state: SourceState::Live,
        });
        self
    }

    /// A source secret scheduled for deletion `window_days` after it was deleted
    pub fn with_deleted_secret(self, name: &str, tags: Vec<Tag>, window_days: i64) -> Self {
        let deleted_at: DateTime<Utc> = Utc::now() - Duration::hours(1);
        self.secrets.lock().unwrap().push(SourceEntry {
            name: name.to_string(),
            tags,
            value: String::new(),
            state: SourceState::PendingDeletion {
                deletion_date: Some(deleted_at + Duration::days(window_days)),
                deleted_at: Some(deleted_at),
            },
        });
        self
    }

    pub fn set_value(&self, name: &str, value: &str) {
        if let Some(entry) = self.secrets.lock().unwrap().iter_mut().find(|e| e.name == name) {
            entry.value = value.to_string();
        }
    }

    pub fn remove_secret(&self, name: &str) {
        self.secrets.lock().unwrap().retain(|e| e.name != name);
    }

    pub fn fail_describe(&self, name: &str) {
        self.describe_failures.lock().unwrap().insert(name.to_string());
    }

    pub fn fail_value(&self, name: &str) {
        self.value_failures.lock().unwrap().insert(name.to_string());
    }

    pub fn fail_policy(&self) {
        *self.policy_unavailable.lock().unwrap() = true;
    }

    pub fn fail_discovery(&self) {
        *self.discovery_fails.lock().unwrap() = true;
    }

    fn resource_id(name: &str) -> String {
        format!("arn:aws:secretsmanager:us-east-1:{MANAGEMENT_ACCOUNT}:secret:{name}")
    }

    fn find(&self, resource_id: &str) -> Option<SourceEntry> {
        self.secrets
            .lock()
            .unwrap()
            .iter()
            .find(|e| Self::resource_id(&e.name) == resource_id)
            .cloned()
    }
}

#[async_trait]
impl SourceSecretStore for FakeSource {
    async fn discover_tagged_secrets(&self, tag_keys: &[&str]) -> Result<Vec<DiscoveredSecret>> {
        if *self.discovery_fails.lock().unwrap() {
            return Err(anyhow!("list_secrets failed: throttled"));
        }
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.tags.iter().any(|t| tag_keys.contains(&t.key.as_str())))
            .map(|e| DiscoveredSecret {
                resource_id: Self::resource_id(&e.name),
                tags: e.tags.clone(),
            })
            .collect())
    }

    async fn load_policy_document(&self, _id: &str) -> Result<Option<String>> {
        if *self.policy_unavailable.lock().unwrap() {
            return Err(anyhow!("get_secret_value failed: access denied"));
        }
        Ok(self.policy.lock().unwrap().clone())
    }

    async fn describe_secret(&self, resource_id: &str) -> Result<SourceSecret> {
        let entry = self
            .find(resource_id)
            .ok_or_else(|| anyhow!("no such source secret {resource_id}"))?;
        if self.describe_failures.lock().unwrap().contains(&entry.name) {
            return Err(anyhow!("describe_secret failed for {}", entry.name));
        }
        Ok(SourceSecret {
            name: entry.name.clone(),
            arn: resource_id.to_string(),
            state: entry.state,
        })
    }

    async fn get_secret_value(&self, resource_id: &str) -> Result<Zeroizing<String>> {
        let entry = self
            .find(resource_id)
            .ok_or_else(|| anyhow!("no such source secret {resource_id}"))?;
        if self.value_failures.lock().unwrap().contains(&entry.name) {
            return Err(anyhow!("get_secret_value failed for {}", entry.name));
        }
        Ok(Zeroizing::new(entry.value))
    }
}

// Target accounts

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSecret {
    pub arn: String,
    pub value: String,
    pub tags: BTreeMap<String, String>,
    pub pending_deletion: bool,
    pub recovery_window_days: Option<i64>,
}

impl StoredSecret {
    pub fn owner(&self) -> Option<&str> {
        self.tags.get(TAG_MANAGED_BY).map(String::as_str)
    }
}

#[derive(Debug)]
pub struct FakeTargetStore {
    location: TargetLocation,
    secrets: Mutex<BTreeMap<String, StoredSecret>>,
    calls: Mutex<Vec<String>>,
    fail_writes: Mutex<bool>,
    fail_reads: Mutex<bool>,
}

impl FakeTargetStore {
    pub fn new(location: TargetLocation) -> Self {
        Self {
            location,
            secrets: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_writes: Mutex::new(false),
            fail_reads: Mutex::new(false),
        }
    }

    /// Seed a live secret, optionally carrying an ownership tag
    pub fn seed(&self, name: &str, value: &str, owner: Option<&str>) {
        let mut tags = BTreeMap::new();
        if let Some(owner) = owner {
            tags.insert(TAG_MANAGED_BY.to_string(), owner.to_string());
        }
        self.secrets.lock().unwrap().insert(
            name.to_string(),
            StoredSecret {
                arn: arn(&self.location, name),
                value: value.to_string(),
                tags,
                pending_deletion: false,
                recovery_window_days: None,
            },
        );
    }

    /// Seed a secret already scheduled for deletion
    pub fn seed_pending_deletion(&self, name: &str, value: &str, owner: Option<&str>) {
        self.seed(name, value, owner);
        if let Some(secret) = self.secrets.lock().unwrap().get_mut(name) {
            secret.pending_deletion = true;
            secret.recovery_window_days = Some(30);
        }
    }

    pub fn get(&self, name: &str) -> Option<StoredSecret> {
        self.secrets.lock().unwrap().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.secrets.lock().unwrap().keys().cloned().collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that change state (everything but describe/get/list)
    pub fn writes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("describe") && !c.starts_with("get") && !c.starts_with("list"))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn fail_writes(&self) {
        *self.fail_writes.lock().unwrap() = true;
    }

    /// GetSecretValue fails, everything else works
    pub fn fail_reads(&self) {
        *self.fail_reads.lock().unwrap() = true;
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_writable(&self) -> Result<()> {
        if *self.fail_writes.lock().unwrap() {
            return Err(anyhow!("access denied in {}", self.location));
        }
        Ok(())
    }
}

#[async_trait]
impl TargetSecretStore for FakeTargetStore {
    async fn describe_secret(&self, name: &str) -> Result<Option<TargetSecret>> {
        self.record(format!("describe:{name}"));
        Ok(self.get(name).map(|s| TargetSecret {
            name: name.to_string(),
            arn: s.arn.clone(),
            pending_deletion: s.pending_deletion,
            owner: s.owner().map(ToString::to_string),
        }))
    }

    async fn get_secret_value(&self, name: &str) -> Result<Option<Zeroizing<String>>> {
        self.record(format!("get:{name}"));
        if *self.fail_reads.lock().unwrap() {
            return Err(anyhow!("AccessDeniedException: kms:Decrypt on {name}"));
        }
        Ok(self.get(name).map(|s| Zeroizing::new(s.value)))
    }

    async fn create_secret(&self, name: &str, value: &str, tags: &[Tag]) -> Result<()> {
        self.record(format!("create:{name}"));
        self.check_writable()?;
        let mut secrets = self.secrets.lock().unwrap();
        if secrets.contains_key(name) {
            return Err(anyhow!("ResourceExistsException: {name}"));
        }
        secrets.insert(
            name.to_string(),
            StoredSecret {
                arn: arn(&self.location, name),
                value: value.to_string(),
                tags: tags.iter().map(|t| (t.key.clone(), t.value.clone())).collect(),
                pending_deletion: false,
                recovery_window_days: None,
            },
        );
        Ok(())
    }

    async fn put_secret_value(&self, name: &str, value: &str) -> Result<()> {
        self.record(format!("put:{name}"));
        self.check_writable()?;
        let mut secrets = self.secrets.lock().unwrap();
        let secret = secrets
            .get_mut(name)
            .ok_or_else(|| anyhow!("ResourceNotFoundException: {name}"))?;
        if secret.pending_deletion {
            return Err(anyhow!("InvalidRequestException: {name} is marked for deletion"));
        }
        secret.value = value.to_string();
        Ok(())
    }

    async fn tag_secret(&self, arn: &str, tag: &Tag) -> Result<()> {
        self.record(format!("tag:{arn}"));
        self.check_writable()?;
        let mut secrets = self.secrets.lock().unwrap();
        let secret = secrets
            .values_mut()
            .find(|s| s.arn == arn)
            .ok_or_else(|| anyhow!("ResourceNotFoundException: {arn}"))?;
        secret.tags.insert(tag.key.clone(), tag.value.clone());
        Ok(())
    }

    async fn soft_delete_secret(&self, name: &str, recovery_window_days: i64) -> Result<()> {
        self.record(format!("soft_delete:{name}:{recovery_window_days}"));
        self.check_writable()?;
        if !(7..=30).contains(&recovery_window_days) {
            return Err(anyhow!("InvalidParameterException: window {recovery_window_days}"));
        }
        let mut secrets = self.secrets.lock().unwrap();
        let secret = secrets
            .get_mut(name)
            .ok_or_else(|| anyhow!("ResourceNotFoundException: {name}"))?;
        secret.pending_deletion = true;
        secret.recovery_window_days = Some(recovery_window_days);
        Ok(())
    }

    async fn restore_secret(&self, name: &str) -> Result<()> {
        self.record(format!("restore:{name}"));
        self.check_writable()?;
        let mut secrets = self.secrets.lock().unwrap();
        let secret = secrets
            .get_mut(name)
            .ok_or_else(|| anyhow!("ResourceNotFoundException: {name}"))?;
        secret.pending_deletion = false;
        secret.recovery_window_days = None;
        Ok(())
    }

    async fn hard_delete_secret(&self, name: &str) -> Result<()> {
        self.record(format!("hard_delete:{name}"));
        self.check_writable()?;
        self.secrets
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| anyhow!("ResourceNotFoundException: {name}"))
    }

    async fn list_owned_secrets(
        &self,
        owner_tag_key: &str,
        owner: &str,
    ) -> Result<Vec<TargetSecret>> {
        self.record("list_owned".to_string());
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, s)| !s.pending_deletion)
            .filter(|(_, s)| s.tags.get(owner_tag_key).map(String::as_str) == Some(owner))
            .map(|(name, s)| TargetSecret {
                name: name.clone(),
                arn: s.arn.clone(),
                pending_deletion: false,
                owner: Some(owner.to_string()),
            })
            .collect())
    }
}

/// Hands out one `FakeTargetStore` per location, created on first use
#[derive(Debug, Default)]
pub struct FakeConnector {
    stores: Mutex<HashMap<TargetLocation, Arc<FakeTargetStore>>>,
    unreachable: Mutex<HashSet<String>>,
    connects: Mutex<Vec<TargetLocation>>,
    ambient_region: Option<String>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locations without a region resolve to the same store as `region`,
    /// like an SDK client built from the ambient configuration
    pub fn with_ambient_region(mut self, region: &str) -> Self {
        self.ambient_region = Some(region.to_string());
        self
    }

    pub fn store(&self, location: &TargetLocation) -> Arc<FakeTargetStore> {
        let location = match (&location.region, &self.ambient_region) {
            (None, Some(ambient)) => {
                TargetLocation::new(location.account_id.clone(), Some(ambient.clone()))
            }
            _ => location.clone(),
        };
        Arc::clone(
            self.stores
                .lock()
                .unwrap()
                .entry(location.clone())
                .or_insert_with(|| Arc::new(FakeTargetStore::new(location))),
        )
    }

    /// Role assumption into `account_id` fails
    pub fn make_unreachable(&self, account_id: &str) {
        self.unreachable.lock().unwrap().insert(account_id.to_string());
    }

    pub fn connect_count(&self, location: &TargetLocation) -> usize {
        self.connects
            .lock()
            .unwrap()
            .iter()
            .filter(|l| *l == location)
            .count()
    }

    /// Every location a connection was requested for
    pub fn touched(&self) -> HashSet<TargetLocation> {
        self.connects.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait]
impl TargetConnector for FakeConnector {
    async fn connect(&self, location: &TargetLocation) -> Result<Arc<dyn TargetSecretStore>> {
        self.connects.lock().unwrap().push(location.clone());
        if self.unreachable.lock().unwrap().contains(&location.account_id) {
            return Err(anyhow!("AccessDenied: cannot assume role in {}", location.account_id));
        }
        let store: Arc<dyn TargetSecretStore> = self.store(location);
        Ok(store)
    }
}

pub fn settings() -> ReplicatorSettings {
    ReplicatorSettings {
        management_account_id: MANAGEMENT_ACCOUNT.to_string(),
        policy_secret_id: DEFAULT_POLICY_SECRET_ID.to_string(),
        max_concurrent_targets: 4,
        default_region: None,
    }
}

pub fn replicator(source: &Arc<FakeSource>, connector: &Arc<FakeConnector>) -> Replicator {
    replicator_with(source, connector, settings())
}

pub fn replicator_with(
    source: &Arc<FakeSource>,
    connector: &Arc<FakeConnector>,
    settings: ReplicatorSettings,
) -> Replicator {
    Replicator::new(
        Arc::clone(source) as Arc<dyn SourceSecretStore>,
        Arc::clone(connector) as Arc<dyn TargetConnector>,
        settings,
    )
}
