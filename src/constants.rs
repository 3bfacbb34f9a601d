//! # Constants
//!
//! Shared constants used throughout the replicator.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Tag: replicate to every account of the named group
pub const TAG_SYNC_GROUP: &str = "SecretSync-SyncDestinationGroup";

/// Tag: replicate to a single account (ambient region, global deletion policy)
pub const TAG_SYNC_ACCOUNT: &str = "SecretSync-SyncAccount";

/// Tag: never replicate to any account of the named group
pub const TAG_NO_SYNC_GROUP: &str = "SecretSync-NoSyncDestinationGroup";

/// Tag: never replicate to a single account
pub const TAG_NO_SYNC_ACCOUNT: &str = "SecretSync-NoSyncAccount";

/// Tag: actively remove the secret from every account of the named group
pub const TAG_DELETE_GROUP: &str = "SecretSync-DeleteDestinationGroup";

/// Tag: actively remove the secret from a single account
pub const TAG_DELETE_ACCOUNT: &str = "SecretSync-DeleteAccount";

/// Ownership tag written on every replicated secret.
/// The value is the management account id.
pub const TAG_MANAGED_BY: &str = "SecretSync-ManagedBy";

/// Every tag key that makes a source secret eligible for processing
pub const RECOGNIZED_TAG_KEYS: [&str; 6] = [
    TAG_SYNC_GROUP,
    TAG_SYNC_ACCOUNT,
    TAG_NO_SYNC_GROUP,
    TAG_NO_SYNC_ACCOUNT,
    TAG_DELETE_GROUP,
    TAG_DELETE_ACCOUNT,
];

/// Tag keys that can only be resolved through the policy document
pub const GROUP_TAG_KEYS: [&str; 3] = [TAG_SYNC_GROUP, TAG_NO_SYNC_GROUP, TAG_DELETE_GROUP];

/// Default id of the policy document in the management account's secret store
pub const DEFAULT_POLICY_SECRET_ID: &str = "secret-sync/config";

/// Default role assumed in every target account
pub const DEFAULT_ROLE_NAME: &str = "SecretSyncRole";

/// Default STS session name used when assuming the target role
pub const DEFAULT_SESSION_NAME: &str = "SecretSyncSession";

/// Smallest recovery window accepted by Secrets Manager (days)
pub const MIN_RECOVERY_WINDOW_DAYS: i64 = 7;

/// Largest recovery window accepted by Secrets Manager (days)
pub const MAX_RECOVERY_WINDOW_DAYS: i64 = 30;

/// Default number of target accounts processed concurrently for one secret
pub const DEFAULT_MAX_CONCURRENT_TARGETS: usize = 4;
