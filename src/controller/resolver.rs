//! # Target Resolution
//!
//! Turns a secret's tags plus the policy document into the accounts the
//! secret is replicated to and the accounts it is removed from.
//!
//! Resolution runs as separate passes over the classified tags:
//!
//! 1. Inclusion builds `account -> (region, delete_sync)`; a later tag for the
//!    same account overwrites the earlier one.
//! 2. Exclusion builds a set of accounts.
//! 3. The result is inclusion minus exclusion, so exclusion always wins no
//!    matter which tags came first.
//!
//! Delete targets are expanded independently through the same group lookup.

use crate::controller::tags::{classify, group_tag_keys, TagDirective};
use crate::error::ResolutionError;
use crate::policy::{GroupSpec, PolicyDocument};
use crate::provider::{Tag, TargetLocation};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// A resolved replication destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncTarget {
    pub account_id: String,
    /// `None` means the ambient default region
    pub region: Option<String>,
    pub delete_sync: bool,
}

impl SyncTarget {
    #[must_use]
    pub fn location(&self) -> TargetLocation {
        TargetLocation::new(self.account_id.clone(), self.region.clone())
    }
}

/// A resolved destination to actively remove the secret from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteTarget {
    pub account_id: String,
    pub region: Option<String>,
}

impl DeleteTarget {
    #[must_use]
    pub fn location(&self) -> TargetLocation {
        TargetLocation::new(self.account_id.clone(), self.region.clone())
    }
}

/// Everything resolved for one secret; both lists are sorted by account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedTargets {
    pub sync: Vec<SyncTarget>,
    pub delete: Vec<DeleteTarget>,
}

impl ResolvedTargets {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sync.is_empty() && self.delete.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Inclusion {
    region: Option<String>,
    delete_sync: bool,
}

/// Resolve the sync and delete targets of one secret
///
/// # Errors
///
/// Returns [`ResolutionError::PolicyRequired`] when group tags are present
/// but no policy document was loaded.
pub fn resolve_targets(
    tags: &[Tag],
    policy: Option<&PolicyDocument>,
) -> Result<ResolvedTargets, ResolutionError> {
    if policy.is_none() {
        let keys = group_tag_keys(tags);
        if !keys.is_empty() {
            return Err(ResolutionError::PolicyRequired { keys });
        }
    }

    let directives = classify(tags);
    let included = inclusion_pass(&directives, policy);
    let excluded = exclusion_pass(&directives, policy);

    let sync = included
        .into_iter()
        .filter(|(account_id, _)| !excluded.contains(*account_id))
        .map(|(account_id, inclusion)| SyncTarget {
            account_id: account_id.to_string(),
            region: inclusion.region,
            delete_sync: inclusion.delete_sync,
        })
        .collect();

    let delete = delete_pass(&directives, policy)
        .into_iter()
        .map(|(account_id, region)| DeleteTarget {
            account_id: account_id.to_string(),
            region,
        })
        .collect();

    Ok(ResolvedTargets { sync, delete })
}

fn lookup_group<'p>(policy: Option<&'p PolicyDocument>, name: &str) -> Option<GroupSpec<'p>> {
    let group = policy.and_then(|p| p.group(name));
    if group.is_none() {
        debug!(group = name, "Account group not defined in policy, ignoring");
    }
    group
}

// Tag values arrive trimmed, so group entries are trimmed to match
fn group_accounts<'p>(group: GroupSpec<'p>) -> impl Iterator<Item = &'p str> {
    group
        .accounts
        .iter()
        .map(|a| a.trim())
        .filter(|a| usable(a))
}

fn usable(account_id: &str) -> bool {
    !account_id.is_empty()
}

fn inclusion_pass<'a>(
    directives: &[TagDirective<'a>],
    policy: Option<&'a PolicyDocument>,
) -> BTreeMap<&'a str, Inclusion> {
    let global_delete_sync = policy.is_some_and(|p| p.delete_sync);
    let mut included = BTreeMap::new();

    for directive in directives {
        match *directive {
            TagDirective::SyncGroup(name) => {
                let Some(group) = lookup_group(policy, name) else {
                    continue;
                };
                let delete_sync = group.delete_sync.unwrap_or(global_delete_sync);
                for account_id in group_accounts(group) {
                    included.insert(
                        account_id,
                        Inclusion {
                            region: group.region.map(str::to_string),
                            delete_sync,
                        },
                    );
                }
            }
            // Group overrides never apply to individually tagged accounts
            TagDirective::SyncAccount(account_id) if usable(account_id) => {
                included.insert(
                    account_id,
                    Inclusion {
                        region: None,
                        delete_sync: global_delete_sync,
                    },
                );
            }
            _ => {}
        }
    }

    included
}

fn exclusion_pass<'a>(
    directives: &[TagDirective<'a>],
    policy: Option<&'a PolicyDocument>,
) -> BTreeSet<&'a str> {
    let mut excluded = BTreeSet::new();

    for directive in directives {
        match *directive {
            TagDirective::NoSyncGroup(name) => {
                if let Some(group) = lookup_group(policy, name) {
                    excluded.extend(group_accounts(group));
                }
            }
            TagDirective::NoSyncAccount(account_id) => {
                excluded.insert(account_id);
            }
            _ => {}
        }
    }

    excluded
}

fn delete_pass<'a>(
    directives: &[TagDirective<'a>],
    policy: Option<&'a PolicyDocument>,
) -> BTreeMap<&'a str, Option<String>> {
    let mut targets = BTreeMap::new();

    for directive in directives {
        match *directive {
            TagDirective::DeleteGroup(name) => {
                let Some(group) = lookup_group(policy, name) else {
                    continue;
                };
                for account_id in group_accounts(group) {
                    targets.insert(account_id, group.region.map(str::to_string));
                }
            }
            TagDirective::DeleteAccount(account_id) if usable(account_id) => {
                targets.insert(account_id, None);
            }
            _ => {}
        }
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;

    fn policy(json: &str) -> PolicyDocument {
        PolicyDocument::from_json(json).expect("valid policy")
    }

    fn accounts(resolved: &ResolvedTargets) -> Vec<&str> {
        resolved.sync.iter().map(|t| t.account_id.as_str()).collect()
    }

    #[test]
    fn test_no_recognized_tags_resolves_to_nothing() {
        let tags = vec![Tag::new("Name", "x"), Tag::new("owner", "team-a")];
        let resolved = resolve_targets(&tags, None).expect("resolves");
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_group_tag_without_policy_is_an_error() {
        let tags = vec![
            Tag::new(TAG_SYNC_ACCOUNT, "111"),
            Tag::new(TAG_NO_SYNC_GROUP, "sandbox"),
        ];
        let err = resolve_targets(&tags, None).expect_err("policy is required");
        assert_eq!(
            err,
            ResolutionError::PolicyRequired {
                keys: vec![TAG_NO_SYNC_GROUP.to_string()]
            }
        );
        assert!(err.to_string().contains(TAG_NO_SYNC_GROUP));
    }

    #[test]
    fn test_individual_accounts_resolve_without_policy() {
        let tags = vec![
            Tag::new(TAG_SYNC_ACCOUNT, "222"),
            Tag::new(TAG_SYNC_ACCOUNT, "111"),
        ];
        let resolved = resolve_targets(&tags, None).expect("resolves");
        assert_eq!(
            resolved.sync,
            vec![
                SyncTarget {
                    account_id: "111".to_string(),
                    region: None,
                    delete_sync: false
                },
                SyncTarget {
                    account_id: "222".to_string(),
                    region: None,
                    delete_sync: false
                },
            ]
        );
    }

    #[test]
    fn test_group_with_region_minus_excluded_account() {
        let policy = policy(
            r#"{"AccountGroups": {"prod": {"Accounts": ["111", "222"], "Region": "eu-west-1"}}}"#,
        );
        let tags = vec![
            Tag::new(TAG_SYNC_GROUP, "prod"),
            Tag::new(TAG_NO_SYNC_ACCOUNT, "222"),
        ];
        let resolved = resolve_targets(&tags, Some(&policy)).expect("resolves");
        assert_eq!(
            resolved.sync,
            vec![SyncTarget {
                account_id: "111".to_string(),
                region: Some("eu-west-1".to_string()),
                delete_sync: false,
            }]
        );
    }

    #[test]
    fn test_exclusion_wins_regardless_of_tag_order() {
        let policy = policy(r#"{"AccountGroups": {"all": ["111", "222", "333"], "dev": ["333"]}}"#);
        let orders = [
            vec![
                Tag::new(TAG_NO_SYNC_GROUP, "dev"),
                Tag::new(TAG_NO_SYNC_ACCOUNT, "111"),
                Tag::new(TAG_SYNC_GROUP, "all"),
                Tag::new(TAG_SYNC_ACCOUNT, "111"),
            ],
            vec![
                Tag::new(TAG_SYNC_ACCOUNT, "111"),
                Tag::new(TAG_SYNC_GROUP, "all"),
                Tag::new(TAG_NO_SYNC_ACCOUNT, "111"),
                Tag::new(TAG_NO_SYNC_GROUP, "dev"),
            ],
        ];
        for tags in orders {
            let resolved = resolve_targets(&tags, Some(&policy)).expect("resolves");
            assert_eq!(accounts(&resolved), vec!["222"]);
        }
    }

    #[test]
    fn test_legacy_and_structured_groups_resolve_identically() {
        let legacy = policy(r#"{"AccountGroups": {"g": ["111", "222"]}}"#);
        let structured = policy(r#"{"AccountGroups": {"g": {"Accounts": ["111", "222"]}}}"#);
        let tags = vec![Tag::new(TAG_SYNC_GROUP, "g")];

        assert_eq!(
            resolve_targets(&tags, Some(&legacy)).expect("resolves"),
            resolve_targets(&tags, Some(&structured)).expect("resolves")
        );
    }

    #[test]
    fn test_unknown_and_empty_groups_contribute_nothing() {
        let policy = policy(r#"{"AccountGroups": {"empty": {"Accounts": []}}}"#);
        let tags = vec![
            Tag::new(TAG_SYNC_GROUP, "missing"),
            Tag::new(TAG_SYNC_GROUP, "empty"),
            Tag::new(TAG_NO_SYNC_GROUP, "missing"),
        ];
        let resolved = resolve_targets(&tags, Some(&policy)).expect("resolves");
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_bare_account_uses_global_delete_sync_not_group_override() {
        let policy = policy(
            r#"{
                "AccountGroups": {"prod": {"Accounts": ["111"], "Region": "eu-west-1", "DeleteSync": true}},
                "DeleteSync": false
            }"#,
        );
        let tags = vec![
            Tag::new(TAG_SYNC_GROUP, "prod"),
            Tag::new(TAG_SYNC_ACCOUNT, "222"),
        ];
        let resolved = resolve_targets(&tags, Some(&policy)).expect("resolves");
        assert_eq!(
            resolved.sync,
            vec![
                SyncTarget {
                    account_id: "111".to_string(),
                    region: Some("eu-west-1".to_string()),
                    delete_sync: true,
                },
                SyncTarget {
                    account_id: "222".to_string(),
                    region: None,
                    delete_sync: false,
                },
            ]
        );
    }

    #[test]
    fn test_group_without_delete_sync_inherits_global_default() {
        let policy = policy(r#"{"AccountGroups": {"g": {"Accounts": ["111"]}}, "DeleteSync": true}"#);
        let tags = vec![Tag::new(TAG_SYNC_GROUP, "g")];
        let resolved = resolve_targets(&tags, Some(&policy)).expect("resolves");
        assert!(resolved.sync[0].delete_sync);
    }

    #[test]
    fn test_last_inclusion_wins_for_region_and_flag() {
        let policy = policy(
            r#"{"AccountGroups": {"eu": {"Accounts": ["111"], "Region": "eu-west-1", "DeleteSync": true}}}"#,
        );
        let group_last = vec![
            Tag::new(TAG_SYNC_ACCOUNT, "111"),
            Tag::new(TAG_SYNC_GROUP, "eu"),
        ];
        let account_last = vec![
            Tag::new(TAG_SYNC_GROUP, "eu"),
            Tag::new(TAG_SYNC_ACCOUNT, "111"),
        ];

        let resolved = resolve_targets(&group_last, Some(&policy)).expect("resolves");
        assert_eq!(resolved.sync[0].region.as_deref(), Some("eu-west-1"));
        assert!(resolved.sync[0].delete_sync);

        let resolved = resolve_targets(&account_last, Some(&policy)).expect("resolves");
        assert_eq!(resolved.sync[0].region, None);
        assert!(!resolved.sync[0].delete_sync);
    }

    #[test]
    fn test_delete_targets_are_independent_of_exclusion() {
        let policy = policy(r#"{"AccountGroups": {"old": {"Accounts": ["333", "444"], "Region": "us-west-2"}}}"#);
        let tags = vec![
            Tag::new(TAG_DELETE_GROUP, "old"),
            Tag::new(TAG_DELETE_ACCOUNT, "555"),
            Tag::new(TAG_NO_SYNC_ACCOUNT, "333"),
        ];
        let resolved = resolve_targets(&tags, Some(&policy)).expect("resolves");
        assert!(resolved.sync.is_empty());
        assert_eq!(
            resolved.delete,
            vec![
                DeleteTarget {
                    account_id: "333".to_string(),
                    region: Some("us-west-2".to_string())
                },
                DeleteTarget {
                    account_id: "444".to_string(),
                    region: Some("us-west-2".to_string())
                },
                DeleteTarget {
                    account_id: "555".to_string(),
                    region: None
                },
            ]
        );
    }

    #[test]
    fn test_delete_group_without_policy_is_an_error() {
        let tags = vec![Tag::new(TAG_DELETE_GROUP, "old")];
        assert!(resolve_targets(&tags, None).is_err());
    }

    #[test]
    fn test_blank_account_values_are_ignored() {
        let tags = vec![
            Tag::new(TAG_SYNC_ACCOUNT, ""),
            Tag::new(TAG_DELETE_ACCOUNT, "  "),
        ];
        assert!(resolve_targets(&tags, None).expect("resolves").is_empty());
    }

    #[test]
    fn test_padded_account_values_match_their_exclusion() {
        let tags = vec![
            Tag::new(TAG_SYNC_ACCOUNT, " 111111111111"),
            Tag::new(TAG_NO_SYNC_ACCOUNT, "111111111111"),
        ];
        assert!(resolve_targets(&tags, None).expect("resolves").is_empty());
    }

    #[test]
    fn test_padded_group_entries_are_trimmed() {
        let policy = policy(
            r#"{ "AccountGroups": { "prod": ["111111111111 ", "222222222222"] } }"#,
        );
        let tags = vec![
            Tag::new(TAG_SYNC_GROUP, "prod "),
            Tag::new(TAG_NO_SYNC_ACCOUNT, "111111111111"),
        ];
        let resolved = resolve_targets(&tags, Some(&policy)).expect("resolves");
        assert_eq!(accounts(&resolved), vec!["222222222222"]);
    }
}
