//! # Tag Classifier
//!
//! Maps raw tags onto the directives the resolver understands.

use crate::constants::{
    GROUP_TAG_KEYS, TAG_DELETE_ACCOUNT, TAG_DELETE_GROUP, TAG_NO_SYNC_ACCOUNT, TAG_NO_SYNC_GROUP,
    TAG_SYNC_ACCOUNT, TAG_SYNC_GROUP,
};
use crate::provider::Tag;

/// A recognized tag, with its value as the operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagDirective<'a> {
    SyncGroup(&'a str),
    SyncAccount(&'a str),
    NoSyncGroup(&'a str),
    NoSyncAccount(&'a str),
    DeleteGroup(&'a str),
    DeleteAccount(&'a str),
}

impl<'a> TagDirective<'a> {
    /// Parse a single tag; unknown keys yield `None`
    #[must_use]
    pub fn from_tag(tag: &'a Tag) -> Option<Self> {
        let value = tag.value.trim();
        match tag.key.as_str() {
            TAG_SYNC_GROUP => Some(Self::SyncGroup(value)),
            TAG_SYNC_ACCOUNT => Some(Self::SyncAccount(value)),
            TAG_NO_SYNC_GROUP => Some(Self::NoSyncGroup(value)),
            TAG_NO_SYNC_ACCOUNT => Some(Self::NoSyncAccount(value)),
            TAG_DELETE_GROUP => Some(Self::DeleteGroup(value)),
            TAG_DELETE_ACCOUNT => Some(Self::DeleteAccount(value)),
            _ => None,
        }
    }
}

/// Classify every tag; duplicates of one key are all kept, in input order
#[must_use]
pub fn classify(tags: &[Tag]) -> Vec<TagDirective<'_>> {
    tags.iter().filter_map(TagDirective::from_tag).collect()
}

/// Keys of the group-reference tags present, in input order
#[must_use]
pub fn group_tag_keys(tags: &[Tag]) -> Vec<String> {
    tags.iter()
        .filter(|tag| GROUP_TAG_KEYS.contains(&tag.key.as_str()))
        .map(|tag| tag.key.clone())
        .collect()
}
