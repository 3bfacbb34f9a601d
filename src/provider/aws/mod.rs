//! # AWS Secrets Manager Provider
//!
//! - `auth`: SDK configuration, caller identity, cross-account role assumption
//! - `discovery`: the management account side (`SourceSecretStore`)
//! - `operations`: the target account side (`TargetSecretStore`)

use crate::observability::metrics;
use crate::provider::{Tag, TargetLocation};
use aws_sdk_secretsmanager::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_secretsmanager::primitives::DateTime;
use aws_sdk_secretsmanager::types::Tag as AwsTag;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use chrono::Utc;
use std::time::Instant;

pub mod auth;
pub mod discovery;
pub mod operations;

pub use auth::{caller_account_id, create_default_config, AwsRoleConnector};

/// Secrets Manager in the management account
#[derive(Debug, Clone)]
pub struct AwsSourceStore {
    client: SecretsManagerClient,
}

impl AwsSourceStore {
    pub fn new(client: SecretsManagerClient) -> Self {
        Self { client }
    }

    pub fn from_config(sdk_config: &aws_config::SdkConfig) -> Self {
        Self::new(SecretsManagerClient::new(sdk_config))
    }
}

/// Secrets Manager in one target account and region, under an assumed role
#[derive(Debug, Clone)]
pub struct AwsTargetStore {
    client: SecretsManagerClient,
    location: TargetLocation,
}

impl AwsTargetStore {
    pub fn new(client: SecretsManagerClient, location: TargetLocation) -> Self {
        Self { client, location }
    }
}

fn is_not_found<E>(err: &SdkError<E>) -> bool
where
    E: ProvideErrorMetadata,
{
    if let SdkError::ServiceError(context) = err {
        return context.err().code() == Some("ResourceNotFoundException");
    }
    false
}

fn describe_error<E>(operation: &str, err: &SdkError<E>) -> anyhow::Error
where
    E: std::error::Error + 'static,
{
    anyhow::anyhow!("{operation} failed: {}", DisplayErrorContext(err))
}

fn record_call(operation: &str, start: Instant) {
    metrics::record_provider_operation(operation, start.elapsed().as_secs_f64());
}

fn to_utc(value: &DateTime) -> Option<chrono::DateTime<Utc>> {
    chrono::DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

fn from_aws_tags(tags: &[AwsTag]) -> Vec<Tag> {
    tags.iter()
        .filter_map(|tag| {
            let key = tag.key()?;
            Some(Tag::new(key, tag.value().unwrap_or_default()))
        })
        .collect()
}

fn to_aws_tag(tag: &Tag) -> AwsTag {
    AwsTag::builder().key(&tag.key).value(&tag.value).build()
}

fn tag_value<'a>(tags: &'a [AwsTag], key: &str) -> Option<&'a str> {
    tags.iter()
        .find(|tag| tag.key() == Some(key))
        .and_then(AwsTag::value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_conversion_skips_keyless_tags() {
        let tags = vec![
            AwsTag::builder().key("a").value("1").build(),
            AwsTag::builder().value("orphan").build(),
            AwsTag::builder().key("b").build(),
        ];
        assert_eq!(
            from_aws_tags(&tags),
            vec![Tag::new("a", "1"), Tag::new("b", "")]
        );
    }

    #[test]
    fn test_tag_value_lookup() {
        let tags = vec![
            AwsTag::builder().key("SecretSync-ManagedBy").value("111").build(),
            AwsTag::builder().key("team").value("core").build(),
        ];
        assert_eq!(tag_value(&tags, "SecretSync-ManagedBy"), Some("111"));
        assert_eq!(tag_value(&tags, "missing"), None);
    }

    #[test]
    fn test_timestamp_conversion() {
        let converted = to_utc(&DateTime::from_secs(1_700_000_000)).expect("valid timestamp");
        assert_eq!(converted.timestamp(), 1_700_000_000);
    }
}
