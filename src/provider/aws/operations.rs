//! # Target Account Operations
//!
//! Secret CRUD in a target account through an assumed-role client.

use super::discovery::secret_text;
use super::{describe_error, is_not_found, record_call, tag_value, to_aws_tag, AwsTargetStore};
use crate::constants::TAG_MANAGED_BY;
use crate::observability::metrics;
use crate::provider::{Tag, TargetSecret, TargetSecretStore};
use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_secretsmanager::error::SdkError;
use aws_sdk_secretsmanager::types::{Filter, FilterNameStringType};
use std::time::Instant;
use tracing::{debug, info, info_span, Instrument};
use zeroize::Zeroizing;

impl AwsTargetStore {
    fn failed<E>(&self, operation: &str, err: &SdkError<E>) -> anyhow::Error
    where
        E: std::error::Error + 'static,
    {
        metrics::increment_provider_errors(operation);
        describe_error(operation, err).context(format!("target {}", self.location))
    }
}

#[async_trait]
impl TargetSecretStore for AwsTargetStore {
    async fn describe_secret(&self, name: &str) -> Result<Option<TargetSecret>> {
        let start = Instant::now();
        match self.client.describe_secret().secret_id(name).send().await {
            Ok(output) => {
                record_call("describe_secret", start);
                Ok(Some(TargetSecret {
                    name: output.name().unwrap_or(name).to_string(),
                    arn: output.arn().unwrap_or(name).to_string(),
                    pending_deletion: output.deleted_date().is_some(),
                    owner: tag_value(output.tags(), TAG_MANAGED_BY)
                        .map(ToString::to_string),
                }))
            }
            Err(e) if is_not_found(&e) => {
                record_call("describe_secret", start);
                Ok(None)
            }
            Err(e) => Err(self.failed("describe_secret", &e)),
        }
    }

    async fn get_secret_value(&self, name: &str) -> Result<Option<Zeroizing<String>>> {
        let span = tracing::debug_span!(
            "aws.target.get",
            secret.name = name,
            target = %self.location
        );
        async move {
            let start = Instant::now();
            match self.client.get_secret_value().secret_id(name).send().await {
                Ok(output) => {
                    record_call("get_secret_value", start);
                    secret_text(&output).map(Some)
                }
                Err(e) if is_not_found(&e) => {
                    record_call("get_secret_value", start);
                    Ok(None)
                }
                Err(e) => Err(self.failed("get_secret_value", &e)),
            }
        }
        .instrument(span)
        .await
    }

    async fn create_secret(&self, name: &str, value: &str, tags: &[Tag]) -> Result<()> {
        let span = info_span!("aws.target.create", secret.name = name, target = %self.location);
        async move {
            let start = Instant::now();
            info!("Creating secret {} in {}", name, self.location);
            self.client
                .create_secret()
                .name(name)
                .secret_string(value)
                .set_tags(Some(tags.iter().map(to_aws_tag).collect()))
                .send()
                .await
                .map_err(|e| self.failed("create_secret", &e))?;
            record_call("create_secret", start);
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn put_secret_value(&self, name: &str, value: &str) -> Result<()> {
        let span = info_span!("aws.target.update", secret.name = name, target = %self.location);
        async move {
            let start = Instant::now();
            info!("Updating secret {} in {}", name, self.location);
            self.client
                .put_secret_value()
                .secret_id(name)
                .secret_string(value)
                .send()
                .await
                .map_err(|e| self.failed("put_secret_value", &e))?;
            record_call("put_secret_value", start);
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn tag_secret(&self, arn: &str, tag: &Tag) -> Result<()> {
        let start = Instant::now();
        debug!(secret.arn = arn, tag.key = %tag.key, "Tagging secret");
        self.client
            .tag_resource()
            .secret_id(arn)
            .tags(to_aws_tag(tag))
            .send()
            .await
            .map_err(|e| self.failed("tag_resource", &e))?;
        record_call("tag_resource", start);
        Ok(())
    }

    async fn soft_delete_secret(&self, name: &str, recovery_window_days: i64) -> Result<()> {
        let start = Instant::now();
        info!(
            "Scheduling deletion of {} in {} with a {} day recovery window",
            name, self.location, recovery_window_days
        );
        self.client
            .delete_secret()
            .secret_id(name)
            .recovery_window_in_days(recovery_window_days)
            .send()
            .await
            .map_err(|e| self.failed("delete_secret", &e))?;
        record_call("delete_secret", start);
        Ok(())
    }

    async fn restore_secret(&self, name: &str) -> Result<()> {
        let start = Instant::now();
        info!("Restoring secret {} in {}", name, self.location);
        self.client
            .restore_secret()
            .secret_id(name)
            .send()
            .await
            .map_err(|e| self.failed("restore_secret", &e))?;
        record_call("restore_secret", start);
        Ok(())
    }

    async fn hard_delete_secret(&self, name: &str) -> Result<()> {
        let start = Instant::now();
        info!("Deleting secret {} in {} without recovery", name, self.location);
        self.client
            .delete_secret()
            .secret_id(name)
            .force_delete_without_recovery(true)
            .send()
            .await
            .map_err(|e| self.failed("delete_secret", &e))?;
        record_call("delete_secret", start);
        Ok(())
    }

    async fn list_owned_secrets(
        &self,
        owner_tag_key: &str,
        owner: &str,
    ) -> Result<Vec<TargetSecret>> {
        let span = info_span!("aws.target.list_owned", target = %self.location);
        async move {
            let start = Instant::now();
            let key_filter = Filter::builder()
                .key(FilterNameStringType::TagKey)
                .values(owner_tag_key)
                .build();
            let value_filter = Filter::builder()
                .key(FilterNameStringType::TagValue)
                .values(owner)
                .build();

            let mut owned = Vec::new();
            let mut token: Option<String> = None;
            loop {
                let mut request = self
                    .client
                    .list_secrets()
                    .filters(key_filter.clone())
                    .filters(value_filter.clone());
                if let Some(ref next) = token {
                    request = request.next_token(next);
                }
                let response = request
                    .send()
                    .await
                    .map_err(|e| self.failed("list_secrets", &e))?;

                for entry in response.secret_list() {
                    let (Some(name), Some(arn)) = (entry.name(), entry.arn()) else {
                        continue;
                    };
                    // Key and value filters match independently and by prefix
                    let entry_owner = tag_value(entry.tags(), owner_tag_key);
                    if entry_owner != Some(owner) || entry.deleted_date().is_some() {
                        continue;
                    }
                    owned.push(TargetSecret {
                        name: name.to_string(),
                        arn: arn.to_string(),
                        pending_deletion: false,
                        owner: entry_owner.map(ToString::to_string),
                    });
                }

                match response.next_token() {
                    Some(next) if !next.is_empty() => token = Some(next.to_string()),
                    _ => break,
                }
            }

            record_call("list_secrets", start);
            debug!("Found {} owned secret(s) in {}", owned.len(), self.location);
            Ok(owned)
        }
        .instrument(span)
        .await
    }
}
