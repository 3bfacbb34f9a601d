//! # Management Account Store
//!
//! Discovery, policy loading and source reads against Secrets Manager in the
//! management account.

use super::{describe_error, from_aws_tags, is_not_found, record_call, to_utc, AwsSourceStore};
use crate::observability::metrics;
use crate::provider::{DiscoveredSecret, SourceSecret, SourceSecretStore, SourceState};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_secretsmanager::operation::get_secret_value::GetSecretValueOutput;
use aws_sdk_secretsmanager::types::{Filter, FilterNameStringType};
use std::time::Instant;
use tracing::{debug, info, info_span, Instrument};
use zeroize::Zeroizing;

#[async_trait]
impl SourceSecretStore for AwsSourceStore {
    async fn discover_tagged_secrets(&self, tag_keys: &[&str]) -> Result<Vec<DiscoveredSecret>> {
        let span = info_span!("aws.source.discover", tag_keys = tag_keys.len());
        async move {
            let start = Instant::now();
            let filter = Filter::builder()
                .key(FilterNameStringType::TagKey)
                .set_values(Some(tag_keys.iter().map(ToString::to_string).collect()))
                .build();

            let mut discovered = Vec::new();
            let mut token: Option<String> = None;
            loop {
                let mut request = self
                    .client
                    .list_secrets()
                    .filters(filter.clone())
                    .include_planned_deletion(true);
                if let Some(ref next) = token {
                    request = request.next_token(next);
                }

                let response = match request.send().await {
                    Ok(response) => response,
                    Err(e) => {
                        metrics::increment_provider_errors("list_secrets");
                        return Err(describe_error("list_secrets", &e));
                    }
                };

                for entry in response.secret_list() {
                    let Some(arn) = entry.arn() else {
                        continue;
                    };
                    let tags = from_aws_tags(entry.tags());
                    // TagKey filters match on prefix
                    if !tags.iter().any(|tag| tag_keys.contains(&tag.key.as_str())) {
                        continue;
                    }
                    discovered.push(DiscoveredSecret {
                        resource_id: arn.to_string(),
                        tags,
                    });
                }

                match response.next_token() {
                    Some(next) if !next.is_empty() => token = Some(next.to_string()),
                    _ => break,
                }
            }

            record_call("list_secrets", start);
            info!("Discovered {} tagged secret(s)", discovered.len());
            Ok(discovered)
        }
        .instrument(span)
        .await
    }

    async fn load_policy_document(&self, id: &str) -> Result<Option<String>> {
        let start = Instant::now();
        match self.client.get_secret_value().secret_id(id).send().await {
            Ok(output) => {
                record_call("get_secret_value", start);
                Ok(Some(secret_text(&output)?.to_string()))
            }
            Err(e) if is_not_found(&e) => {
                record_call("get_secret_value", start);
                debug!(policy_secret_id = id, "Policy document not found");
                Ok(None)
            }
            Err(e) => {
                metrics::increment_provider_errors("get_secret_value");
                Err(describe_error("get_secret_value", &e))
            }
        }
    }

    async fn describe_secret(&self, resource_id: &str) -> Result<SourceSecret> {
        let start = Instant::now();
        let output = self
            .client
            .describe_secret()
            .secret_id(resource_id)
            .send()
            .await
            .map_err(|e| {
                metrics::increment_provider_errors("describe_secret");
                describe_error("describe_secret", &e)
            })?;
        record_call("describe_secret", start);

        let name = output
            .name()
            .with_context(|| format!("Secret {resource_id} has no name"))?
            .to_string();
        let state = match output.deleted_date() {
            Some(deleted) => SourceState::PendingDeletion {
                deletion_date: to_utc(deleted),
                deleted_at: output.last_changed_date().and_then(to_utc),
            },
            None => SourceState::Live,
        };

        Ok(SourceSecret {
            name,
            arn: output.arn().unwrap_or(resource_id).to_string(),
            state,
        })
    }

    async fn get_secret_value(&self, resource_id: &str) -> Result<Zeroizing<String>> {
        let start = Instant::now();
        let output = self
            .client
            .get_secret_value()
            .secret_id(resource_id)
            .send()
            .await
            .map_err(|e| {
                metrics::increment_provider_errors("get_secret_value");
                describe_error("get_secret_value", &e)
            })?;
        record_call("get_secret_value", start);
        secret_text(&output)
    }
}

/// String value of a secret, falling back to a UTF-8 decoded binary value
pub(super) fn secret_text(output: &GetSecretValueOutput) -> Result<Zeroizing<String>> {
    if let Some(value) = output.secret_string() {
        return Ok(Zeroizing::new(value.to_string()));
    }
    if let Some(blob) = output.secret_binary() {
        return Ok(Zeroizing::new(
            String::from_utf8_lossy(blob.as_ref()).into_owned(),
        ));
    }
    anyhow::bail!("Secret has no string or binary value")
}
