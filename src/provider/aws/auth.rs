//! # AWS Authentication
//!
//! SDK configuration for the management account and cross-account role
//! assumption for target accounts.

use super::AwsTargetStore;
use crate::provider::{TargetConnector, TargetLocation, TargetSecretStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_credential_types::Credentials;
use aws_sdk_secretsmanager::config::Region;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

const CREDENTIALS_PROVIDER_NAME: &str = "SecretSyncAssumeRole";

/// Create AWS SDK config using the default credential chain
///
/// The region falls back to the SDK's own resolution (`AWS_REGION`, profile,
/// instance metadata) when not given.
pub async fn create_default_config(region: Option<&str>) -> SdkConfig {
    let mut builder = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = region {
        builder = builder.region(Region::new(region.to_string()));
    }
    builder.load().await
}

/// Account id of the identity the process runs as
///
/// # Errors
///
/// Returns an error if STS cannot be reached or returns no account.
pub async fn caller_account_id(sdk_config: &SdkConfig) -> Result<String> {
    let sts = aws_sdk_sts::Client::new(sdk_config);
    let identity = sts
        .get_caller_identity()
        .send()
        .await
        .context("Failed to call sts:GetCallerIdentity")?;
    identity
        .account()
        .map(ToString::to_string)
        .context("sts:GetCallerIdentity returned no account id")
}

/// Assumes a fixed role in each target account
#[derive(Debug, Clone)]
pub struct AwsRoleConnector {
    base: SdkConfig,
    sts: aws_sdk_sts::Client,
    role_name: String,
    session_name: String,
}

impl AwsRoleConnector {
    pub fn new(base: SdkConfig, role_name: impl Into<String>, session_name: impl Into<String>) -> Self {
        let sts = aws_sdk_sts::Client::new(&base);
        Self {
            base,
            sts,
            role_name: role_name.into(),
            session_name: session_name.into(),
        }
    }

    #[must_use]
    pub fn role_arn(&self, account_id: &str) -> String {
        role_arn(account_id, &self.role_name)
    }
}

/// IAM role ARN of `role_name` in `account_id`
#[must_use]
pub fn role_arn(account_id: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{account_id}:role/{role_name}")
}

#[async_trait]
impl TargetConnector for AwsRoleConnector {
    async fn connect(&self, location: &TargetLocation) -> Result<Arc<dyn TargetSecretStore>> {
        let role_arn = self.role_arn(&location.account_id);
        debug!(role_arn = %role_arn, "Assuming role");

        let response = self
            .sts
            .assume_role()
            .role_arn(&role_arn)
            .role_session_name(&self.session_name)
            .send()
            .await
            .with_context(|| format!("Failed to assume role {role_arn}"))?;

        let assumed = response
            .credentials()
            .with_context(|| format!("AssumeRole for {role_arn} returned no credentials"))?;

        let credentials = Credentials::new(
            assumed.access_key_id(),
            assumed.secret_access_key(),
            Some(assumed.session_token().to_string()),
            SystemTime::try_from(*assumed.expiration()).ok(),
            CREDENTIALS_PROVIDER_NAME,
        );

        let mut builder =
            aws_sdk_secretsmanager::config::Builder::from(&self.base).credentials_provider(credentials);
        if let Some(region) = &location.region {
            builder = builder.region(Region::new(region.clone()));
        }
        let client = SecretsManagerClient::from_conf(builder.build());

        info!(
            account_id = %location.account_id,
            region = location.region.as_deref().unwrap_or("default"),
            "Assumed role {} in account {}",
            self.role_name,
            location.account_id
        );
        Ok(Arc::new(AwsTargetStore::new(client, location.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_arn_format() {
        assert_eq!(
            role_arn("123456789012", "SecretSyncRole"),
            "arn:aws:iam::123456789012:role/SecretSyncRole"
        );
    }
}
