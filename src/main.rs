//! # Secret Sync
//!
//! Replicates AWS Secrets Manager secrets from a management account into
//! target accounts.
//!
//! ## Overview
//!
//! 1. **Discovery** - finds source secrets carrying `SecretSync-*` tags
//! 2. **Resolution** - expands tags through the policy document into target accounts and regions
//! 3. **Propagation** - creates, updates, restores or schedules deletion in every target
//! 4. **Cleanup** - retires replicas this account owns that are no longer declared
//!
//! ## Usage
//!
//! ```bash
//! # One replication run (the default command)
//! secret-sync run
//!
//! # Preview the targets of a tag set offline
//! secret-sync resolve --tag SecretSync-SyncDestinationGroup=prod --policy-file policy.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secret_sync::config::SyncConfig;
use secret_sync::controller::resolver::resolve_targets;
use secret_sync::controller::{Replicator, ReplicatorSettings};
use secret_sync::observability::{init_logging, metrics};
use secret_sync::policy::PolicyDocument;
use secret_sync::provider::aws::{
    caller_account_id, create_default_config, AwsRoleConnector, AwsSourceStore,
};
use secret_sync::provider::Tag;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Cross-account AWS secret replication
#[derive(Debug, Parser)]
#[command(name = "secret-sync", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Perform one replication run against AWS
    Run {
        /// Region of the management account (overrides SECRET_SYNC_REGION / AWS_REGION)
        #[arg(long)]
        region: Option<String>,

        /// Account id written on the ownership tag (looked up through STS by default)
        #[arg(long)]
        management_account_id: Option<String>,

        /// Write Prometheus metrics to this file at the end of the run
        #[arg(long)]
        metrics_file: Option<PathBuf>,
    },
    /// Resolve the targets of a tag set offline and print them as JSON
    Resolve {
        /// Source tag, repeatable
        #[arg(long = "tag", value_name = "KEY=VALUE", value_parser = parse_tag)]
        tags: Vec<Tag>,

        /// Policy document to resolve group tags against
        #[arg(long)]
        policy_file: Option<PathBuf>,
    },
}

fn parse_tag(raw: &str) -> Result<Tag, String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))?;
    if key.trim().is_empty() {
        return Err(format!("tag key is empty in {raw:?}"));
    }
    Ok(Tag::new(key.trim(), value.trim()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = SyncConfig::from_env();

    match cli.command.unwrap_or(Commands::Run {
        region: None,
        management_account_id: None,
        metrics_file: None,
    }) {
        Commands::Run {
            region,
            management_account_id,
            metrics_file,
        } => {
            if region.is_some() {
                config.region = region;
            }
            if management_account_id.is_some() {
                config.management_account_id = management_account_id;
            }
            if metrics_file.is_some() {
                config.metrics_file = metrics_file;
            }
            init_logging(&config)?;
            run(config).await
        }
        Commands::Resolve { tags, policy_file } => {
            init_logging(&config)?;
            resolve(&tags, policy_file.as_deref())
        }
    }
}

async fn run(config: SyncConfig) -> Result<()> {
    info!(
        build_timestamp = env!("BUILD_TIMESTAMP"),
        "Starting secret-sync (build {} at {})",
        env!("BUILD_GIT_HASH"),
        env!("BUILD_DATETIME")
    );
    metrics::register_metrics()?;

    let sdk_config = create_default_config(config.region.as_deref()).await;
    let management_account_id = match config.management_account_id.clone() {
        Some(id) => id,
        None => caller_account_id(&sdk_config)
            .await
            .context("Failed to determine the management account id")?,
    };
    info!(
        management_account_id = %management_account_id,
        role_name = %config.role_name,
        policy_secret_id = %config.policy_secret_id,
        "Configuration loaded"
    );

    let default_region = sdk_config.region().map(ToString::to_string);
    let source = Arc::new(AwsSourceStore::from_config(&sdk_config));
    let connector = Arc::new(AwsRoleConnector::new(
        sdk_config,
        config.role_name.clone(),
        config.session_name.clone(),
    ));
    let replicator = Replicator::new(
        source,
        connector,
        ReplicatorSettings {
            management_account_id,
            policy_secret_id: config.policy_secret_id.clone(),
            max_concurrent_targets: config.max_concurrent_targets,
            default_region,
        },
    );

    let outcome = replicator.run().await;

    if let Some(path) = &config.metrics_file {
        if let Err(e) = metrics::write_textfile(path) {
            error!("Failed to write metrics file: {e:#}");
        }
    }

    let report = outcome.context("Replication run aborted")?;
    if !report.is_clean() {
        info!("Run finished with per-secret or per-target failures; see the log above");
    }
    Ok(())
}

fn resolve(tags: &[Tag], policy_file: Option<&std::path::Path>) -> Result<()> {
    let policy = policy_file
        .map(|path| {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read policy file {}", path.display()))?;
            PolicyDocument::from_json(&raw)
                .with_context(|| format!("Policy file {} is not a valid policy", path.display()))
        })
        .transpose()?;

    let targets = resolve_targets(tags, policy.as_ref())?;
    println!("{}", serde_json::to_string_pretty(&targets)?);
    Ok(())
}
