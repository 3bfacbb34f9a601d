//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use secret_sync::prelude::*;
//! ```
//!
//! This brings into scope:
//! - The replicator and its settings and report
//! - Provider traits and the data types crossing them
//! - Policy and resolution types
//! - Config and error types

// Replicator - core functionality
pub use crate::controller::resolver::{resolve_targets, DeleteTarget, ResolvedTargets, SyncTarget};
pub use crate::controller::{Replicator, ReplicatorSettings, RunReport};

// Provider traits - needed for implementing stores
pub use crate::provider::{
    DiscoveredSecret, SourceSecret, SourceSecretStore, SourceState, Tag, TargetConnector,
    TargetLocation, TargetSecret, TargetSecretStore,
};

// Policy types
pub use crate::policy::{AccountGroup, PolicyDocument};

// Config types
pub use crate::config::SyncConfig;

// Common error types
pub use crate::error::{PolicyError, ResolutionError, RunError};
