//! # Controller
//!
//! Resolution and replication logic.
//!
//! - `tags`: classify a secret's tags into directives
//! - `resolver`: turn directives plus policy into sync and delete targets
//! - `recovery`: bounded soft-delete windows
//! - `propagation`: single-target create/update/restore/delete actions
//! - `orchestrator`: the per-run loop over discovered secrets
//! - `cleanup`: retire owned secrets no longer declared managed
//! - `report`: run summary counters

pub mod cleanup;
pub mod orchestrator;
pub mod propagation;
pub mod recovery;
pub mod report;
pub mod resolver;
pub mod tags;

pub use orchestrator::{Replicator, ReplicatorSettings};
pub use report::RunReport;
