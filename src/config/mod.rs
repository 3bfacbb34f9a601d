//! # Configuration
//!
//! Process configuration. The policy document that drives replication lives
//! in [`crate::policy`]; this module only covers how the process itself runs.

pub mod sync;

pub use sync::SyncConfig;
