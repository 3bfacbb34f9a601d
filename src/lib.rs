//! Secret Sync Library
//!
//! Replicates secrets from a management AWS account into target accounts,
//! driven by tags on the source secrets plus a policy document.
//!
//! ## Quick Start
//!
//! ```rust
//! use secret_sync::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod observability;
pub mod policy;
pub mod prelude;
pub mod provider;
