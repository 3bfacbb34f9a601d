//! # Run Report
//!
//! Counters accumulated over one run and logged as the final summary.

use crate::controller::propagation::TargetOutcome;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub secrets_discovered: usize,
    /// Secrets that reached at least one target action
    pub secrets_processed: usize,
    /// Secrets that resolved to no targets
    pub secrets_skipped: usize,
    /// Secrets abandoned before any target action (resolution, describe, read)
    pub secrets_failed: usize,
    /// Target outcomes keyed by [`TargetOutcome::as_str`]
    pub target_outcomes: BTreeMap<&'static str, usize>,
    pub target_failures: usize,
    pub orphans_retired: usize,
    pub cleanup_failures: usize,
}

impl RunReport {
    pub fn record_outcome(&mut self, outcome: TargetOutcome) {
        *self.target_outcomes.entry(outcome.as_str()).or_default() += 1;
    }

    #[must_use]
    pub fn outcome_count(&self, label: &str) -> usize {
        self.target_outcomes.get(label).copied().unwrap_or(0)
    }

    /// Whether every unit of work in the run succeeded
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.secrets_failed == 0 && self.target_failures == 0 && self.cleanup_failures == 0
    }
}
