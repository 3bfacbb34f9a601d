//! # Recovery Window
//!
//! Grace period used when a secret is soft-deleted in a target account.
//! Secrets Manager only accepts windows between 7 and 30 days, so the type
//! cannot hold anything outside that range.

use crate::constants::{MAX_RECOVERY_WINDOW_DAYS, MIN_RECOVERY_WINDOW_DAYS};
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RecoveryWindow(i64);

impl RecoveryWindow {
    pub const MIN: Self = Self(MIN_RECOVERY_WINDOW_DAYS);
    pub const MAX: Self = Self(MAX_RECOVERY_WINDOW_DAYS);

    /// Clamp any day count into the accepted range
    #[must_use]
    pub fn clamped(days: i64) -> Self {
        Self(days.clamp(MIN_RECOVERY_WINDOW_DAYS, MAX_RECOVERY_WINDOW_DAYS))
    }

    /// Window to apply in a target when the source secret is pending deletion
    ///
    /// `never_delete` forces the minimum window. Otherwise the source's own
    /// window (whole days between request and scheduled deletion) is reused,
    /// and the maximum applies when either timestamp is unknown.
    #[must_use]
    pub fn compute(
        deletion_date: Option<DateTime<Utc>>,
        deleted_at: Option<DateTime<Utc>>,
        never_delete: bool,
    ) -> Self {
        if never_delete {
            return Self::MIN;
        }
        match (deletion_date, deleted_at) {
            (Some(deletion_date), Some(deleted_at)) => {
                Self::clamped((deletion_date - deleted_at).num_days())
            }
            _ => Self::MAX,
        }
    }

    #[must_use]
    pub fn days(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecoveryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.0)
    }
}
