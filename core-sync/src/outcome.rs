//! Pass results reported to the host.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassMode {
    /// No change cursor was stored; every remote object was listed.
    Full,
    Incremental,
}

impl PassMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassMode::Full => "full",
            PassMode::Incremental => "incremental",
        }
    }
}

/// Counters of a single successful pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub pass_id: String,
    pub mode: PassMode,
    /// New local tracks created from remote objects
    pub imported: u64,
    /// Local tracks overwritten by newer remote content
    pub pulled: u64,
    /// Remote objects overwritten by newer local content
    pub pushed: u64,
    /// Local tracks whose remote counterpart became invalid
    pub remote_ids_cleared: u64,
    pub deleted_locally: u64,
    /// Queued deletions carried out on the remote
    pub remote_deletions: u64,
    /// Queued deletions that failed transiently and stay queued
    pub deletions_kept: u64,
    pub exported: u64,
    /// Objects left untouched after a per-object failure
    pub skipped: u64,
    /// Change cursor persisted by this pass
    pub watermark: Option<i64>,
    pub duration_ms: u64,
}

impl SyncReport {
    pub fn new(pass_id: impl Into<String>, mode: PassMode) -> Self {
        Self {
            pass_id: pass_id.into(),
            mode,
            imported: 0,
            pulled: 0,
            pushed: 0,
            remote_ids_cleared: 0,
            deleted_locally: 0,
            remote_deletions: 0,
            deletions_kept: 0,
            exported: 0,
            skipped: 0,
            watermark: None,
            duration_ms: 0,
        }
    }

    /// True when the pass changed nothing on either side.
    pub fn is_quiet(&self) -> bool {
        self.imported
            + self.pulled
            + self.pushed
            + self.remote_ids_cleared
            + self.deleted_locally
            + self.remote_deletions
            + self.exported
            == 0
    }
}

/// What a caller of [`SyncCoordinator::run`](crate::SyncCoordinator::run) acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Success(SyncReport),
    /// Only the user can unblock the account. Present `action_handle`.
    AuthRequired { action_handle: String },
    /// Try again on the next schedule.
    TransientFailure { message: String },
    /// Retrying will not help without a change on either side.
    FatalFailure { message: String },
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Success(_))
    }

    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Success(report) => Some(report),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_report_is_quiet() {
        let mut report = SyncReport::new("p1", PassMode::Full);
        assert!(report.is_quiet());

        report.skipped = 3;
        report.deletions_kept = 1;
        assert!(report.is_quiet());

        report.pulled = 1;
        assert!(!report.is_quiet());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = SyncOutcome::AuthRequired {
            action_handle: "consent".to_string(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert_eq!(json, r#"{"outcome":"auth_required","action_handle":"consent"}"#);
        assert!(outcome.report().is_none());
    }
}
