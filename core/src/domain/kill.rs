//! Kill results and batch summaries.

use serde::Serialize;
use thiserror::Error as ThisError;

use super::Pid;
use crate::error::{Error, Result};

/// Why a single PID could not be terminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ThisError)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum KillFailure {
    #[error("process not found")]
    NotFound,

    #[error("permission denied")]
    PermissionDenied,

    /// The PID belongs to the caller or to a process that must never be signalled.
    #[error("refusing to terminate {0}")]
    Protected(String),

    #[error("{0}")]
    Failed(String),
}

impl From<Error> for KillFailure {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound(_) => KillFailure::NotFound,
            Error::PermissionDenied(_) => KillFailure::PermissionDenied,
            other => KillFailure::Failed(other.to_string()),
        }
    }
}

/// Outcome of terminating one PID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KillResult {
    pub pid: Pid,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<KillFailure>,
}

impl KillResult {
    pub fn succeeded(pid: Pid) -> Self {
        Self {
            pid,
            succeeded: true,
            error: None,
        }
    }

    pub fn failed(pid: Pid, failure: KillFailure) -> Self {
        Self {
            pid,
            succeeded: false,
            error: Some(failure),
        }
    }

    /// Human-readable failure reason, if any.
    pub fn error_detail(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// Aggregate classification of a kill batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum KillOutcome {
    /// The batch was empty.
    Nothing,
    /// Every PID was terminated.
    Success,
    /// At least one PID succeeded and at least one failed.
    PartialFailure,
    /// Every PID failed.
    TotalFailure,
}

/// Ordered per-PID results of one kill batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KillReport {
    results: Vec<KillResult>,
}

impl KillReport {
    pub fn new(results: Vec<KillResult>) -> Self {
        Self { results }
    }

    pub fn results(&self) -> &[KillResult] {
        &self.results
    }

    /// Number of PIDs that were terminated.
    pub fn killed(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded).count()
    }

    /// Results that failed, in batch order.
    pub fn failures(&self) -> impl Iterator<Item = &KillResult> {
        self.results.iter().filter(|r| !r.succeeded)
    }

    pub fn outcome(&self) -> KillOutcome {
        let killed = self.killed();
        match (self.results.len(), killed) {
            (0, _) => KillOutcome::Nothing,
            (total, k) if k == total => KillOutcome::Success,
            (_, 0) => KillOutcome::TotalFailure,
            _ => KillOutcome::PartialFailure,
        }
    }

    /// Per-PID failure reasons, e.g. `222: process not found; 333: permission denied`.
    pub fn failure_details(&self) -> String {
        self.failures()
            .map(|r| format!("{}: {}", r.pid, r.error_detail().unwrap_or_default()))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Single summary message for the caller.
    pub fn message(&self) -> String {
        match self.outcome() {
            KillOutcome::Nothing => "No processes to kill".to_string(),
            KillOutcome::Success => format!("{} processes killed", self.killed()),
            KillOutcome::PartialFailure | KillOutcome::TotalFailure => format!(
                "{} processes killed, {} failed ({})",
                self.killed(),
                self.failures().count(),
                self.failure_details()
            ),
        }
    }

    /// Turn a batch where every PID failed into an error.
    pub fn into_result(self) -> Result<Self> {
        if self.outcome() == KillOutcome::TotalFailure {
            return Err(Error::TotalFailure(self.failure_details()));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u32) -> Pid {
        Pid::new(n).unwrap()
    }

    #[test]
    fn test_empty_report() {
        let report = KillReport::default();
        assert_eq!(report.outcome(), KillOutcome::Nothing);
        assert_eq!(report.message(), "No processes to kill");
    }

    #[test]
    fn test_success_message() {
        let report = KillReport::new(vec![KillResult::succeeded(pid(111))]);
        assert_eq!(report.outcome(), KillOutcome::Success);
        assert_eq!(report.message(), "1 processes killed");
    }

    #[test]
    fn test_partial_message_names_failure() {
        let report = KillReport::new(vec![
            KillResult::succeeded(pid(111)),
            KillResult::failed(pid(222), KillFailure::NotFound),
        ]);
        assert_eq!(report.outcome(), KillOutcome::PartialFailure);
        assert_eq!(
            report.message(),
            "1 processes killed, 1 failed (222: process not found)"
        );
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_total_failure_is_error() {
        let report = KillReport::new(vec![
            KillResult::failed(pid(1), KillFailure::Protected("PID 1".into())),
            KillResult::failed(pid(2), KillFailure::PermissionDenied),
        ]);
        assert_eq!(report.outcome(), KillOutcome::TotalFailure);
        match report.into_result() {
            Err(Error::TotalFailure(detail)) => {
                assert!(detail.contains("1: refusing to terminate PID 1"));
                assert!(detail.contains("2: permission denied"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_failure_from_error() {
        assert_eq!(KillFailure::from(Error::NotFound(9)), KillFailure::NotFound);
        assert_eq!(
            KillFailure::from(Error::PermissionDenied("x".into())),
            KillFailure::PermissionDenied
        );
        assert!(matches!(
            KillFailure::from(Error::CommandFailed("boom".into())),
            KillFailure::Failed(_)
        ));
    }
}
