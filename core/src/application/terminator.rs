//! Process terminator - Sends termination requests to a batch of PIDs.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::KillPolicy;
use crate::domain::{KillFailure, KillReport, KillResult, Pid};
use crate::error::{Error, Result};
use crate::ports::{Platform, Signal};

/// Parse a batch of decimal PID strings.
///
/// The whole batch is rejected if any entry is malformed, so a typo never
/// results in a partial kill. Duplicates are dropped, keeping first occurrence.
pub fn parse_pids<S: AsRef<str>>(raw: &[S]) -> Result<Vec<Pid>> {
    let mut pids = Vec::with_capacity(raw.len());
    for value in raw {
        let pid: Pid = value.as_ref().parse()?;
        if !pids.contains(&pid) {
            pids.push(pid);
        }
    }
    Ok(pids)
}

/// Service that terminates processes according to a [`KillPolicy`].
pub struct ProcessTerminator<B: Platform> {
    backend: Arc<B>,
    policy: KillPolicy,
}

impl<B: Platform> ProcessTerminator<B> {
    pub fn new(backend: Arc<B>, policy: KillPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn policy(&self) -> &KillPolicy {
        &self.policy
    }

    /// Terminate every PID in `pids`.
    ///
    /// Fails with `TotalFailure` only when every PID failed; partial failures
    /// are reported in the returned [`KillReport`].
    pub async fn kill(&self, pids: &[Pid]) -> Result<KillReport> {
        self.kill_with(pids, &CancellationToken::new()).await
    }

    /// Like [`kill`](Self::kill), stopping once `cancel` fires.
    ///
    /// Terminations already in flight run to completion. PIDs not yet
    /// attempted are skipped and the call returns `Cancelled`.
    pub async fn kill_with(&self, pids: &[Pid], cancel: &CancellationToken) -> Result<KillReport> {
        self.run_batch(pids, cancel).await?.into_result()
    }

    /// Run the batch and report every PID, without collapsing a total failure.
    pub async fn run_batch(&self, pids: &[Pid], cancel: &CancellationToken) -> Result<KillReport> {
        let mut unique: Vec<Pid> = Vec::with_capacity(pids.len());
        for pid in pids {
            if !unique.contains(pid) {
                unique.push(*pid);
            }
        }

        if unique.is_empty() {
            debug!("Empty kill batch");
            return Ok(KillReport::default());
        }

        let protected = self.backend.protected_pids();
        let protected = &protected;

        let results: Vec<Option<KillResult>> = stream::iter(unique)
            .map(|pid| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                Some(self.terminate(pid, protected).await)
            })
            .buffered(self.policy.workers())
            .collect()
            .await;

        if cancel.is_cancelled() {
            info!("Kill batch cancelled");
            return Err(Error::Cancelled);
        }

        let report = KillReport::new(results.into_iter().flatten().collect());
        info!(
            killed = report.killed(),
            failed = report.failures().count(),
            "Kill batch finished"
        );
        Ok(report)
    }

    async fn terminate(&self, pid: Pid, protected: &[Pid]) -> KillResult {
        if protected.contains(&pid) {
            warn!(pid = pid.get(), "Refusing to terminate protected process");
            let what = if pid == Pid::current() {
                "the calling process".to_string()
            } else {
                format!("protected process {}", pid)
            };
            return KillResult::failed(pid, KillFailure::Protected(what));
        }

        let first = if self.policy.force {
            Signal::Kill
        } else {
            Signal::Terminate
        };

        if let Err(e) = self.backend.signal(pid, first).await {
            warn!(pid = pid.get(), signal = %first, error = %e, "Failed to signal process");
            return KillResult::failed(pid, e.into());
        }

        if first == Signal::Kill || !self.policy.escalate {
            return KillResult::succeeded(pid);
        }

        if self.wait_for_exit(pid).await {
            return KillResult::succeeded(pid);
        }

        debug!(pid = pid.get(), "Process outlived grace period, escalating");
        match self.backend.signal(pid, Signal::Kill).await {
            Ok(()) => KillResult::succeeded(pid),
            // Exited between the last poll and the forceful signal
            Err(Error::NotFound(_)) => KillResult::succeeded(pid),
            Err(e) => {
                warn!(pid = pid.get(), error = %e, "Failed to escalate");
                KillResult::failed(pid, e.into())
            }
        }
    }

    /// Poll until `pid` exits or the grace period elapses.
    async fn wait_for_exit(&self, pid: Pid) -> bool {
        let deadline = Instant::now() + self.policy.grace_period();
        loop {
            if !self.backend.is_running(pid).await {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            sleep(self.policy.poll_interval().min(deadline - now)).await;
        }
    }
}
