//! Process resolver port (interface).

use tracing::debug;

use crate::domain::{Pid, ProcessInfo};
use crate::error::{Error, Result};

/// Port for turning a PID into a human-readable description.
pub trait ProcessResolver: Send + Sync {
    /// Look up the command name and owning user of `pid`.
    ///
    /// Fails with `NotFound` when the process no longer exists and with
    /// `LookupError` when the OS API itself fails.
    fn lookup(&self, pid: Pid) -> impl std::future::Future<Output = Result<ProcessInfo>> + Send;

    /// Describe `pid`, mapping a vanished process to the `"unknown"` placeholder.
    fn describe(&self, pid: Pid) -> impl std::future::Future<Output = Result<ProcessInfo>> + Send {
        async move {
            match self.lookup(pid).await {
                Err(Error::NotFound(_)) => {
                    debug!(pid = pid.get(), "Process exited before it could be resolved");
                    Ok(ProcessInfo::vanished(pid))
                }
                other => other,
            }
        }
    }
}
