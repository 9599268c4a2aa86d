//! Process signaller port (interface).

use std::fmt;

use crate::domain::Pid;
use crate::error::Result;

/// Termination request strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Ask the process to exit (SIGTERM, `taskkill`).
    Terminate,
    /// Terminate immediately (SIGKILL, `taskkill /F`).
    Kill,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Terminate => write!(f, "SIGTERM"),
            Signal::Kill => write!(f, "SIGKILL"),
        }
    }
}

/// Port for sending termination requests to processes.
pub trait Signaller: Send + Sync {
    /// Deliver `signal` to `pid`.
    ///
    /// Fails with `NotFound` when no such process exists and with
    /// `PermissionDenied` when the caller may not signal it.
    fn signal(
        &self,
        pid: Pid,
        signal: Signal,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Check if a process is still running.
    fn is_running(&self, pid: Pid) -> impl std::future::Future<Output = bool> + Send;

    /// PIDs that must never be signalled from this process.
    fn protected_pids(&self) -> Vec<Pid> {
        vec![Pid::current()]
    }
}
