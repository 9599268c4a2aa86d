//! Socket table reader port (interface).

use tracing::warn;

use crate::domain::{ListeningSocket, Pid, Port};
use crate::error::{Error, Result};

/// Port for enumerating listening TCP sockets.
///
/// Implementations handle platform-specific details (procfs, lsof, IP Helper).
/// Only sockets in the listening state are reported, never established
/// connections. Reading the table has no side effects.
pub trait SocketTable: Send + Sync {
    /// Enumerate all listening sockets, in kernel enumeration order.
    fn list_listening_sockets(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ListeningSocket>>> + Send;

    /// PIDs listening on `port`, deduplicated, in enumeration order.
    ///
    /// Fails with `PermissionDenied` when the port has listeners but none of
    /// them can be attributed to a process visible to the caller.
    fn sockets_for_port(
        &self,
        port: Port,
    ) -> impl std::future::Future<Output = Result<Vec<Pid>>> + Send {
        async move {
            let sockets = self.list_listening_sockets().await?;
            pids_for_port(&sockets, port)
        }
    }
}

/// Select the owners of `port` from a socket table snapshot.
pub fn pids_for_port(sockets: &[ListeningSocket], port: Port) -> Result<Vec<Pid>> {
    let mut pids = Vec::new();
    let mut hidden = 0usize;

    for socket in sockets.iter().filter(|s| s.port == port) {
        match socket.pid {
            Some(pid) if !pids.contains(&pid) => pids.push(pid),
            Some(_) => {}
            None => hidden += 1,
        }
    }

    if hidden > 0 {
        if pids.is_empty() {
            return Err(Error::PermissionDenied(format!(
                "port {} is held by {} socket(s) whose owner is not visible to this user",
                port, hidden
            )));
        }
        warn!(port = port.get(), hidden, "Some listeners on port are owned by other users");
    }

    Ok(pids)
}
