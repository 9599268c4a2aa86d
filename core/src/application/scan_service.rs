//! Port scan service - Resolves the processes listening on a port.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ScanSettings;
use crate::domain::{common_ports, Port, ProcessInfo};
use crate::error::{Error, Result};
use crate::ports::Platform;

/// Service for finding who listens on a port.
///
/// Every scan reads a fresh socket table; nothing is cached between calls.
pub struct PortScanService<B: Platform> {
    backend: Arc<B>,
    settings: ScanSettings,
}

impl<B: Platform> PortScanService<B> {
    pub fn new(backend: Arc<B>, settings: ScanSettings) -> Self {
        Self { backend, settings }
    }

    /// The fixed list of common development ports, in display order.
    pub fn common_ports(&self) -> &'static [Port] {
        common_ports()
    }

    /// Processes listening on `port`, one per PID, in enumeration order.
    pub async fn scan(&self, port: Port) -> Result<Vec<ProcessInfo>> {
        self.scan_with(port, &CancellationToken::new()).await
    }

    /// Like [`scan`](Self::scan), abandoning the work once `cancel` fires.
    ///
    /// A process that exits between enumeration and resolution is reported
    /// with the `"unknown"` placeholder rather than failing the scan.
    pub async fn scan_with(
        &self,
        port: Port,
        cancel: &CancellationToken,
    ) -> Result<Vec<ProcessInfo>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let pids = self.backend.sockets_for_port(port).await?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        debug!(port = port.get(), count = pids.len(), "Resolving listeners");

        let backend = &self.backend;
        let processes: Vec<ProcessInfo> = stream::iter(pids)
            .map(|pid| async move {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                backend.describe(pid).await
            })
            .buffered(self.settings.workers())
            .try_collect()
            .await?;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        Ok(processes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Pid, UNKNOWN};
    use crate::testing::{pid, port, FakeBackend};

    fn service(backend: FakeBackend) -> (Arc<FakeBackend>, PortScanService<FakeBackend>) {
        let backend = Arc::new(backend);
        let service = PortScanService::new(Arc::clone(&backend), ScanSettings::default());
        (backend, service)
    }

    #[tokio::test]
    async fn test_scan_resolves_listener() {
        let (_, service) = service(FakeBackend::new().listening(3000, 111, "node", "alice"));

        let processes = service.scan(port(3000)).await.unwrap();
        assert_eq!(processes, vec![ProcessInfo::new(pid(111), "node", "alice")]);
    }

    #[tokio::test]
    async fn test_scan_free_port_is_empty() {
        let (_, service) = service(FakeBackend::new().listening(3000, 111, "node", "alice"));
        assert!(service.scan(port(9999)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scan_preserves_enumeration_order() {
        let (_, service) = service(
            FakeBackend::new()
                .listening(5173, 30, "vite", "alice")
                .listening(5173, 10, "node", "alice")
                .listening(5173, 20, "bun", "bob"),
        );

        let pids: Vec<Pid> = service
            .scan(port(5173))
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.pid)
            .collect();
        assert_eq!(pids, vec![pid(30), pid(10), pid(20)]);
    }

    #[tokio::test]
    async fn test_vanished_process_is_placeholder() {
        let (_, service) = service(
            FakeBackend::new()
                .listening(3000, 111, "node", "alice")
                .orphan_socket(3000, 222),
        );

        let processes = service.scan(port(3000)).await.unwrap();
        assert_eq!(processes.len(), 2);
        assert_eq!(processes[1].pid, pid(222));
        assert_eq!(processes[1].command, UNKNOWN);
        assert_eq!(processes[1].user, UNKNOWN);
    }

    #[tokio::test]
    async fn test_hidden_owner_is_permission_denied() {
        let (_, service) = service(FakeBackend::new().hidden_socket(8080));
        assert!(matches!(
            service.scan(port(8080)).await,
            Err(Error::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_scan_makes_no_os_calls() {
        let (backend, service) = service(FakeBackend::new().listening(3000, 111, "node", "alice"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(matches!(
            service.scan_with(port(3000), &cancel).await,
            Err(Error::Cancelled)
        ));
        assert_eq!(backend.os_calls(), 0);
    }

    #[test]
    fn test_common_ports_listed() {
        let (_, service) = service(FakeBackend::new());
        let ports: Vec<u16> = service.common_ports().iter().map(|p| p.get()).collect();
        assert_eq!(ports, vec![4200, 4201, 3000, 3001, 5173, 5000, 8080]);
    }
}
