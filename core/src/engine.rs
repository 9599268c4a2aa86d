//! PortKiller Engine - Per-port scan and kill cycles.
//!
//! The engine owns one backend, the scan service and the terminator, and is
//! the surface both the CLI and the FFI bridge talk to. It tracks for every
//! port which scan is current, so a kill only ever targets the PIDs the
//! caller actually saw.
//!
//! # Usage Pattern
//! Call [`PortKillerEngine::scan`] to get a [`ScanReport`], show it, then pass
//! its ticket to [`PortKillerEngine::kill_scanned`]. A ticket is spent by the
//! kill; killing again requires a new scan.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::PlatformBackend;
use crate::application::{parse_pids, PortScanService, ProcessTerminator};
use crate::config::Config;
use crate::domain::{KillReport, Pid, Port, ProcessInfo};
use crate::error::{Error, Result};
use crate::ports::Platform;

/// Where a port is in its scan/kill cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CycleState {
    Idle,
    Scanning,
    Resolved,
    Confirming,
    Killing,
}

/// Handle to one committed scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanTicket {
    pub id: Uuid,
    pub port: Port,
    pub generation: u64,
    pub pids: Vec<Pid>,
}

/// Result of a committed scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub ticket: ScanTicket,
    pub processes: Vec<ProcessInfo>,
}

#[derive(Debug)]
struct Cycle {
    state: CycleState,
    generation: u64,
    ticket: Option<ScanTicket>,
}

impl Cycle {
    fn idle() -> Self {
        Self {
            state: CycleState::Idle,
            generation: 0,
            ticket: None,
        }
    }
}

/// Returns a `Killing` cycle to `Idle` when the kill finishes or is dropped.
struct KillingGuard<'a> {
    cycles: &'a RwLock<HashMap<Port, Cycle>>,
    port: Port,
    generation: u64,
}

impl Drop for KillingGuard<'_> {
    fn drop(&mut self) {
        let mut cycles = self.cycles.write();
        if let Some(cycle) = cycles.get_mut(&self.port) {
            if cycle.generation == self.generation && cycle.state == CycleState::Killing {
                cycle.state = CycleState::Idle;
            }
        }
    }
}

/// Outcome of clearing the common ports.
///
/// Per-PID failures and ports that could not be scanned are kept apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearReport {
    /// Whether any common port had a listener.
    pub found: bool,
    pub killed: usize,
    /// `pid: reason` for every process that could not be terminated.
    pub failed_pids: Vec<String>,
    /// `port N: error` for every port whose scan or kill failed as a whole.
    pub failed_ports: Vec<String>,
}

impl ClearReport {
    /// Nothing failed.
    pub fn is_clean(&self) -> bool {
        self.failed_pids.is_empty() && self.failed_ports.is_empty()
    }

    pub fn message(&self) -> String {
        if self.is_clean() {
            return if self.found {
                "All dev ports cleared".to_string()
            } else {
                "No processes on dev ports".to_string()
            };
        }

        let mut message = if self.failed_pids.is_empty() {
            format!("{} processes killed", self.killed)
        } else {
            format!(
                "{} processes killed, {} failed ({})",
                self.killed,
                self.failed_pids.len(),
                self.failed_pids.join("; ")
            )
        };
        if !self.failed_ports.is_empty() {
            message.push_str(&format!(
                ", {} ports failed ({})",
                self.failed_ports.len(),
                self.failed_ports.join("; ")
            ));
        }
        message
    }
}

/// The main PortKiller engine.
pub struct PortKillerEngine<B: Platform = PlatformBackend> {
    scanner: PortScanService<B>,
    terminator: ProcessTerminator<B>,
    config: Config,

    // Per-port state, never held across an await
    cycles: RwLock<HashMap<Port, Cycle>>,
    generations: AtomicU64,
}

impl PortKillerEngine {
    /// Engine on the host OS backend with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Engine on the host OS backend.
    pub fn with_config(config: Config) -> Self {
        Self::with_backend(Arc::new(PlatformBackend::new()), config)
    }
}

impl Default for PortKillerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Platform> PortKillerEngine<B> {
    pub fn with_backend(backend: Arc<B>, config: Config) -> Self {
        Self {
            scanner: PortScanService::new(Arc::clone(&backend), config.scan.clone()),
            terminator: ProcessTerminator::new(backend, config.kill.clone()),
            config,
            cycles: RwLock::new(HashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current cycle state of `port`.
    pub fn state(&self, port: Port) -> CycleState {
        self.cycles
            .read()
            .get(&port)
            .map(|c| c.state)
            .unwrap_or(CycleState::Idle)
    }

    // MARK: - Scanning

    /// The common development ports, in display order.
    pub fn scan_common_ports(&self) -> Vec<u16> {
        self.scanner.common_ports().iter().map(|p| p.get()).collect()
    }

    /// Processes listening on `port`.
    pub async fn list_processes(&self, port: u16) -> Result<Vec<ProcessInfo>> {
        let port = Port::new(port)?;
        Ok(self.scan(port).await?.processes)
    }

    /// Scan `port` and make the result its current ticket.
    pub async fn scan(&self, port: Port) -> Result<ScanReport> {
        self.scan_with(port, &CancellationToken::new()).await
    }

    /// Like [`scan`](Self::scan), abandoning the work once `cancel` fires.
    ///
    /// Fails with `Superseded` when another scan of the same port started
    /// while this one was running; the newer scan owns the port's state.
    pub async fn scan_with(&self, port: Port, cancel: &CancellationToken) -> Result<ScanReport> {
        let generation = self.start_scan(port)?;

        match self.scanner.scan_with(port, cancel).await {
            Ok(processes) => self.commit_scan(port, generation, processes),
            Err(e) => {
                self.abort_scan(port, generation);
                Err(e)
            }
        }
    }

    fn start_scan(&self, port: Port) -> Result<u64> {
        let mut cycles = self.cycles.write();
        let cycle = cycles.entry(port).or_insert_with(Cycle::idle);

        if cycle.state == CycleState::Killing {
            return Err(Error::KillInProgress(port.get()));
        }

        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        cycle.state = CycleState::Scanning;
        cycle.generation = generation;
        cycle.ticket = None;

        debug!(port = port.get(), generation, "Scan started");
        Ok(generation)
    }

    fn commit_scan(
        &self,
        port: Port,
        generation: u64,
        processes: Vec<ProcessInfo>,
    ) -> Result<ScanReport> {
        let mut cycles = self.cycles.write();
        let cycle = cycles.entry(port).or_insert_with(Cycle::idle);

        if cycle.generation != generation || cycle.state != CycleState::Scanning {
            debug!(port = port.get(), generation, "Discarding superseded scan");
            return Err(Error::Superseded(port.get()));
        }

        let ticket = ScanTicket {
            id: Uuid::new_v4(),
            port,
            generation,
            pids: processes.iter().map(|p| p.pid).collect(),
        };
        cycle.state = CycleState::Resolved;
        cycle.ticket = Some(ticket.clone());

        Ok(ScanReport { ticket, processes })
    }

    fn abort_scan(&self, port: Port, generation: u64) {
        let mut cycles = self.cycles.write();
        if let Some(cycle) = cycles.get_mut(&port) {
            if cycle.generation == generation {
                cycle.state = CycleState::Idle;
            }
        }
    }

    // MARK: - Killing

    /// Mark `ticket` as awaiting the user's confirmation.
    pub fn begin_confirmation(&self, ticket: &ScanTicket) -> Result<()> {
        let mut cycles = self.cycles.write();
        let cycle = Self::current_cycle(&mut cycles, ticket)?;
        cycle.state = CycleState::Confirming;
        Ok(())
    }

    /// Return a confirming cycle to `Resolved` when the user declines.
    pub fn cancel_confirmation(&self, ticket: &ScanTicket) {
        let mut cycles = self.cycles.write();
        if let Ok(cycle) = Self::current_cycle(&mut cycles, ticket) {
            cycle.state = CycleState::Resolved;
        }
    }

    /// Kill the processes of a scan.
    pub async fn kill_scanned(&self, ticket: &ScanTicket) -> Result<KillReport> {
        self.kill_scanned_with(ticket, &CancellationToken::new()).await
    }

    /// Kill the processes of a scan, spending its ticket.
    ///
    /// Fails with `StaleScan` unless `ticket` is the latest committed scan of
    /// its port and has not been used yet.
    pub async fn kill_scanned_with(
        &self,
        ticket: &ScanTicket,
        cancel: &CancellationToken,
    ) -> Result<KillReport> {
        {
            let mut cycles = self.cycles.write();
            let cycle = Self::current_cycle(&mut cycles, ticket)?;
            cycle.state = CycleState::Killing;
            cycle.ticket = None;
        }
        let _killing = KillingGuard {
            cycles: &self.cycles,
            port: ticket.port,
            generation: ticket.generation,
        };

        info!(port = ticket.port.get(), count = ticket.pids.len(), "Killing scanned processes");
        self.terminator.kill_with(&ticket.pids, cancel).await
    }

    fn current_cycle<'a>(
        cycles: &'a mut HashMap<Port, Cycle>,
        ticket: &ScanTicket,
    ) -> Result<&'a mut Cycle> {
        let stale = || {
            Error::StaleScan(format!(
                "port {} must be scanned again before killing",
                ticket.port
            ))
        };

        let cycle = cycles.get_mut(&ticket.port).ok_or_else(stale)?;
        let live = matches!(cycle.state, CycleState::Resolved | CycleState::Confirming);
        let same = cycle.ticket.as_ref().map(|t| t.id) == Some(ticket.id);
        if !live || !same {
            return Err(stale());
        }
        Ok(cycle)
    }

    /// Kill raw PID strings and return the summary message.
    ///
    /// Every PID is validated before anything is signalled.
    pub async fn kill_pids(&self, pids: &[String]) -> Result<String> {
        let pids = parse_pids(pids)?;
        Ok(self.kill(&pids).await?.message())
    }

    /// Kill PIDs without a scan ticket.
    ///
    /// Any resolved cycle whose ticket names one of these PIDs is reset, since
    /// its process list no longer matches the OS.
    pub async fn kill(&self, pids: &[Pid]) -> Result<KillReport> {
        let result = self.terminator.kill(pids).await;

        let mut cycles = self.cycles.write();
        for cycle in cycles.values_mut() {
            let touched = cycle
                .ticket
                .as_ref()
                .is_some_and(|t| t.pids.iter().any(|p| pids.contains(p)));
            if touched {
                cycle.state = CycleState::Idle;
                cycle.ticket = None;
            }
        }

        result
    }

    /// Scan every common port and kill whatever listens there.
    pub async fn clear_common_ports(&self) -> Result<String> {
        Ok(self.clear().await.message())
    }

    /// Like [`clear_common_ports`](Self::clear_common_ports), keeping the details.
    pub async fn clear(&self) -> ClearReport {
        let mut report = ClearReport::default();

        for &port in self.scanner.common_ports() {
            let scan = match self.scan(port).await {
                Ok(scan) => scan,
                Err(e) => {
                    warn!(port = port.get(), error = %e, "Failed to scan port");
                    report.failed_ports.push(format!("port {}: {}", port, e));
                    continue;
                }
            };

            if scan.processes.is_empty() {
                continue;
            }
            report.found = true;

            match self.terminator.run_batch(&scan.ticket.pids, &CancellationToken::new()).await {
                Ok(batch) => {
                    report.killed += batch.killed();
                    report.failed_pids.extend(
                        batch
                            .failures()
                            .map(|r| format!("{}: {}", r.pid, r.error_detail().unwrap_or_default())),
                    );
                }
                Err(e) => report.failed_ports.push(format!("port {}: {}", port, e)),
            }
            self.finish_clear(&scan.ticket);
        }

        info!(
            killed = report.killed,
            failed_pids = report.failed_pids.len(),
            failed_ports = report.failed_ports.len(),
            "Cleared common ports"
        );
        report
    }

    fn finish_clear(&self, ticket: &ScanTicket) {
        let mut cycles = self.cycles.write();
        if let Some(cycle) = cycles.get_mut(&ticket.port) {
            if cycle.generation == ticket.generation {
                cycle.state = CycleState::Idle;
                cycle.ticket = None;
            }
        }
    }
}
