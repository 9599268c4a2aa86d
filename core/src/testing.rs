//! In-memory backend used by the service and engine tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::domain::{ListeningSocket, Pid, Port, ProcessInfo};
use crate::error::{Error, Result};
use crate::ports::{ProcessResolver, Signal, Signaller, SocketTable};

/// Simulated OS process table.
///
/// Processes exit on SIGTERM unless marked lingering, and always on SIGKILL.
/// Every trait call counts as one OS call.
#[derive(Default)]
pub(crate) struct FakeBackend {
    sockets: Mutex<Vec<ListeningSocket>>,
    processes: Mutex<HashMap<Pid, ProcessInfo>>,
    lingering: Mutex<HashSet<Pid>>,
    denied: Mutex<HashSet<Pid>>,
    protected: Mutex<Vec<Pid>>,
    signals: Mutex<Vec<(Pid, Signal)>>,
    os_calls: AtomicUsize,
}

pub(crate) fn pid(n: u32) -> Pid {
    Pid::new(n).unwrap()
}

pub(crate) fn port(n: u16) -> Port {
    Port::new(n).unwrap()
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A process listening on `port`.
    pub fn listening(self, port_number: u16, pid_number: u32, command: &str, user: &str) -> Self {
        let p = pid(pid_number);
        self.sockets
            .lock()
            .push(ListeningSocket::owned(port(port_number), p, "*"));
        self.processes
            .lock()
            .insert(p, ProcessInfo::new(p, command, user));
        self
    }

    /// A socket whose owner exits before it can be resolved.
    pub fn orphan_socket(self, port_number: u16, pid_number: u32) -> Self {
        self.sockets
            .lock()
            .push(ListeningSocket::owned(port(port_number), pid(pid_number), "*"));
        self
    }

    /// A socket whose owner is hidden from the caller.
    pub fn hidden_socket(self, port_number: u16) -> Self {
        self.sockets
            .lock()
            .push(ListeningSocket::unattributed(port(port_number), "*"));
        self
    }

    /// Process ignores SIGTERM.
    pub fn lingering(self, pid_number: u32) -> Self {
        self.lingering.lock().insert(pid(pid_number));
        self
    }

    /// Signalling this process fails with EPERM.
    pub fn denied(self, pid_number: u32) -> Self {
        self.denied.lock().insert(pid(pid_number));
        self
    }

    pub fn protecting(self, pid_number: u32) -> Self {
        self.protected.lock().push(pid(pid_number));
        self
    }

    /// Simulate a process exiting on its own.
    pub fn exit(&self, p: Pid) {
        self.processes.lock().remove(&p);
        self.sockets.lock().retain(|s| s.pid != Some(p));
    }

    pub fn os_calls(&self) -> usize {
        self.os_calls.load(Ordering::SeqCst)
    }

    pub fn signals(&self) -> Vec<(Pid, Signal)> {
        self.signals.lock().clone()
    }

    fn tick(&self) {
        self.os_calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl SocketTable for FakeBackend {
    async fn list_listening_sockets(&self) -> Result<Vec<ListeningSocket>> {
        self.tick();
        Ok(self.sockets.lock().clone())
    }
}

impl ProcessResolver for FakeBackend {
    async fn lookup(&self, p: Pid) -> Result<ProcessInfo> {
        self.tick();
        self.processes
            .lock()
            .get(&p)
            .cloned()
            .ok_or(Error::NotFound(p.get()))
    }
}

impl Signaller for FakeBackend {
    async fn signal(&self, p: Pid, signal: Signal) -> Result<()> {
        self.tick();
        if !self.processes.lock().contains_key(&p) {
            return Err(Error::NotFound(p.get()));
        }
        if self.denied.lock().contains(&p) {
            return Err(Error::PermissionDenied(format!("process {}", p)));
        }
        self.signals.lock().push((p, signal));
        if signal == Signal::Kill || !self.lingering.lock().contains(&p) {
            self.exit(p);
        }
        Ok(())
    }

    async fn is_running(&self, p: Pid) -> bool {
        self.tick();
        self.processes.lock().contains_key(&p)
    }

    fn protected_pids(&self) -> Vec<Pid> {
        let mut pids = vec![Pid::current()];
        pids.extend(self.protected.lock().iter().copied());
        pids
    }
}
