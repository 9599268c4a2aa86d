//! Adapters layer - External system implementations.
//!
//! This module contains the per-OS implementations of the capability traits
//! defined in `ports`. `PlatformBackend` picks the one for the host OS at
//! compile time so no other module needs platform conditionals.

#[cfg(target_os = "macos")]
mod darwin;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "windows")]
mod windows;

#[cfg(unix)]
mod unix;

mod unsupported;

#[cfg(any(target_os = "macos", test))]
mod utils;

#[cfg(target_os = "linux")]
pub use linux::LinuxBackend;

#[cfg(target_os = "macos")]
pub use darwin::DarwinBackend;

#[cfg(target_os = "windows")]
pub use windows::WindowsBackend;

pub use unsupported::UnsupportedBackend;

use crate::domain::{ListeningSocket, Pid, Port, ProcessInfo};
use crate::error::Result;
use crate::ports::{ProcessResolver, Signal, Signaller, SocketTable};

/// The backend for the current platform.
#[derive(Debug, Clone, Default)]
pub struct PlatformBackend {
    #[cfg(target_os = "macos")]
    inner: darwin::DarwinBackend,

    #[cfg(target_os = "linux")]
    inner: linux::LinuxBackend,

    #[cfg(target_os = "windows")]
    inner: windows::WindowsBackend,

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    inner: unsupported::UnsupportedBackend,
}

impl PlatformBackend {
    /// Create the backend for the current platform.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SocketTable for PlatformBackend {
    async fn list_listening_sockets(&self) -> Result<Vec<ListeningSocket>> {
        self.inner.list_listening_sockets().await
    }

    async fn sockets_for_port(&self, port: Port) -> Result<Vec<Pid>> {
        self.inner.sockets_for_port(port).await
    }
}

impl ProcessResolver for PlatformBackend {
    async fn lookup(&self, pid: Pid) -> Result<ProcessInfo> {
        self.inner.lookup(pid).await
    }
}

impl Signaller for PlatformBackend {
    async fn signal(&self, pid: Pid, signal: Signal) -> Result<()> {
        self.inner.signal(pid, signal).await
    }

    async fn is_running(&self, pid: Pid) -> bool {
        self.inner.is_running(pid).await
    }

    fn protected_pids(&self) -> Vec<Pid> {
        self.inner.protected_pids()
    }
}
