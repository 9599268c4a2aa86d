//! Fallback backend for operating systems without a socket table reader.

use crate::domain::{ListeningSocket, Pid, ProcessInfo};
use crate::error::{Error, Result};
use crate::ports::{ProcessResolver, Signal, Signaller, SocketTable};

/// Backend that fails every OS query with `UnsupportedPlatform`.
#[derive(Debug, Default, Clone)]
pub struct UnsupportedBackend;

impl UnsupportedBackend {
    pub fn new() -> Self {
        Self
    }

    fn error() -> Error {
        Error::UnsupportedPlatform(std::env::consts::OS.to_string())
    }
}

impl SocketTable for UnsupportedBackend {
    async fn list_listening_sockets(&self) -> Result<Vec<ListeningSocket>> {
        Err(Self::error())
    }
}

impl ProcessResolver for UnsupportedBackend {
    async fn lookup(&self, _pid: Pid) -> Result<ProcessInfo> {
        Err(Self::error())
    }
}

impl Signaller for UnsupportedBackend {
    async fn signal(&self, _pid: Pid, _signal: Signal) -> Result<()> {
        Err(Self::error())
    }

    async fn is_running(&self, _pid: Pid) -> bool {
        false
    }
}
