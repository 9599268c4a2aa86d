//! UniFFI bindings for portkill-core library.
//!
//! This crate provides FFI bindings that can be used from Swift or Kotlin.
//! The main entry point is `RustEngine` which wraps `PortKillerEngine`.
//! Every error crosses the boundary as a flat error carrying its message.

use std::sync::Arc;

use portkill_core::{ConfigStore, Error as CoreError, PortKillerEngine, ProcessInfo};
use tokio::runtime::Builder;

uniffi::setup_scaffolding!();

/// Error type exposed via FFI.
#[derive(Debug, thiserror::Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum RustEngineError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    ScanFailed(String),

    #[error("{0}")]
    KillFailed(String),

    #[error("{0}")]
    ConfigError(String),
}

impl From<CoreError> for RustEngineError {
    fn from(e: CoreError) -> Self {
        let msg = e.to_string();
        match e {
            CoreError::InvalidInput(_) => RustEngineError::InvalidInput(msg),
            CoreError::PermissionDenied(_) => RustEngineError::PermissionDenied(msg),
            CoreError::TotalFailure(_)
            | CoreError::NotFound(_)
            | CoreError::StaleScan(_)
            | CoreError::KillInProgress(_) => RustEngineError::KillFailed(msg),
            CoreError::Config(_) | CoreError::Json(_) => RustEngineError::ConfigError(msg),
            _ => RustEngineError::ScanFailed(msg),
        }
    }
}

/// Process information exposed to Swift.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct RustProcessInfo {
    pub pid: String,
    pub command: String,
    pub user: String,
}

impl From<ProcessInfo> for RustProcessInfo {
    fn from(p: ProcessInfo) -> Self {
        Self {
            pid: p.pid.to_string(),
            command: p.command,
            user: p.user,
        }
    }
}

/// The common development ports, in display order.
#[uniffi::export]
pub fn scan_common_ports() -> Vec<u16> {
    portkill_core::common_ports().iter().map(|p| p.get()).collect()
}

/// Main engine interface exposed via FFI.
#[derive(uniffi::Object)]
pub struct RustEngine {
    engine: PortKillerEngine,
}

#[uniffi::export(async_runtime = "tokio")]
impl RustEngine {
    /// Create an engine configured from `~/.portkiller/config.json`.
    ///
    /// Must not be called from inside an async runtime.
    #[uniffi::constructor]
    pub fn new() -> Result<Arc<Self>, RustEngineError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| RustEngineError::ConfigError(format!("Failed to create runtime: {}", e)))?;

        let store = ConfigStore::new()?;
        let config = runtime.block_on(store.load())?;
        tracing::debug!(path = %store.path().display(), "Engine configured");

        Ok(Arc::new(Self {
            engine: PortKillerEngine::with_config(config),
        }))
    }

    /// Create an engine with built-in defaults, ignoring any config file.
    #[uniffi::constructor]
    pub fn with_defaults() -> Arc<Self> {
        Arc::new(Self {
            engine: PortKillerEngine::new(),
        })
    }

    pub fn scan_common_ports(&self) -> Vec<u16> {
        self.engine.scan_common_ports()
    }

    /// Processes listening on `port`. An empty list means the port is free.
    pub async fn list_processes(&self, port: i64) -> Result<Vec<RustProcessInfo>, RustEngineError> {
        let port = u16::try_from(port)
            .map_err(|_| CoreError::InvalidInput(format!("port {} is out of range", port)))?;
        let processes = self.engine.list_processes(port).await?;
        Ok(processes.into_iter().map(Into::into).collect())
    }

    /// Kill the given PIDs and return the summary message.
    pub async fn kill_pids(&self, pids: Vec<String>) -> Result<String, RustEngineError> {
        Ok(self.engine.kill_pids(&pids).await?)
    }

    /// Kill everything listening on the common development ports.
    pub async fn clear_common_ports(&self) -> Result<String, RustEngineError> {
        Ok(self.engine.clear_common_ports().await?)
    }
}
