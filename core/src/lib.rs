//! PortKill Core Library
//!
//! Cross-platform library for finding the processes that listen on a TCP
//! port and terminating them safely.
//! Provides functionality to:
//! - List the processes bound to a port
//! - Kill processes by PID (gracefully, escalating to forceful)
//! - Track scan/kill cycles so kills only target freshly scanned PIDs
//!
//! # Architecture
//! This library follows hexagonal architecture (ports & adapters):
//! - `domain`: Pure business logic and data models
//! - `ports`: Trait definitions (interfaces)
//! - `adapters`: External system implementations
//! - `application`: Use case services
//!
//! # Platform Support
//! - macOS: Uses `lsof` and `ps` commands
//! - Linux: Reads `/proc/net/tcp{,6}` and `/proc/<pid>`
//! - Windows: Uses the IP Helper API and `tasklist`/`taskkill`

// Hexagonal architecture layers
pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;

pub mod config;
pub mod engine;
pub mod error;

#[cfg(test)]
mod testing;

// Re-export domain types (primary API)
pub use domain::{
    common_ports, KillFailure, KillOutcome, KillReport, KillResult, ListeningSocket, Pid, Port,
    ProcessInfo, COMMON_PORTS, UNKNOWN,
};

// Re-export other commonly used types
pub use adapters::PlatformBackend;
pub use application::{parse_pids, PortScanService, ProcessTerminator};
pub use config::{Config, ConfigStore, KillPolicy, ScanSettings};
pub use engine::{ClearReport, CycleState, PortKillerEngine, ScanReport, ScanTicket};
pub use error::{Error, Result};
pub use ports::Platform;
pub use tokio_util::sync::CancellationToken;
