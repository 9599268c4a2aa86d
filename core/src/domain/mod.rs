//! Domain layer - Pure business logic and data models.
//!
//! This module contains domain entities that represent core business concepts.
//! These types have no I/O dependencies and can be tested in isolation.

mod kill;
mod port;
mod process;

// Re-export all domain types
pub use kill::{KillFailure, KillOutcome, KillReport, KillResult};
pub use port::{common_ports, Port, COMMON_PORTS};
pub use process::{ListeningSocket, Pid, ProcessInfo, UNKNOWN};
