//! Application layer - Use case services.
//!
//! Services are thin orchestrators that:
//! - Accept domain types as inputs
//! - Use ports (traits) for OS access
//! - Return domain types as outputs

mod scan_service;
mod terminator;

pub use scan_service::PortScanService;
pub use terminator::{parse_pids, ProcessTerminator};
