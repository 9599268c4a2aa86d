//! Ports command - show the common development ports.

use std::process::ExitCode;

use anyhow::Result;
use portkill_core::PortKillerEngine;

pub fn run(engine: &PortKillerEngine, json: bool) -> Result<ExitCode> {
    let ports = engine.scan_common_ports();

    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
    } else {
        for port in ports {
            println!("{}", port);
        }
    }

    Ok(ExitCode::SUCCESS)
}
