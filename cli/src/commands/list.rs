//! List command - show the processes listening on a port.

use std::process::ExitCode;

use anyhow::Result;
use portkill_core::{PortKillerEngine, ProcessInfo};

pub async fn run(engine: &PortKillerEngine, port: u16, json: bool) -> Result<ExitCode> {
    let processes = engine.list_processes(port).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&processes)?);
        return Ok(ExitCode::SUCCESS);
    }

    if processes.is_empty() {
        println!("Nothing is listening on port {}.", port);
        return Ok(ExitCode::SUCCESS);
    }

    print_table(&processes);
    Ok(ExitCode::SUCCESS)
}

/// Print processes as an aligned table.
pub fn print_table(processes: &[ProcessInfo]) {
    println!("{:<8} {:<16} COMMAND", "PID", "USER");
    println!("{}", "-".repeat(60));

    for process in processes {
        println!(
            "{:<8} {:<16} {}",
            process.pid,
            truncate(&process.user, 16),
            truncate(&process.command, 34)
        );
    }

    println!("\nTotal: {} processes", processes.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 1).collect();
        format!("{}…", head)
    }
}
