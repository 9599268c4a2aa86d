//! Free command - scan a port, confirm, and kill what was shown.

use std::process::ExitCode;

use anyhow::{bail, Result};
use dialoguer::Confirm;
use portkill_core::{Port, PortKillerEngine};

pub async fn run(engine: &PortKillerEngine, port: u16, yes: bool, json: bool) -> Result<ExitCode> {
    let port = Port::new(port)?;
    let scan = engine.scan(port).await?;

    if scan.processes.is_empty() {
        if json {
            println!("{}", serde_json::to_string_pretty(&scan.processes)?);
        } else {
            println!("Nothing is listening on port {}.", port);
        }
        return Ok(ExitCode::SUCCESS);
    }

    if !json {
        super::list::print_table(&scan.processes);
    }

    if !yes {
        if !atty::is(atty::Stream::Stdin) {
            bail!("stdin is not a terminal; pass --yes to kill without confirmation");
        }

        engine.begin_confirmation(&scan.ticket)?;
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Kill {} process(es) on port {}?",
                scan.processes.len(),
                port
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            engine.cancel_confirmation(&scan.ticket);
            println!("Aborted.");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let report = engine.kill_scanned(&scan.ticket).await?;
    super::kill::print_report(&report, json)
}
