//! Clear command - kill everything on the common development ports.

use std::process::ExitCode;

use anyhow::{bail, Result};
use dialoguer::Confirm;
use portkill_core::{ClearReport, PortKillerEngine};
use serde_json::json;

pub async fn run(engine: &PortKillerEngine, yes: bool, json: bool) -> Result<ExitCode> {
    if !yes {
        if !atty::is(atty::Stream::Stdin) {
            bail!("stdin is not a terminal; pass --yes to clear without confirmation");
        }

        let ports = engine
            .scan_common_ports()
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let confirmed = Confirm::new()
            .with_prompt(format!("Kill every process listening on {}?", ports))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("Aborted.");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let report = engine.clear().await;
    if json {
        let body = json!({
            "message": report.message(),
            "report": report,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("{}", report.message());
    }

    Ok(exit_code(&report))
}

/// Non-zero when any port or PID failed.
fn exit_code(report: &ClearReport) -> ExitCode {
    if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
