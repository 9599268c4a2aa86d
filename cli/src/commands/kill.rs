//! Kill command - terminate processes by PID.

use std::process::ExitCode;

use anyhow::Result;
use portkill_core::{parse_pids, KillOutcome, KillReport, PortKillerEngine};
use serde_json::json;

pub async fn run(engine: &PortKillerEngine, pids: &[String], json: bool) -> Result<ExitCode> {
    let pids = parse_pids(pids)?;
    let report = engine.kill(&pids).await?;
    print_report(&report, json)
}

/// Print a kill summary. Exits non-zero when any PID failed.
pub fn print_report(report: &KillReport, json: bool) -> Result<ExitCode> {
    if json {
        let body = json!({
            "message": report.message(),
            "outcome": report.outcome(),
            "results": report.results(),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("{}", report.message());
    }

    Ok(match report.outcome() {
        KillOutcome::Nothing | KillOutcome::Success => ExitCode::SUCCESS,
        KillOutcome::PartialFailure | KillOutcome::TotalFailure => ExitCode::FAILURE,
    })
}
