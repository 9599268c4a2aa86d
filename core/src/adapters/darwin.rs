//! macOS backend using lsof and ps.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::domain::{ListeningSocket, Pid, Port, ProcessInfo};
use crate::error::{Error, Result};
use crate::ports::{ProcessResolver, Signal, Signaller, SocketTable};

use super::{unix, utils};

/// macOS-specific backend.
#[derive(Debug, Default, Clone)]
pub struct DarwinBackend;

impl DarwinBackend {
    /// Create a new macOS backend.
    pub fn new() -> Self {
        Self
    }

    /// Parse `lsof -F pn` field output.
    ///
    /// Each process starts with a `p<pid>` line, followed by one `f<fd>` and
    /// one `n<address>` line per socket:
    /// ```text
    /// p34805
    /// f19
    /// n[::1]:3000
    /// ```
    fn parse_lsof_fields(output: &str) -> Vec<ListeningSocket> {
        let mut sockets: Vec<ListeningSocket> = Vec::new();
        let mut current: Option<Pid> = None;

        for line in output.lines() {
            let mut chars = line.chars();
            let Some(tag) = chars.next() else {
                continue;
            };
            let value = chars.as_str();

            match tag {
                'p' => current = value.parse().ok(),
                'n' => {
                    let Some(pid) = current else {
                        continue;
                    };
                    let Some((address, port)) = utils::parse_address(value) else {
                        continue;
                    };
                    let Ok(port) = Port::new(port) else {
                        continue;
                    };
                    // Deduplicate by (port, pid)
                    if sockets.iter().any(|s| s.port == port && s.pid == Some(pid)) {
                        continue;
                    }
                    sockets.push(ListeningSocket::owned(port, pid, address));
                }
                _ => {}
            }
        }

        sockets
    }

    /// Parse `ps -o user=,comm=` output: the user, whitespace, then the executable path.
    fn parse_ps_line(pid: Pid, output: &str) -> Option<ProcessInfo> {
        let line = output.lines().find(|l| !l.trim().is_empty())?.trim();
        let (user, command) = match line.split_once(char::is_whitespace) {
            Some((user, command)) => (user, command.trim()),
            None => ("", line),
        };
        let name = Path::new(command)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(command);
        Some(ProcessInfo::new(pid, name, user))
    }
}

impl SocketTable for DarwinBackend {
    /// Executes: `lsof -nP -iTCP -sTCP:LISTEN -F pn`
    async fn list_listening_sockets(&self) -> Result<Vec<ListeningSocket>> {
        let output = Command::new("/usr/sbin/lsof")
            .args(["-nP", "-iTCP", "-sTCP:LISTEN", "-F", "pn"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::CommandFailed(format!("Failed to run lsof: {}", e)))?;

        // lsof returns exit code 1 when nothing matches, which is not an error
        if !output.status.success() && !output.stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CommandFailed(format!("lsof failed: {}", stderr.trim())));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| Error::ParseError(format!("Invalid UTF-8 in lsof output: {}", e)))?;

        let sockets = Self::parse_lsof_fields(&stdout);
        debug!(count = sockets.len(), "Read lsof socket table");
        Ok(sockets)
    }
}

impl ProcessResolver for DarwinBackend {
    /// Executes: `ps -o user=,comm= -p <pid>`
    async fn lookup(&self, pid: Pid) -> Result<ProcessInfo> {
        let output = Command::new("/bin/ps")
            .args(["-o", "user=,comm=", "-p", &pid.to_string()])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::LookupError(format!("Failed to run ps: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);

        // ps -p exits with 1 and prints nothing for a missing process
        match Self::parse_ps_line(pid, &stdout) {
            Some(info) => Ok(info),
            None if !output.status.success() => Err(Error::NotFound(pid.get())),
            None => Err(Error::LookupError(format!(
                "ps returned no data for process {}",
                pid
            ))),
        }
    }
}

impl Signaller for DarwinBackend {
    async fn signal(&self, pid: Pid, signal: Signal) -> Result<()> {
        unix::send_signal(pid, signal)
    }

    async fn is_running(&self, pid: Pid) -> bool {
        unix::is_running(pid)
    }

    fn protected_pids(&self) -> Vec<Pid> {
        unix::protected_pids()
    }
}
