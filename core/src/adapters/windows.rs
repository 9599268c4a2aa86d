//! Windows backend.
//!
//! Listening sockets come from the IP Helper API (`GetExtendedTcpTable`),
//! process details from `tasklist /V /FO CSV`, and termination goes through
//! `taskkill`.

use std::ffi::c_void;
use std::net::{Ipv4Addr, Ipv6Addr};

use tokio::process::Command;
use tracing::{debug, warn};
use windows::Win32::Foundation::{ERROR_ACCESS_DENIED, ERROR_INSUFFICIENT_BUFFER, FALSE, NO_ERROR};
use windows::Win32::NetworkManagement::IpHelper::{
    GetExtendedTcpTable, MIB_TCP6ROW_OWNER_PID, MIB_TCP6TABLE_OWNER_PID, MIB_TCPROW_OWNER_PID,
    MIB_TCPTABLE_OWNER_PID, TCP_TABLE_OWNER_PID_LISTENER,
};
use windows::Win32::Networking::WinSock::{AF_INET, AF_INET6};

use crate::domain::{ListeningSocket, Pid, Port, ProcessInfo};
use crate::error::{Error, Result};
use crate::ports::{ProcessResolver, Signal, Signaller, SocketTable};

/// PID of the Windows "System" process.
const SYSTEM_PID: u32 = 4;

/// Windows-specific backend.
#[derive(Debug, Default, Clone)]
pub struct WindowsBackend;

impl WindowsBackend {
    /// Create a new Windows backend.
    pub fn new() -> Self {
        Self
    }

    /// Fetch the listener table for one address family.
    ///
    /// The buffer is `u32`-backed so the row structs are properly aligned.
    fn extended_tcp_table(family: u32) -> Result<Vec<u32>> {
        let mut size: u32 = 0;
        let mut buffer: Vec<u32> = Vec::new();

        // The table can grow between the sizing call and the fetch.
        for _ in 0..4 {
            let ptr = if buffer.is_empty() {
                None
            } else {
                Some(buffer.as_mut_ptr() as *mut c_void)
            };

            let status = unsafe {
                GetExtendedTcpTable(ptr, &mut size, FALSE, family, TCP_TABLE_OWNER_PID_LISTENER, 0)
            };

            if status == NO_ERROR.0 && !buffer.is_empty() {
                return Ok(buffer);
            }
            if status == ERROR_INSUFFICIENT_BUFFER.0 || status == NO_ERROR.0 {
                buffer = vec![0u32; (size as usize).div_ceil(4).max(1)];
                continue;
            }
            if status == ERROR_ACCESS_DENIED.0 {
                return Err(Error::PermissionDenied(
                    "access to the TCP connection table was denied".to_string(),
                ));
            }
            return Err(Error::CommandFailed(format!(
                "GetExtendedTcpTable failed with status {}",
                status
            )));
        }

        Err(Error::CommandFailed(
            "GetExtendedTcpTable kept reporting a larger table".to_string(),
        ))
    }

    fn ipv4_listeners() -> Result<Vec<ListeningSocket>> {
        let buffer = Self::extended_tcp_table(AF_INET.0 as u32)?;
        let table = unsafe { &*(buffer.as_ptr() as *const MIB_TCPTABLE_OWNER_PID) };
        let rows: &[MIB_TCPROW_OWNER_PID] = unsafe {
            std::slice::from_raw_parts(table.table.as_ptr(), table.dwNumEntries as usize)
        };

        Ok(rows
            .iter()
            .filter_map(|row| {
                let ip = Ipv4Addr::from(row.dwLocalAddr.to_ne_bytes());
                let address = if ip.is_unspecified() {
                    "*".to_string()
                } else {
                    ip.to_string()
                };
                Self::row_socket(row.dwLocalPort, row.dwOwningPid, address)
            })
            .collect())
    }

    fn ipv6_listeners() -> Result<Vec<ListeningSocket>> {
        let buffer = Self::extended_tcp_table(AF_INET6.0 as u32)?;
        let table = unsafe { &*(buffer.as_ptr() as *const MIB_TCP6TABLE_OWNER_PID) };
        let rows: &[MIB_TCP6ROW_OWNER_PID] = unsafe {
            std::slice::from_raw_parts(table.table.as_ptr(), table.dwNumEntries as usize)
        };

        Ok(rows
            .iter()
            .filter_map(|row| {
                let ip = Ipv6Addr::from(row.ucLocalAddr);
                let address = if ip.is_unspecified() {
                    "*".to_string()
                } else {
                    ip.to_string()
                };
                Self::row_socket(row.dwLocalPort, row.dwOwningPid, address)
            })
            .collect())
    }

    /// The port sits in the low 16 bits in network byte order.
    fn row_socket(raw_port: u32, raw_pid: u32, address: String) -> Option<ListeningSocket> {
        let port = Port::new(u16::from_be(raw_port as u16)).ok()?;
        Some(match Pid::new(raw_pid) {
            Ok(pid) => ListeningSocket::owned(port, pid, address),
            Err(_) => ListeningSocket::unattributed(port, address),
        })
    }

    /// Parse one `tasklist /V /FO CSV /NH` row.
    ///
    /// Columns: Image Name, PID, Session Name, Session#, Mem Usage, Status,
    /// User Name, CPU Time, Window Title.
    fn parse_tasklist_row(pid: Pid, output: &str) -> Option<ProcessInfo> {
        for line in output.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("INFO:") {
                continue;
            }

            let fields = Self::parse_csv_line(line);
            if fields.len() < 2 || fields[1] != pid.to_string() {
                continue;
            }

            let name = fields[0];
            let name = name.strip_suffix(".exe").unwrap_or(name);
            let user = match fields.get(6) {
                Some(&"N/A") | None => "",
                Some(user) => user,
            };
            return Some(ProcessInfo::new(pid, name, user));
        }
        None
    }

    /// Parse a CSV line, handling quoted fields
    fn parse_csv_line(line: &str) -> Vec<&str> {
        let mut fields = Vec::new();
        let mut in_quotes = false;
        let mut field_start: Option<usize> = None;

        for (i, c) in line.char_indices() {
            match c {
                '"' if in_quotes => {
                    if let Some(start) = field_start.take() {
                        fields.push(&line[start..i]);
                    }
                    in_quotes = false;
                }
                '"' => {
                    in_quotes = true;
                    field_start = Some(i + 1);
                }
                ',' if !in_quotes => {
                    if let Some(start) = field_start.take() {
                        fields.push(&line[start..i]);
                    }
                }
                _ => {
                    if field_start.is_none() && !in_quotes {
                        field_start = Some(i);
                    }
                }
            }
        }

        if let Some(start) = field_start {
            if !in_quotes {
                fields.push(&line[start..]);
            }
        }

        fields
    }

    async fn tasklist(pid: Pid, verbose: bool) -> Result<String> {
        let mut cmd = Command::new("tasklist");
        if verbose {
            cmd.arg("/V");
        }
        let output = cmd
            .args(["/FO", "CSV", "/NH", "/FI", &format!("PID eq {}", pid)])
            .output()
            .await
            .map_err(|e| Error::LookupError(format!("tasklist: {}", e)))?;

        if !output.status.success() {
            return Err(Error::LookupError(format!(
                "tasklist failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Classify `taskkill` output.
    fn interpret_taskkill(pid: Pid, combined: &str) -> Result<()> {
        if combined.contains("already been terminated") || combined.contains("has exited") {
            return Ok(());
        }
        if combined.contains("not found") || combined.contains("could not be found") {
            return Err(Error::NotFound(pid.get()));
        }
        if combined.contains("Access is denied") || combined.contains("access denied") {
            return Err(Error::PermissionDenied(format!(
                "access denied terminating process {}",
                pid
            )));
        }
        Err(Error::CommandFailed(format!(
            "taskkill /PID {} failed: {}",
            pid,
            combined.trim()
        )))
    }
}

impl SocketTable for WindowsBackend {
    async fn list_listening_sockets(&self) -> Result<Vec<ListeningSocket>> {
        let mut sockets = tokio::task::spawn_blocking(|| -> Result<Vec<ListeningSocket>> {
            let mut sockets = Self::ipv4_listeners()?;
            sockets.extend(Self::ipv6_listeners()?);
            Ok(sockets)
        })
        .await
        .map_err(|e| Error::CommandFailed(format!("TCP table task failed: {}", e)))??;

        // Deduplicate by (port, pid)
        let mut seen = std::collections::HashSet::new();
        sockets.retain(|s| s.pid.is_none() || seen.insert((s.port, s.pid)));

        debug!(count = sockets.len(), "Read IP Helper socket table");
        Ok(sockets)
    }
}

impl ProcessResolver for WindowsBackend {
    async fn lookup(&self, pid: Pid) -> Result<ProcessInfo> {
        let output = Self::tasklist(pid, true).await?;
        Self::parse_tasklist_row(pid, &output).ok_or(Error::NotFound(pid.get()))
    }
}

impl Signaller for WindowsBackend {
    /// `taskkill /PID xxx` requests a close, `taskkill /PID xxx /F` forces it.
    async fn signal(&self, pid: Pid, signal: Signal) -> Result<()> {
        debug!(pid = pid.get(), signal = %signal, "Executing taskkill");

        let mut cmd = Command::new("taskkill");
        cmd.arg("/PID").arg(pid.to_string());
        if signal == Signal::Kill {
            cmd.arg("/F");
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| Error::CommandFailed(format!("taskkill: {}", e)))?;

        if output.status.success() {
            return Ok(());
        }

        let combined = format!(
            "{} {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let result = Self::interpret_taskkill(pid, &combined);
        if let Err(e) = &result {
            warn!(pid = pid.get(), error = %e, "taskkill failed");
        }
        result
    }

    async fn is_running(&self, pid: Pid) -> bool {
        match Self::tasklist(pid, false).await {
            Ok(output) => Self::parse_tasklist_row(pid, &output).is_some(),
            Err(e) => {
                warn!(pid = pid.get(), error = %e, "Failed to check if process is running");
                false
            }
        }
    }

    fn protected_pids(&self) -> Vec<Pid> {
        let mut pids = vec![Pid::current()];
        if let Ok(system) = Pid::new(SYSTEM_PID) {
            pids.push(system);
        }
        pids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u32) -> Pid {
        Pid::new(n).unwrap()
    }

    #[test]
    fn test_parse_csv_line() {
        let line = r#""node.exe","5432","Console","1","45,000 K""#;
        let fields = WindowsBackend::parse_csv_line(line);

        assert_eq!(fields, vec!["node.exe", "5432", "Console", "1", "45,000 K"]);
    }

    #[test]
    fn test_parse_tasklist_row() {
        let output = r#""node.exe","5432","Console","1","45,000 K","Running","DESKTOP\alice","0:00:01","N/A""#;
        let info = WindowsBackend::parse_tasklist_row(pid(5432), output).unwrap();
        assert_eq!(info.command, "node");
        assert_eq!(info.user, r"DESKTOP\alice");
    }

    #[test]
    fn test_parse_tasklist_no_match() {
        let output = "INFO: No tasks are running which match the specified criteria.\r\n";
        assert!(WindowsBackend::parse_tasklist_row(pid(5432), output).is_none());
    }

    #[test]
    fn test_interpret_taskkill() {
        assert!(matches!(
            WindowsBackend::interpret_taskkill(pid(9), "ERROR: The process \"9\" not found."),
            Err(Error::NotFound(9))
        ));
        assert!(matches!(
            WindowsBackend::interpret_taskkill(pid(9), "ERROR: Access is denied."),
            Err(Error::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_row_socket_byte_order() {
        // 3000 = 0x0BB8, stored big-endian in the low word.
        let raw_port = u16::to_be(3000) as u32;
        let socket = WindowsBackend::row_socket(raw_port, 5432, "*".to_string()).unwrap();
        assert_eq!(socket.port.get(), 3000);
        assert_eq!(socket.pid, Some(pid(5432)));
    }

    #[tokio::test]
    async fn test_live_table_and_self_lookup() {
        let backend = WindowsBackend::new();
        assert!(backend.list_listening_sockets().await.is_ok());
        assert!(backend.is_running(Pid::current()).await);
    }
}
