//! Process and socket domain models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Port;
use crate::error::{Error, Result};

/// Sentinel used for the command and user of a process that exited
/// between enumeration and resolution.
pub const UNKNOWN: &str = "unknown";

// ============================================================================
// Pid
// ============================================================================

/// A positive OS process identifier.
///
/// PIDs are reused by the OS after a process exits, so a `Pid` only names
/// whatever process holds that number at the moment it is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pid(u32);

impl Pid {
    /// Validate a raw PID.
    pub fn new(value: u32) -> Result<Self> {
        if value == 0 {
            return Err(Error::InvalidInput("PID must be positive, got 0".to_string()));
        }
        Ok(Self(value))
    }

    /// PID of the calling process.
    pub fn current() -> Self {
        Self(std::process::id())
    }

    /// The raw PID value.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Pid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("PID must not be empty".to_string()));
        }
        let value: u32 = trimmed
            .parse()
            .map_err(|_| Error::InvalidInput(format!("malformed PID '{}'", trimmed)))?;
        Pid::new(value)
    }
}

impl TryFrom<String> for Pid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Pid> for String {
    fn from(pid: Pid) -> Self {
        pid.to_string()
    }
}

// ============================================================================
// ProcessInfo
// ============================================================================

/// Human-readable description of a process holding a port.
///
/// Recreated on every scan and never cached across scans.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessInfo {
    /// Process ID, serialized as a string.
    pub pid: Pid,
    /// Display name of the executable.
    pub command: String,
    /// Owning account name, empty if it could not be resolved.
    pub user: String,
}

impl ProcessInfo {
    /// Create a new process description.
    pub fn new(pid: Pid, command: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            pid,
            command: command.into(),
            user: user.into(),
        }
    }

    /// Placeholder for a process that exited before it could be resolved.
    pub fn vanished(pid: Pid) -> Self {
        Self::new(pid, UNKNOWN, UNKNOWN)
    }

    /// Whether this entry is the vanished-process placeholder.
    pub fn is_vanished(&self) -> bool {
        self.command == UNKNOWN && self.user == UNKNOWN
    }
}

impl fmt::Display for ProcessInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (PID: {}, User: {})", self.command, self.pid, self.user)
    }
}

// ============================================================================
// ListeningSocket
// ============================================================================

/// One row of the OS listening-socket table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListeningSocket {
    /// Local port the socket is bound to.
    pub port: Port,
    /// Owning process, `None` when the caller cannot see the owner.
    pub pid: Option<Pid>,
    /// Local address (e.g. "*", "127.0.0.1", "::1").
    pub address: String,
}

impl ListeningSocket {
    /// A socket with a known owner.
    pub fn owned(port: Port, pid: Pid, address: impl Into<String>) -> Self {
        Self {
            port,
            pid: Some(pid),
            address: address.into(),
        }
    }

    /// A socket whose owner is hidden from the caller.
    pub fn unattributed(port: Port, address: impl Into<String>) -> Self {
        Self {
            port,
            pid: None,
            address: address.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_parsing() {
        assert_eq!("111".parse::<Pid>().unwrap().get(), 111);
        assert_eq!(" 42\n".parse::<Pid>().unwrap().get(), 42);
        assert!(matches!("".parse::<Pid>(), Err(Error::InvalidInput(_))));
        assert!(matches!("abc".parse::<Pid>(), Err(Error::InvalidInput(_))));
        assert!(matches!("-5".parse::<Pid>(), Err(Error::InvalidInput(_))));
        assert!(matches!("0".parse::<Pid>(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_process_info_json_shape() {
        let info = ProcessInfo::new(Pid::new(111).unwrap(), "node", "alice");
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(json, r#"{"pid":"111","command":"node","user":"alice"}"#);

        let back: ProcessInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }

    #[test]
    fn test_vanished_sentinel() {
        let info = ProcessInfo::vanished(Pid::new(7).unwrap());
        assert!(info.is_vanished());
        assert_eq!(info.command, UNKNOWN);
        assert!(!ProcessInfo::new(Pid::new(7).unwrap(), "node", "").is_vanished());
    }
}
