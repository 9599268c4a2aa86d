//! Linux backend reading the kernel socket tables from procfs.
//!
//! Listening sockets come from `/proc/net/tcp` and `/proc/net/tcp6`
//! (state `0A`). Each row carries the socket inode, which is mapped back to
//! its owner by walking the `socket:[inode]` links under `/proc/<pid>/fd`.
//! Links of processes owned by other users are unreadable without privilege;
//! such sockets are reported without an owner.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::{ListeningSocket, Pid, Port, ProcessInfo};
use crate::error::{Error, Result};
use crate::ports::{ProcessResolver, Signal, Signaller, SocketTable};

use super::unix;

/// TCP_LISTEN in the kernel's `st` column.
const TCP_LISTEN: &str = "0A";

/// Linux-specific backend.
#[derive(Debug, Clone)]
pub struct LinuxBackend {
    proc_root: PathBuf,
}

/// A listening row of a procfs TCP table, before owner attribution.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawListener {
    port: Port,
    address: String,
    inode: u64,
}

impl LinuxBackend {
    /// Create a backend reading the live `/proc`.
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Create a backend reading a procfs tree rooted elsewhere (for testing).
    pub fn with_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    /// Parse one procfs TCP table into its listening rows.
    ///
    /// Expected format:
    /// ```text
    ///   sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
    ///    0: 0100007F:0BB8 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 5555 1 ...
    /// ```
    fn parse_tcp_table(content: &str) -> Vec<RawListener> {
        let mut listeners = Vec::new();

        for line in content.lines().skip(1) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 || fields[3] != TCP_LISTEN {
                continue;
            }

            let Some((addr_hex, port_hex)) = fields[1].split_once(':') else {
                continue;
            };
            let Some(port) = u16::from_str_radix(port_hex, 16)
                .ok()
                .and_then(|p| Port::new(p).ok())
            else {
                continue;
            };
            let Some(ip) = Self::parse_hex_ip(addr_hex) else {
                continue;
            };
            let Ok(inode) = fields[9].parse::<u64>() else {
                continue;
            };

            let address = if ip.is_unspecified() {
                "*".to_string()
            } else {
                ip.to_string()
            };

            listeners.push(RawListener {
                port,
                address,
                inode,
            });
        }

        listeners
    }

    /// Decode the kernel's hex address: 32-bit words in host byte order.
    fn parse_hex_ip(hex: &str) -> Option<IpAddr> {
        match hex.len() {
            8 => {
                let word = u32::from_str_radix(hex, 16).ok()?;
                Some(IpAddr::V4(Ipv4Addr::from(word.to_ne_bytes())))
            }
            32 => {
                let mut octets = [0u8; 16];
                for (i, chunk) in octets.chunks_mut(4).enumerate() {
                    let word = u32::from_str_radix(&hex[i * 8..i * 8 + 8], 16).ok()?;
                    chunk.copy_from_slice(&word.to_ne_bytes());
                }
                Some(IpAddr::V6(Ipv6Addr::from(octets)))
            }
            _ => None,
        }
    }

    /// Map socket inodes to every visible process holding them.
    ///
    /// Pre-forked servers share one listening socket between a master and its
    /// workers, so an inode can have several owners. Owners are sorted by PID.
    fn socket_owners(proc_root: &Path, wanted: &HashSet<u64>) -> HashMap<u64, Vec<Pid>> {
        let mut owners: HashMap<u64, Vec<Pid>> = HashMap::new();

        let entries = match fs::read_dir(proc_root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(error = %e, "Failed to list procfs root");
                return owners;
            }
        };

        for entry in entries.flatten() {
            let Some(pid) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<Pid>().ok())
            else {
                continue;
            };

            // Unreadable for other users' processes, gone for exited ones.
            let Ok(fds) = fs::read_dir(entry.path().join("fd")) else {
                continue;
            };

            for fd in fds.flatten() {
                let Ok(link) = fs::read_link(fd.path()) else {
                    continue;
                };
                let Some(inode) = link
                    .to_str()
                    .and_then(|l| l.strip_prefix("socket:["))
                    .and_then(|l| l.strip_suffix(']'))
                    .and_then(|l| l.parse::<u64>().ok())
                else {
                    continue;
                };
                if wanted.contains(&inode) {
                    let holders = owners.entry(inode).or_default();
                    if !holders.contains(&pid) {
                        holders.push(pid);
                    }
                }
            }
        }

        for holders in owners.values_mut() {
            holders.sort_unstable();
        }
        owners
    }

    fn read_socket_table(proc_root: &Path) -> Result<Vec<ListeningSocket>> {
        let mut listeners = Vec::new();

        for (table, optional) in [("net/tcp", false), ("net/tcp6", true)] {
            let path = proc_root.join(table);
            match fs::read_to_string(&path) {
                Ok(content) => listeners.extend(Self::parse_tcp_table(&content)),
                // IPv6 disabled.
                Err(e) if optional && e.kind() == ErrorKind::NotFound => continue,
                Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                    return Err(Error::PermissionDenied(format!(
                        "cannot read {}: {}",
                        path.display(),
                        e
                    )));
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }

        if listeners.is_empty() {
            return Ok(Vec::new());
        }

        let wanted: HashSet<u64> = listeners.iter().map(|l| l.inode).collect();
        let owners = Self::socket_owners(proc_root, &wanted);

        let mut seen: HashSet<(Port, Pid)> = HashSet::new();
        let mut sockets = Vec::with_capacity(listeners.len());

        for listener in listeners {
            match owners.get(&listener.inode) {
                Some(holders) => {
                    for &pid in holders {
                        // Deduplicate by (port, pid)
                        if seen.insert((listener.port, pid)) {
                            sockets.push(ListeningSocket::owned(
                                listener.port,
                                pid,
                                listener.address.clone(),
                            ));
                        }
                    }
                }
                None => sockets.push(ListeningSocket::unattributed(
                    listener.port,
                    listener.address,
                )),
            }
        }

        debug!(count = sockets.len(), "Read procfs socket table");
        Ok(sockets)
    }

    /// Real uid from the `Uid:` line of `/proc/<pid>/status`.
    fn parse_status_uid(status: &str) -> Option<u32> {
        status
            .lines()
            .find_map(|line| line.strip_prefix("Uid:"))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|uid| uid.parse().ok())
    }

    /// Process state letter from `/proc/<pid>/stat`.
    ///
    /// The command field may contain spaces and parentheses, so the state is
    /// located after the last `)`.
    fn parse_stat_state(stat: &str) -> Option<char> {
        let after = &stat[stat.rfind(')')? + 1..];
        after.trim_start().chars().next()
    }

    async fn read_proc_file(&self, pid: Pid, name: &str) -> Result<String> {
        let path = self.proc_root.join(pid.to_string()).join(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound(pid.get())),
            Err(e) => Err(Error::LookupError(format!(
                "cannot read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

impl Default for LinuxBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketTable for LinuxBackend {
    async fn list_listening_sockets(&self) -> Result<Vec<ListeningSocket>> {
        let proc_root = self.proc_root.clone();
        tokio::task::spawn_blocking(move || Self::read_socket_table(&proc_root))
            .await
            .map_err(|e| Error::CommandFailed(format!("procfs scan task failed: {}", e)))?
    }
}

impl ProcessResolver for LinuxBackend {
    async fn lookup(&self, pid: Pid) -> Result<ProcessInfo> {
        let command = self.read_proc_file(pid, "comm").await?.trim().to_string();

        let user = match self.read_proc_file(pid, "status").await {
            Ok(status) => Self::parse_status_uid(&status)
                .map(unix::user_name)
                .unwrap_or_default(),
            Err(Error::NotFound(p)) => return Err(Error::NotFound(p)),
            Err(e) => {
                debug!(pid = pid.get(), error = %e, "Could not resolve process owner");
                String::new()
            }
        };

        Ok(ProcessInfo::new(pid, command, user))
    }
}

impl Signaller for LinuxBackend {
    async fn signal(&self, pid: Pid, signal: Signal) -> Result<()> {
        unix::send_signal(pid, signal)
    }

    /// Zombies still answer the null signal, so the procfs state is checked first.
    async fn is_running(&self, pid: Pid) -> bool {
        match self.read_proc_file(pid, "stat").await {
            Ok(stat) => !matches!(Self::parse_stat_state(&stat), Some('Z') | Some('X')),
            Err(Error::NotFound(_)) => false,
            Err(_) => unix::is_running(pid),
        }
    }

    fn protected_pids(&self) -> Vec<Pid> {
        unix::protected_pids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    const TCP: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 0100007F:0BB8 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 5555 1 0000000000000000 100 0 0 10 0
   1: 00000000:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 6666 1 0000000000000000 100 0 0 10 0
   2: 0100007F:0BB8 0100007F:D2F0 01 00000000:00000000 00:00000000 00000000  1000        0 7777 1 0000000000000000 20 4 30 10 -1
";

    const TCP6: &str = "  sl  local_address                         remote_address                        st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000000000000000000001000000:0BB8 00000000000000000000000000000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 8888 1 0000000000000000 100 0 0 10 0
";

    fn pid(n: u32) -> Pid {
        Pid::new(n).unwrap()
    }

    fn port(n: u16) -> Port {
        Port::new(n).unwrap()
    }

    fn write_process(root: &Path, pid: u32, comm: &str, uid: u32, sockets: &[u64]) {
        let dir = root.join(pid.to_string());
        fs::create_dir_all(dir.join("fd")).unwrap();
        fs::write(dir.join("comm"), format!("{}\n", comm)).unwrap();
        fs::write(
            dir.join("status"),
            format!("Name:\t{}\nState:\tS (sleeping)\nUid:\t{}\t{}\t{}\t{}\n", comm, uid, uid, uid, uid),
        )
        .unwrap();
        fs::write(dir.join("stat"), format!("{} ({}) S 1 1 1 0", pid, comm)).unwrap();
        for (fd, inode) in sockets.iter().enumerate() {
            symlink(format!("socket:[{}]", inode), dir.join("fd").join((fd + 3).to_string()))
                .unwrap();
        }
    }

    fn fixture() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("net")).unwrap();
        fs::write(root.path().join("net/tcp"), TCP).unwrap();
        fs::write(root.path().join("net/tcp6"), TCP6).unwrap();
        write_process(root.path(), 1234, "node", 1000, &[5555, 8888]);
        write_process(root.path(), 4321, "nginx", 0, &[6666]);
        root
    }

    #[test]
    fn test_parse_tcp_table_keeps_only_listeners() {
        let rows = LinuxBackend::parse_tcp_table(TCP);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].port, port(3000));
        assert_eq!(rows[0].address, "127.0.0.1");
        assert_eq!(rows[0].inode, 5555);
        assert_eq!(rows[1].port, port(8080));
        assert_eq!(rows[1].address, "*");
    }

    #[test]
    fn test_parse_tcp6_loopback() {
        let rows = LinuxBackend::parse_tcp_table(TCP6);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].address, "::1");
        assert_eq!(rows[0].port, port(3000));
    }

    #[test]
    fn test_parse_stat_state_with_parens_in_name() {
        assert_eq!(LinuxBackend::parse_stat_state("42 (a) b) Z 1 1"), Some('Z'));
        assert_eq!(LinuxBackend::parse_stat_state("42 (node) S 1"), Some('S'));
        assert_eq!(LinuxBackend::parse_stat_state("garbage"), None);
    }

    #[test]
    fn test_parse_status_uid() {
        let status = "Name:\tnode\nUid:\t1000\t1000\t1000\t1000\nGid:\t1000\n";
        assert_eq!(LinuxBackend::parse_status_uid(status), Some(1000));
        assert_eq!(LinuxBackend::parse_status_uid("Name:\tx\n"), None);
    }

    #[tokio::test]
    async fn test_socket_table_attributes_owners() {
        let root = fixture();
        let backend = LinuxBackend::with_root(root.path());

        let sockets = backend.list_listening_sockets().await.unwrap();
        // 3000 on v4 and v6 collapse into one (port, pid) entry.
        assert_eq!(
            sockets,
            vec![
                ListeningSocket::owned(port(3000), pid(1234), "127.0.0.1"),
                ListeningSocket::owned(port(8080), pid(4321), "*"),
            ]
        );

        let pids = backend.sockets_for_port(port(3000)).await.unwrap();
        assert_eq!(pids, vec![pid(1234)]);
        assert!(backend.sockets_for_port(port(9999)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shared_socket_reports_every_holder() {
        let root = fixture();
        // Two pre-forked workers inherit the master's listening socket.
        write_process(root.path(), 4400, "nginx", 33, &[6666]);
        write_process(root.path(), 4401, "nginx", 33, &[6666]);
        let backend = LinuxBackend::with_root(root.path());

        let pids = backend.sockets_for_port(port(8080)).await.unwrap();
        assert_eq!(pids, vec![pid(4321), pid(4400), pid(4401)]);
        assert_eq!(backend.sockets_for_port(port(3000)).await.unwrap(), vec![pid(1234)]);
    }

    #[tokio::test]
    async fn test_unowned_socket_is_permission_denied() {
        let root = fixture();
        // Owner of inode 6666 is invisible.
        fs::remove_dir_all(root.path().join("4321")).unwrap();
        let backend = LinuxBackend::with_root(root.path());

        let sockets = backend.list_listening_sockets().await.unwrap();
        assert!(sockets.contains(&ListeningSocket::unattributed(port(8080), "*")));
        assert!(matches!(
            backend.sockets_for_port(port(8080)).await,
            Err(Error::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_tcp6_is_tolerated() {
        let root = fixture();
        fs::remove_file(root.path().join("net/tcp6")).unwrap();
        let backend = LinuxBackend::with_root(root.path());
        assert_eq!(backend.list_listening_sockets().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_lookup_reads_comm_and_owner() {
        let root = fixture();
        let backend = LinuxBackend::with_root(root.path());

        let info = backend.lookup(pid(1234)).await.unwrap();
        assert_eq!(info.pid, pid(1234));
        assert_eq!(info.command, "node");
        assert_eq!(info.user, unix::user_name(1000));
    }

    #[tokio::test]
    async fn test_vanished_process_is_unknown() {
        let root = fixture();
        let backend = LinuxBackend::with_root(root.path());

        assert!(matches!(
            backend.lookup(pid(77)).await,
            Err(Error::NotFound(77))
        ));
        let info = backend.describe(pid(77)).await.unwrap();
        assert!(info.is_vanished());
    }

    #[tokio::test]
    async fn test_zombie_is_not_running() {
        let root = fixture();
        fs::write(root.path().join("1234/stat"), "1234 (node) Z 1 1 1 0").unwrap();
        let backend = LinuxBackend::with_root(root.path());

        assert!(!backend.is_running(pid(1234)).await);
        assert!(backend.is_running(pid(4321)).await);
        assert!(!backend.is_running(pid(55)).await);
    }

    #[tokio::test]
    async fn test_live_procfs_scan_succeeds() {
        let backend = LinuxBackend::new();
        assert!(backend.list_listening_sockets().await.is_ok());
        assert_eq!(
            backend.lookup(Pid::current()).await.unwrap().pid,
            Pid::current()
        );
    }
}
