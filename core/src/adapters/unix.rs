//! Signal delivery and user lookup shared by the Unix backends.

use nix::errno::Errno;
use nix::sys::signal::{self, Signal as NixSignal};
use nix::unistd::{self, Pid as NixPid, Uid, User};
use tracing::{debug, warn};

use crate::domain::Pid;
use crate::error::{Error, Result};
use crate::ports::Signal;

fn to_nix(pid: Pid) -> Result<NixPid> {
    let raw = i32::try_from(pid.get())
        .map_err(|_| Error::InvalidInput(format!("PID {} is out of range", pid)))?;
    Ok(NixPid::from_raw(raw))
}

/// Send a signal with `kill(2)`, mapping errno to the crate taxonomy.
pub fn send_signal(pid: Pid, signal: Signal) -> Result<()> {
    let target = to_nix(pid)?;
    let nix_signal = match signal {
        Signal::Terminate => NixSignal::SIGTERM,
        Signal::Kill => NixSignal::SIGKILL,
    };

    debug!(pid = pid.get(), signal = %signal, "Sending signal to process");

    match signal::kill(target, nix_signal) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => {
            debug!(pid = pid.get(), "Process not found");
            Err(Error::NotFound(pid.get()))
        }
        Err(Errno::EPERM) => {
            warn!(pid = pid.get(), signal = %signal, "Permission denied to signal process");
            Err(Error::PermissionDenied(format!(
                "not allowed to send {} to process {}",
                signal, pid
            )))
        }
        Err(e) => Err(Error::CommandFailed(format!(
            "kill({}, {}) failed: {}",
            pid, signal, e
        ))),
    }
}

/// Probe a process with the null signal.
///
/// `EPERM` means the process exists but belongs to someone else.
pub fn is_running(pid: Pid) -> bool {
    let Ok(target) = to_nix(pid) else {
        return false;
    };
    match signal::kill(target, None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// The caller, its process group and init.
pub fn protected_pids() -> Vec<Pid> {
    let mut pids = vec![Pid::current()];
    if let Ok(group) = Pid::new(unistd::getpgrp().as_raw() as u32) {
        if !pids.contains(&group) {
            pids.push(group);
        }
    }
    if let Ok(init) = Pid::new(1) {
        pids.push(init);
    }
    pids
}

/// Resolve a uid to an account name, empty if the user database has no entry.
pub fn user_name(uid: u32) -> String {
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => user.name,
        Ok(None) => String::new(),
        Err(e) => {
            debug!(uid, error = %e, "User lookup failed");
            String::new()
        }
    }
}
