//! Detaching from the controlling terminal (`--daemonize`).
//!
//! The process re-executes itself with null stdio and a marker variable; the
//! re-executed child starts a new session, moves to `/` and sets umask 022.
//! No fork happens in-process.

use std::ffi::OsStr;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::core::errors::{PwdError, Result};

/// Environment marker set on the re-executed child.
pub const CHILD_MARKER: &str = "PLCWATCHD_DAEMON_CHILD";

/// Which side of the re-exec the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonRole {
    /// The launcher; the detached child has `pid`. The caller should exit 0.
    Parent { pid: u32 },
    /// The detached child; continue into the watchdog.
    Child,
}

fn marker_present(value: Option<&OsStr>) -> bool {
    value.is_some_and(|value| value == "1")
}

/// Whether this process is the re-executed daemon child.
#[must_use]
pub fn is_detached_child() -> bool {
    marker_present(std::env::var_os(CHILD_MARKER).as_deref())
}

/// Detach into the background.
///
/// In the launcher this spawns the detached child and returns
/// [`DaemonRole::Parent`]; in the child it finishes session setup and returns
/// [`DaemonRole::Child`].
pub fn daemonize() -> Result<DaemonRole> {
    if is_detached_child() {
        detach_session()?;
        return Ok(DaemonRole::Child);
    }

    let exe = std::env::current_exe().map_err(|err| PwdError::Daemonize {
        details: format!("cannot determine current executable: {err}"),
    })?;
    let child = Command::new(&exe)
        .args(std::env::args_os().skip(1))
        .env(CHILD_MARKER, "1")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|err| PwdError::Daemonize {
            details: format!("cannot spawn {}: {err}", exe.display()),
        })?;
    Ok(DaemonRole::Parent { pid: child.id() })
}

#[cfg(unix)]
fn detach_session() -> Result<()> {
    use nix::sys::stat::{Mode, umask};
    use nix::unistd::{chdir, setsid};

    let sid = setsid().map_err(|err| PwdError::Daemonize {
        details: format!("setsid failed: {err}"),
    })?;
    chdir("/").map_err(|err| PwdError::Daemonize {
        details: format!("chdir to / failed: {err}"),
    })?;
    umask(Mode::from_bits_truncate(0o022));
    debug!(sid = sid.as_raw(), "detached from controlling terminal");
    Ok(())
}

#[cfg(not(unix))]
fn detach_session() -> Result<()> {
    Err(PwdError::UnsupportedPlatform {
        details: "daemonizing requires a unix host".to_string(),
    })
}
