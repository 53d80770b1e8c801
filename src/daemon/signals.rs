//! Termination signals → shutdown flag.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::debug;

use crate::core::errors::{PwdError, Result};

#[cfg(unix)]
const SHUTDOWN_SIGNALS: &[i32] = &[SIGTERM, SIGINT, signal_hook::consts::SIGHUP];
#[cfg(not(unix))]
const SHUTDOWN_SIGNALS: &[i32] = &[SIGTERM, SIGINT];

/// Register SIGTERM, SIGINT and (on unix) SIGHUP onto a fresh flag.
///
/// The flag is polled by [`SleepPacer`](super::pacer::SleepPacer); the handlers
/// only store into it.
pub fn install_shutdown_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    for &signal in SHUTDOWN_SIGNALS {
        signal_hook::flag::register(signal, Arc::clone(&flag)).map_err(|err| {
            PwdError::Signal {
                details: format!("cannot register handler for signal {signal}: {err}"),
            }
        })?;
    }
    debug!(signals = ?SHUTDOWN_SIGNALS, "shutdown handlers installed");
    Ok(flag)
}
