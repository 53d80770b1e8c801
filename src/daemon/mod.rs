//! Daemon subsystem: watchdog loop, STOP escalation, pacing, service
//! integration, signal handling.

pub mod escalation;
pub mod loop_main;
pub mod pacer;
pub mod service;
#[cfg(feature = "daemon")]
pub mod signals;
