//! plcwatchd: supervise the RUN/STOP state of a Siemens S7 PLC and escalate
//! STOP incidents through Pushover emergency alerts that demand
//! acknowledgment.
//!
//! The watchdog core ([`daemon::loop_main::Watchdog`]) only sees two seams:
//! [`probe::ControllerProbe`] for the controller and
//! [`notify::NotificationGateway`] for the push service. The shipped adapters
//! are [`probe::s7::S7Probe`] (ISO-on-TCP) and
//! [`notify::pushover::PushoverGateway`].

pub mod core;
pub mod daemon;
pub mod logger;
pub mod notify;
pub mod probe;

#[cfg(feature = "cli")]
pub mod cli_app;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
