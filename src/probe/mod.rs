//! Controller probe boundary: connection lifecycle and RUN/STOP classification
//! of the supervised PLC.

pub mod s7;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Connectivity of the controller as observed by one connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnState {
    Connected,
    Disconnected,
}

/// Execution state reported by a connected controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Run,
    Stop,
    /// Any reading the probe cannot classify.
    Unknown,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Run => "RUN",
            Self::Stop => "STOP",
            Self::Unknown => "UNKNOWN",
        })
    }
}

/// Failures raised by a [`ControllerProbe`].
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O failure during {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("protocol violation during {context}: {details}")]
    Protocol {
        context: &'static str,
        details: String,
    },

    #[error("no active controller session")]
    NotConnected,

    #[error("controller rejected {context}: error class {class:#04x}, code {code:#04x}")]
    Rejected {
        context: &'static str,
        class: u8,
        code: u8,
    },
}

/// Session-oriented access to the supervised controller.
///
/// The watchdog drives exactly one probe from a single thread; implementations
/// do not need interior synchronization.
pub trait ControllerProbe {
    /// Establish a session. Calling this with a live session is a no-op.
    fn connect(&mut self) -> Result<(), ProbeError>;

    /// Tear the session down. Disconnecting an idle probe succeeds.
    fn disconnect(&mut self) -> Result<(), ProbeError>;

    /// Whether a session is currently usable.
    fn is_connected(&self) -> bool;

    /// Current execution state. Only meaningful after a successful
    /// [`connect`](Self::connect); a failed read drops the session and yields
    /// [`RunState::Unknown`].
    fn status(&mut self) -> RunState;

    /// Ask the controller to resume normal operation (S7 hot start).
    fn request_warm_start(&mut self) -> Result<(), ProbeError>;
}

impl<P: ControllerProbe + ?Sized> ControllerProbe for Box<P> {
    fn connect(&mut self) -> Result<(), ProbeError> {
        (**self).connect()
    }

    fn disconnect(&mut self) -> Result<(), ProbeError> {
        (**self).disconnect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn status(&mut self) -> RunState {
        (**self).status()
    }

    fn request_warm_start(&mut self) -> Result<(), ProbeError> {
        (**self).request_warm_start()
    }
}
