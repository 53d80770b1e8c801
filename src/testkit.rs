//! Scripted collaborators for driving the watchdog without a PLC, a network,
//! or a wall clock.
//!
//! Scripts are queues that repeat their last entry once drained, so a test only
//! spells out the interesting prefix of a sequence.

#![allow(missing_docs)]

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use parking_lot::Mutex;

use crate::daemon::pacer::{Pacer, Tick};
use crate::notify::{AckState, Alert, AlertKind, GatewayError, NotificationGateway, Receipt};
use crate::probe::{ControllerProbe, ProbeError, RunState};

fn next_scripted<T: Clone>(queue: &mut VecDeque<T>, fallback: T) -> T {
    match queue.len() {
        0 => fallback,
        1 => queue[0].clone(),
        _ => queue.pop_front().unwrap_or(fallback),
    }
}

/// Record of calls made on a fake. Appends through `&self`, since gateway
/// methods take a shared reference.
#[derive(Debug)]
pub struct CallLog<T>(Mutex<Vec<T>>);

impl<T> Default for CallLog<T> {
    fn default() -> Self {
        Self(Mutex::new(Vec::new()))
    }
}

impl<T: Clone + PartialEq> CallLog<T> {
    fn push(&self, call: T) {
        self.0.lock().push(call);
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.0.lock().clone()
    }

    #[must_use]
    pub fn count(&self, call: &T) -> usize {
        self.0.lock().iter().filter(|seen| *seen == call).count()
    }
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeCall {
    Connect,
    Disconnect,
    Status,
    WarmStart,
}

/// Probe whose connect outcomes and readings follow a script.
///
/// A reading of `None` (see [`then_lost`](Self::then_lost)) drops the session
/// and reports [`RunState::Unknown`].
#[derive(Debug)]
pub struct ScriptedProbe {
    connect_results: VecDeque<bool>,
    readings: VecDeque<Option<RunState>>,
    connected: bool,
    warm_start_fails: bool,
    log: CallLog<ProbeCall>,
}

impl Default for ScriptedProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProbe {
    #[must_use]
    pub fn new() -> Self {
        Self {
            connect_results: VecDeque::new(),
            readings: VecDeque::new(),
            connected: false,
            warm_start_fails: false,
            log: CallLog::default(),
        }
    }

    /// Replace the connect script (`true` = session established).
    #[must_use]
    pub fn connect_results(mut self, results: impl IntoIterator<Item = bool>) -> Self {
        self.connect_results = results.into_iter().collect();
        self
    }

    /// Replace the reading script.
    #[must_use]
    pub fn statuses(mut self, states: impl IntoIterator<Item = RunState>) -> Self {
        self.readings = states.into_iter().map(Some).collect();
        self
    }

    #[must_use]
    pub fn then_status(mut self, state: RunState) -> Self {
        self.readings.push_back(Some(state));
        self
    }

    /// Append a reading that loses the session.
    #[must_use]
    pub fn then_lost(mut self) -> Self {
        self.readings.push_back(None);
        self
    }

    #[must_use]
    pub fn fail_warm_start(mut self) -> Self {
        self.warm_start_fails = true;
        self
    }

    #[must_use]
    pub fn count(&self, call: ProbeCall) -> usize {
        self.log.count(&call)
    }
}

impl ControllerProbe for ScriptedProbe {
    fn connect(&mut self) -> Result<(), ProbeError> {
        self.log.push(ProbeCall::Connect);
        if next_scripted(&mut self.connect_results, true) {
            self.connected = true;
            Ok(())
        } else {
            self.connected = false;
            Err(ProbeError::Connect {
                addr: "scripted:102".to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "scripted refusal"),
            })
        }
    }

    fn disconnect(&mut self) -> Result<(), ProbeError> {
        self.log.push(ProbeCall::Disconnect);
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn status(&mut self) -> RunState {
        self.log.push(ProbeCall::Status);
        if !self.connected {
            return RunState::Unknown;
        }
        next_scripted(&mut self.readings, Some(RunState::Unknown)).unwrap_or_else(|| {
            self.connected = false;
            RunState::Unknown
        })
    }

    fn request_warm_start(&mut self) -> Result<(), ProbeError> {
        self.log.push(ProbeCall::WarmStart);
        if !self.connected {
            return Err(ProbeError::NotConnected);
        }
        if self.warm_start_fails {
            return Err(ProbeError::Rejected {
                context: "hot start",
                class: 0x85,
                code: 0x00,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Send(AlertKind),
    Poll(Receipt),
    Cancel(Receipt),
}

#[derive(Debug, Default)]
struct GatewayScript {
    receipts: VecDeque<Result<Receipt, GatewayError>>,
    acks: VecDeque<Result<AckState, GatewayError>>,
    informational_fails: bool,
    cancel_fails: bool,
    issued: u32,
}

/// Gateway that records every call and answers from a script.
///
/// Emergency sends issue fresh receipts unless scripted; polls answer
/// `PENDING` unless scripted.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    script: Mutex<GatewayScript>,
    log: CallLog<GatewayCall>,
}

impl ScriptedGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn emergency_receipts(
        self,
        receipts: impl IntoIterator<Item = Result<Receipt, GatewayError>>,
    ) -> Self {
        self.script.lock().receipts = receipts.into_iter().collect();
        self
    }

    #[must_use]
    pub fn acks(self, acks: impl IntoIterator<Item = Result<AckState, GatewayError>>) -> Self {
        self.script.lock().acks = acks.into_iter().collect();
        self
    }

    /// Make every non-emergency send fail with a transport error.
    #[must_use]
    pub fn fail_informational(self) -> Self {
        self.script.lock().informational_fails = true;
        self
    }

    /// Make every cancel fail with a protocol error.
    #[must_use]
    pub fn fail_cancel(self) -> Self {
        self.script.lock().cancel_fails = true;
        self
    }

    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.log.snapshot()
    }

    /// Kinds of every alert sent, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<AlertKind> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::Send(kind) => Some(kind),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn sent_count(&self, kind: AlertKind) -> usize {
        self.log.count(&GatewayCall::Send(kind))
    }

    #[must_use]
    pub fn polls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, GatewayCall::Poll(_)))
            .count()
    }

    #[must_use]
    pub fn cancels(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, GatewayCall::Cancel(_)))
            .count()
    }
}

impl NotificationGateway for ScriptedGateway {
    fn send_alert(&self, alert: &Alert) -> Result<Receipt, GatewayError> {
        self.log.push(GatewayCall::Send(alert.kind));
        let mut script = self.script.lock();
        if !alert.priority.requires_acknowledgment() {
            if script.informational_fails {
                return Err(GatewayError::Transport("scripted outage".to_string()));
            }
            return Ok(Receipt::empty());
        }
        script.issued += 1;
        let fresh = Ok(Receipt::new(format!("receipt-{}", script.issued)));
        next_scripted(&mut script.receipts, fresh)
    }

    fn poll_acknowledgment(&self, receipt: &Receipt) -> Result<AckState, GatewayError> {
        self.log.push(GatewayCall::Poll(receipt.clone()));
        next_scripted(&mut self.script.lock().acks, Ok(AckState::Pending))
    }

    fn cancel_alert(&self, receipt: &Receipt) -> Result<(), GatewayError> {
        self.log.push(GatewayCall::Cancel(receipt.clone()));
        if self.script.lock().cancel_fails {
            return Err(GatewayError::Protocol {
                status: 0,
                detail: "receipt not found".to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pacer
// ---------------------------------------------------------------------------

/// Pacer that never sleeps and records every requested wait.
#[derive(Debug, Default)]
pub struct InstantPacer {
    waits: Vec<Duration>,
    shutdown_after: Option<usize>,
}

impl InstantPacer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `waits` waits elapse, then report shutdown on every later wait.
    #[must_use]
    pub fn shutdown_after(mut self, waits: usize) -> Self {
        self.shutdown_after = Some(waits);
        self
    }

    /// Elapsed waits, in order.
    #[must_use]
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.clone()
    }
}

impl Pacer for InstantPacer {
    fn wait(&mut self, period: Duration) -> Tick {
        if self.shutdown_requested() {
            return Tick::Shutdown;
        }
        self.waits.push(period);
        Tick::Elapsed
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown_after
            .is_some_and(|limit| self.waits.len() >= limit)
    }
}
