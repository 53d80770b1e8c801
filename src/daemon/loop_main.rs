//! Main watchdog loop: poll → announce edges → escalate STOP → disconnect.
//!
//! One cycle per `polling_interval`. The loop owns the edge flags in
//! [`WatchdogState`]; each flag is cleared when its alert is attempted and
//! re-armed only when the state it guards is left.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::escalation::{EscalationProtocol, EscalationReport};
use super::pacer::{Pacer, Tick};
use crate::core::config::Config;
use crate::notify::{Alert, AlertKind, NotificationGateway};
use crate::probe::{ConnState, ControllerProbe, RunState};

// ---------------------------------------------------------------------------
// State & settings
// ---------------------------------------------------------------------------

/// Edge-triggered notification flags. `true` means "not yet announced".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WatchdogState {
    /// DISCONNECTED is due on the next failed connect.
    pub notify_connect_error: bool,
    /// CONNECTED is due on the next successful connect.
    pub notify_connect_ok: bool,
    /// RUN is due on the next RUN reading.
    pub notify_run: bool,
}

impl Default for WatchdogState {
    fn default() -> Self {
        Self {
            notify_connect_error: true,
            notify_connect_ok: true,
            notify_run: true,
        }
    }
}

/// Timing and labelling for a [`Watchdog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchdogSettings {
    /// Wait before each cycle.
    pub polling_interval: Duration,
    /// Wait between acknowledgment polls of an open incident.
    pub grace_interval: Duration,
    /// Human-readable controller name used in alert text.
    pub controller: String,
}

impl WatchdogSettings {
    /// Settings for the configured controller.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            polling_interval: config.watchdog.polling_interval(),
            grace_interval: config.watchdog.grace_interval(),
            controller: config.controller.label(),
        }
    }
}

/// What one cycle observed and did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Connection outcome of this cycle.
    pub conn: ConnState,
    /// `None` when the controller was unreachable.
    pub run_state: Option<RunState>,
    /// Informational alerts attempted, in order.
    pub alerts: Vec<AlertKind>,
    /// Set when a STOP reading escalated.
    pub escalation: Option<EscalationReport>,
}

// ---------------------------------------------------------------------------
// Watchdog
// ---------------------------------------------------------------------------

/// Supervises one controller through one gateway.
#[derive(Debug)]
pub struct Watchdog<P, G, K> {
    probe: P,
    gateway: G,
    pacer: K,
    state: WatchdogState,
    settings: WatchdogSettings,
    escalation: EscalationProtocol,
}

impl<P, G, K> Watchdog<P, G, K>
where
    P: ControllerProbe,
    G: NotificationGateway,
    K: Pacer,
{
    /// Watchdog with all notices armed.
    pub fn new(probe: P, gateway: G, pacer: K, settings: WatchdogSettings) -> Self {
        let escalation = EscalationProtocol::new(settings.grace_interval, settings.controller.clone());
        Self {
            probe,
            gateway,
            pacer,
            state: WatchdogState::default(),
            settings,
            escalation,
        }
    }

    /// Current edge flags.
    #[must_use]
    pub const fn state(&self) -> WatchdogState {
        self.state
    }

    /// Settings the watchdog was built with.
    #[must_use]
    pub const fn settings(&self) -> &WatchdogSettings {
        &self.settings
    }

    /// The supervised controller.
    pub const fn probe(&self) -> &P {
        &self.probe
    }

    /// The alert gateway.
    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    /// The pacer, e.g. to inspect elapsed waits in tests.
    pub const fn pacer(&self) -> &K {
        &self.pacer
    }

    /// Run cycles until the pacer reports shutdown. Returns the number of
    /// completed cycles.
    pub fn run(&mut self) -> u64 {
        info!(
            controller = %self.settings.controller,
            polling_secs = self.settings.polling_interval.as_secs(),
            grace_secs = self.settings.grace_interval.as_secs(),
            "watchdog started"
        );
        let mut cycles = 0_u64;
        while self.pacer.wait(self.settings.polling_interval) == Tick::Elapsed {
            self.run_cycle();
            cycles += 1;
        }
        info!(cycles, "watchdog stopping on shutdown request");
        cycles
    }

    /// One poll cycle, without the leading wait.
    pub fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport {
            conn: ConnState::Disconnected,
            run_state: None,
            alerts: Vec::new(),
            escalation: None,
        };

        match self.probe.connect() {
            Err(err) => {
                debug!(error = %err, "controller unreachable");
                if self.state.notify_connect_error {
                    self.announce(AlertKind::Disconnected, &mut report);
                    self.state.notify_connect_error = false;
                }
                self.state.notify_connect_ok = true;
            }
            Ok(()) => {
                report.conn = ConnState::Connected;
                if self.state.notify_connect_ok {
                    self.announce(AlertKind::Connected, &mut report);
                    self.state.notify_connect_ok = false;
                }
                self.state.notify_connect_error = true;

                let run_state = self.probe.status();
                report.run_state = Some(run_state);
                match run_state {
                    RunState::Stop => {
                        self.state.notify_run = true;
                        let escalation =
                            self.escalation
                                .run(&mut self.probe, &self.gateway, &mut self.pacer);
                        if escalation.resolved() {
                            self.state.notify_run = true;
                        }
                        report.escalation = Some(escalation);
                    }
                    RunState::Run => {
                        if self.state.notify_run {
                            self.announce(AlertKind::Running, &mut report);
                            self.state.notify_run = false;
                        }
                    }
                    RunState::Unknown => debug!("run state unknown; nothing to do"),
                }
            }
        }

        if let Err(err) = self.probe.disconnect() {
            warn!(error = %err, "disconnect failed");
        }
        report
    }

    /// Final best-effort disconnect.
    pub fn shutdown(&mut self) {
        match self.probe.disconnect() {
            Ok(()) => debug!("controller session closed"),
            Err(err) => warn!(error = %err, "disconnect on shutdown failed"),
        }
    }

    /// Fire-and-forget informational alert.
    fn announce(&self, kind: AlertKind, report: &mut CycleReport) {
        let alert = Alert::for_kind(kind, &self.settings.controller);
        match self.gateway.send_alert(&alert) {
            Ok(_) => info!(%kind, "alert sent"),
            Err(err) => warn!(%kind, error = %err, "alert failed; not retried"),
        }
        report.alerts.push(kind);
    }
}
