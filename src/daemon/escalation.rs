//! Escalation protocol for a STOP incident.
//!
//! `IDLE -> RAISED -> {ACKNOWLEDGED | WITHDRAWN}`. Once raised, the protocol
//! owns the single control flow until one of the two terminal edges fires:
//!
//! - acknowledgment (checked first on every poll) requests a warm start and
//!   never cancels;
//! - a live reading other than STOP cancels the outstanding alert.
//!
//! Gateway poll failures and `EXPIRED` receipts keep the loop going. A lost
//! controller session keeps the loop going as well; only a reading taken over
//! a working session can withdraw the incident.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::pacer::{Pacer, Tick};
use crate::notify::{AckState, Alert, AlertKind, NotificationGateway, Receipt};
use crate::probe::{ControllerProbe, RunState};

/// Terminal state reached by one escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationOutcome {
    /// The emergency could not be raised (send failed or no receipt).
    NotRaised,
    /// The operator acknowledged; a warm start was requested.
    Acknowledged,
    /// The controller left STOP on its own; the alert was cancelled.
    Withdrawn,
    /// Shutdown was requested while the incident was open.
    Interrupted,
}

/// One raised-but-unresolved emergency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Incident {
    /// Receipt the gateway issued for the emergency.
    pub receipt: Receipt,
    /// When the emergency was accepted by the gateway.
    pub raised_at: DateTime<Utc>,
}

/// What happened during one escalation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscalationReport {
    /// Terminal state reached.
    pub outcome: EscalationOutcome,
    /// Acknowledgment polls performed.
    pub polls: u32,
    /// `None` when the emergency was never raised.
    pub incident: Option<Incident>,
    /// Whether the gateway reported the receipt as expired at least once.
    pub expired_seen: bool,
}

impl EscalationReport {
    fn not_raised() -> Self {
        Self {
            outcome: EscalationOutcome::NotRaised,
            polls: 0,
            incident: None,
            expired_seen: false,
        }
    }

    /// Whether the loop should re-arm the RUN notice.
    #[must_use]
    pub const fn resolved(&self) -> bool {
        matches!(
            self.outcome,
            EscalationOutcome::Acknowledged | EscalationOutcome::Withdrawn
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Observation {
    Live(RunState),
    Lost,
}

/// Drives a single incident from raise to resolution.
#[derive(Debug, Clone)]
pub struct EscalationProtocol {
    grace: Duration,
    controller: String,
}

impl EscalationProtocol {
    /// Default pause between acknowledgment polls.
    pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

    /// Protocol polling every `grace`, naming `controller` in alert text.
    #[must_use]
    pub fn new(grace: Duration, controller: impl Into<String>) -> Self {
        Self {
            grace,
            controller: controller.into(),
        }
    }

    /// Pause between acknowledgment polls.
    #[must_use]
    pub const fn grace(&self) -> Duration {
        self.grace
    }

    /// Raise the STOP emergency and block until it resolves.
    pub fn run<P, G, K>(&self, probe: &mut P, gateway: &G, pacer: &mut K) -> EscalationReport
    where
        P: ControllerProbe + ?Sized,
        G: NotificationGateway + ?Sized,
        K: Pacer + ?Sized,
    {
        let alert = Alert::for_kind(AlertKind::Stopped, &self.controller);
        let receipt = match gateway.send_alert(&alert) {
            Ok(receipt) if !receipt.is_empty() => receipt,
            Ok(_) => {
                warn!("emergency alert returned no receipt; retrying next cycle");
                return EscalationReport::not_raised();
            }
            Err(err) => {
                warn!(error = %err, "emergency alert failed; retrying next cycle");
                return EscalationReport::not_raised();
            }
        };

        let incident = Incident {
            receipt,
            raised_at: Utc::now(),
        };
        info!(receipt = %incident.receipt, "incident raised, waiting for acknowledgment");

        let mut polls = 0_u32;
        let mut expired_seen = false;
        let finish = |outcome, polls, expired_seen, incident: Incident| {
            let open_for = Utc::now() - incident.raised_at;
            info!(
                receipt = %incident.receipt,
                ?outcome,
                polls,
                open_secs = open_for.num_seconds(),
                "incident closed"
            );
            EscalationReport {
                outcome,
                polls,
                incident: Some(incident),
                expired_seen,
            }
        };

        loop {
            if pacer.wait(self.grace) == Tick::Shutdown {
                warn!(
                    receipt = %incident.receipt,
                    "shutdown while incident open; receipt left outstanding"
                );
                return finish(EscalationOutcome::Interrupted, polls, expired_seen, incident);
            }
            polls += 1;

            let observation = observe(probe);
            let ack = match gateway.poll_acknowledgment(&incident.receipt) {
                Ok(state) => state,
                Err(err) => {
                    warn!(error = %err, poll = polls, "acknowledgment poll failed; treating as pending");
                    AckState::Pending
                }
            };
            debug!(poll = polls, ?observation, ?ack, "escalation poll");

            if ack == AckState::Acknowledged {
                info!(receipt = %incident.receipt, "acknowledged; requesting warm start");
                request_warm_start(probe);
                return finish(EscalationOutcome::Acknowledged, polls, expired_seen, incident);
            }
            if ack == AckState::Expired && !expired_seen {
                expired_seen = true;
                warn!(
                    receipt = %incident.receipt,
                    "emergency expired unacknowledged; still watching the controller"
                );
            }

            match observation {
                Observation::Live(RunState::Stop) | Observation::Lost => {}
                Observation::Live(state) => {
                    info!(
                        receipt = %incident.receipt,
                        run_state = %state,
                        "controller left STOP without operator action; cancelling emergency"
                    );
                    if let Err(err) = gateway.cancel_alert(&incident.receipt) {
                        warn!(error = %err, "cancel failed; alert will expire on its own");
                    }
                    return finish(EscalationOutcome::Withdrawn, polls, expired_seen, incident);
                }
            }
        }
    }
}

/// Read the controller, reconnecting once if the session was dropped.
fn observe<P: ControllerProbe + ?Sized>(probe: &mut P) -> Observation {
    if !probe.is_connected() {
        if let Err(err) = probe.connect() {
            debug!(error = %err, "controller still unreachable during escalation");
            return Observation::Lost;
        }
        info!("controller session re-established during escalation");
    }
    let state = probe.status();
    if state == RunState::Unknown && !probe.is_connected() {
        Observation::Lost
    } else {
        Observation::Live(state)
    }
}

fn request_warm_start<P: ControllerProbe + ?Sized>(probe: &mut P) {
    if !probe.is_connected() {
        if let Err(err) = probe.connect() {
            warn!(error = %err, "cannot reach controller for warm start");
            return;
        }
    }
    match probe.request_warm_start() {
        Ok(()) => info!("warm start requested"),
        Err(err) => warn!(error = %err, "warm start request failed"),
    }
}
