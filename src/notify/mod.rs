//! Notification gateway boundary: alerts, receipts, acknowledgment polling.
//!
//! The watchdog only ever talks to [`NotificationGateway`]. Recipient, token,
//! retry/expire parameters and device filtering are gateway configuration, so
//! the core hands over nothing but the [`Alert`] itself.

pub mod pushover;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Pushover message priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Lowest,
    Low,
    Normal,
    High,
    /// Re-delivered until acknowledged or expired; yields a receipt.
    Emergency,
}

impl Priority {
    /// Wire value (`-2..=2`).
    #[must_use]
    pub const fn wire_value(self) -> i8 {
        match self {
            Self::Lowest => -2,
            Self::Low => -1,
            Self::Normal => 0,
            Self::High => 1,
            Self::Emergency => 2,
        }
    }

    #[must_use]
    pub const fn requires_acknowledgment(self) -> bool {
        matches!(self, Self::Emergency)
    }
}

/// Which watchdog edge produced an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Disconnected,
    Connected,
    Running,
    Stopped,
}

impl AlertKind {
    #[must_use]
    pub const fn priority(self) -> Priority {
        match self {
            Self::Disconnected => Priority::High,
            Self::Connected => Priority::Normal,
            Self::Running => Priority::Low,
            Self::Stopped => Priority::Emergency,
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Running => "running",
            Self::Stopped => "stopped",
        })
    }
}

/// A single push notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub priority: Priority,
}

impl Alert {
    /// Standard alert text for `kind`, naming the supervised `controller`.
    #[must_use]
    pub fn for_kind(kind: AlertKind, controller: &str) -> Self {
        let (title, message) = match kind {
            AlertKind::Disconnected => (
                "PLC unreachable".to_string(),
                format!("Lost connection to PLC {controller}."),
            ),
            AlertKind::Connected => (
                "PLC connected".to_string(),
                format!("Connection to PLC {controller} established."),
            ),
            AlertKind::Running => (
                "PLC in RUN".to_string(),
                format!("PLC {controller} is running."),
            ),
            AlertKind::Stopped => (
                "PLC in STOP".to_string(),
                format!("PLC {controller} stopped. Acknowledge this message to request RUN."),
            ),
        };
        Self {
            kind,
            title,
            message,
            priority: kind.priority(),
        }
    }
}

/// Opaque gateway token identifying one emergency alert. May be empty when
/// the gateway produced none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Receipt(String);

impl Receipt {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of polling an emergency receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AckState {
    Acknowledged,
    /// The gateway stopped re-delivering; the operator never acknowledged.
    Expired,
    Pending,
}

/// Failures raised by a [`NotificationGateway`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Network, TLS, or timeout failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The service answered but refused the request.
    #[error("service rejected request (status {status}): {detail}")]
    Protocol { status: i64, detail: String },

    /// The response could not be decoded.
    #[error("undecodable response: {0}")]
    Decode(String),

    /// A receipt-scoped call was made without a receipt.
    #[error("receipt is empty")]
    EmptyReceipt,
}

impl From<reqwest::Error> for GatewayError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}

/// Push-notification service with emergency receipts.
pub trait NotificationGateway {
    /// Deliver `alert`. Emergency alerts yield a receipt; other priorities
    /// return [`Receipt::empty`].
    fn send_alert(&self, alert: &Alert) -> Result<Receipt, GatewayError>;

    /// Check whether the operator acknowledged the alert behind `receipt`.
    fn poll_acknowledgment(&self, receipt: &Receipt) -> Result<AckState, GatewayError>;

    /// Stop re-delivery of the alert behind `receipt`.
    fn cancel_alert(&self, receipt: &Receipt) -> Result<(), GatewayError>;
}

impl<G: NotificationGateway + ?Sized> NotificationGateway for Box<G> {
    fn send_alert(&self, alert: &Alert) -> Result<Receipt, GatewayError> {
        (**self).send_alert(alert)
    }

    fn poll_acknowledgment(&self, receipt: &Receipt) -> Result<AckState, GatewayError> {
        (**self).poll_acknowledgment(receipt)
    }

    fn cancel_alert(&self, receipt: &Receipt) -> Result<(), GatewayError> {
        (**self).cancel_alert(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities_map_to_wire_values() {
        assert_eq!(Priority::Lowest.wire_value(), -2);
        assert_eq!(Priority::Normal.wire_value(), 0);
        assert_eq!(Priority::Emergency.wire_value(), 2);
        assert!(Priority::Emergency.requires_acknowledgment());
        assert!(!Priority::High.requires_acknowledgment());
    }

    #[test]
    fn only_stop_alerts_are_emergencies() {
        for kind in [
            AlertKind::Disconnected,
            AlertKind::Connected,
            AlertKind::Running,
        ] {
            assert!(kind.priority() < Priority::Emergency, "{kind} must be informational");
        }
        let alert = Alert::for_kind(AlertKind::Stopped, "10.0.0.1 (rack 0, slot 2)");
        assert_eq!(alert.priority, Priority::Emergency);
        assert!(alert.message.contains("Acknowledge this message to request RUN."));
        assert!(alert.message.contains("10.0.0.1"));
    }

    #[test]
    fn blank_receipts_count_as_empty() {
        assert!(Receipt::empty().is_empty());
        assert!(Receipt::new("  ").is_empty());
        assert!(!Receipt::new("r4nd0m").is_empty());
    }
}
