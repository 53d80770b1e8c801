//! Pushover adapter for [`NotificationGateway`].
//!
//! Wire contract:
//! - send: `POST {api}/messages.json`, form fields
//!   `token, user, priority, retry, expire, device?, title, message`
//! - poll: `GET {api}/receipts/{receipt}.json?token=...`
//! - cancel: `POST {api}/receipts/{receipt}/cancel.json`, form field `token`
//!
//! Every response is JSON with `status == 1` on success and an `errors` array
//! otherwise.

use std::fmt;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{AckState, Alert, GatewayError, NotificationGateway, Receipt};
use crate::core::config::PushoverConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    request: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    receipt: Option<String>,
    #[serde(default)]
    acknowledged: i64,
    #[serde(default)]
    expired: i64,
}

/// Blocking Pushover client.
pub struct PushoverGateway {
    client: Client,
    api_base: String,
    user_key: String,
    app_token: String,
    retry_secs: u32,
    expire_secs: u32,
    devices: Vec<String>,
}

impl PushoverGateway {
    pub fn from_config(config: &PushoverConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .user_agent(concat!("plcwatchd/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            user_key: config.user_key.clone(),
            app_token: config.app_token.clone(),
            retry_secs: config.retry_secs,
            expire_secs: config.expire_secs,
            devices: config.devices.clone(),
        })
    }

    /// Form body for a send, in wire order.
    fn form_fields(&self, alert: &Alert) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("token", self.app_token.clone()),
            ("user", self.user_key.clone()),
            ("priority", alert.priority.wire_value().to_string()),
            ("retry", self.retry_secs.to_string()),
            ("expire", self.expire_secs.to_string()),
        ];
        if !self.devices.is_empty() {
            fields.push(("device", self.devices.join(",")));
        }
        fields.push(("title", alert.title.clone()));
        fields.push(("message", alert.message.clone()));
        fields
    }

    fn receipt_url(&self, receipt: &Receipt, suffix: &str) -> Result<String, GatewayError> {
        if receipt.is_empty() {
            return Err(GatewayError::EmptyReceipt);
        }
        Ok(format!("{}/receipts/{}{suffix}", self.api_base, receipt.as_str()))
    }

    /// Decode a response body and enforce `status == 1`.
    fn evaluate(response: Response, operation: &'static str) -> Result<ApiResponse, GatewayError> {
        let http_status = response.status();
        let body = response.text()?;
        let reply: ApiResponse = serde_json::from_str(&body)
            .map_err(|err| GatewayError::Decode(format!("HTTP {http_status}: {err}")))?;
        if reply.status != 1 {
            let detail = if reply.errors.is_empty() {
                format!("unable to access Pushover (HTTP {http_status})")
            } else {
                reply.errors.join("; ")
            };
            warn!(operation, status = reply.status, %detail, "Pushover rejected request");
            return Err(GatewayError::Protocol {
                status: reply.status,
                detail,
            });
        }
        debug!(operation, request = reply.request.as_deref().unwrap_or("-"), "Pushover accepted request");
        Ok(reply)
    }
}

impl fmt::Debug for PushoverGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushoverGateway")
            .field("api_base", &self.api_base)
            .field("retry_secs", &self.retry_secs)
            .field("expire_secs", &self.expire_secs)
            .field("devices", &self.devices)
            .finish_non_exhaustive()
    }
}

impl NotificationGateway for PushoverGateway {
    fn send_alert(&self, alert: &Alert) -> Result<Receipt, GatewayError> {
        debug!(
            kind = %alert.kind,
            priority = alert.priority.wire_value(),
            "sending Pushover message"
        );
        let response = self
            .client
            .post(format!("{}/messages.json", self.api_base))
            .form(&self.form_fields(alert))
            .send()?;
        let reply = Self::evaluate(response, "send")?;
        let receipt = reply.receipt.map(Receipt::new).unwrap_or_default();
        if alert.priority.requires_acknowledgment() {
            if receipt.is_empty() {
                warn!(kind = %alert.kind, "emergency accepted but no receipt returned");
            } else {
                info!(receipt = %receipt, "emergency receipt issued");
            }
        }
        Ok(receipt)
    }

    fn poll_acknowledgment(&self, receipt: &Receipt) -> Result<AckState, GatewayError> {
        let url = self.receipt_url(receipt, ".json")?;
        let response = self
            .client
            .get(url)
            .query(&[("token", self.app_token.as_str())])
            .send()?;
        let reply = Self::evaluate(response, "poll")?;
        let state = if reply.acknowledged == 1 {
            AckState::Acknowledged
        } else if reply.expired == 1 {
            AckState::Expired
        } else {
            AckState::Pending
        };
        debug!(receipt = %receipt, ?state, "receipt polled");
        Ok(state)
    }

    fn cancel_alert(&self, receipt: &Receipt) -> Result<(), GatewayError> {
        let url = self.receipt_url(receipt, "/cancel.json")?;
        let response = self
            .client
            .post(url)
            .form(&[("token", self.app_token.as_str())])
            .send()?;
        Self::evaluate(response, "cancel")?;
        info!(receipt = %receipt, "emergency cancelled");
        Ok(())
    }
}
