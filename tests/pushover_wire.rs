//! Pushover wire contract, exercised against a local mock server.

use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::json;

use plcwatchd::core::config::PushoverConfig;
use plcwatchd::notify::pushover::PushoverGateway;
use plcwatchd::notify::{AckState, Alert, AlertKind, GatewayError, NotificationGateway, Receipt};

const CONTROLLER: &str = "10.0.0.1 (rack 0, slot 2)";

fn gateway(api_base: String, devices: &[&str]) -> PushoverGateway {
    let config = PushoverConfig {
        user_key: "user".to_string(),
        app_token: "app".to_string(),
        devices: devices.iter().map(ToString::to_string).collect(),
        api_base,
        ..PushoverConfig::default()
    };
    PushoverGateway::from_config(&config).expect("client builds")
}

#[test]
fn emergency_send_posts_ordered_form_and_returns_receipt() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/messages.json")
            .header("content-type", "application/x-www-form-urlencoded")
            .body_contains("token=app&user=user&priority=2&retry=60&expire=600&title=PLC+in+STOP&message=");
        then.status(200)
            .json_body(json!({"status": 1, "request": "req-1", "receipt": "r123"}));
    });

    let receipt = gateway(server.base_url(), &[])
        .send_alert(&Alert::for_kind(AlertKind::Stopped, CONTROLLER))
        .expect("send succeeds");

    mock.assert();
    assert_eq!(receipt, Receipt::new("r123"));
}

#[test]
fn device_filter_precedes_title() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/messages.json")
            .body_contains("expire=600&device=phone%2Ctablet&title=PLC+in+RUN");
        then.status(200).json_body(json!({"status": 1, "request": "req-2"}));
    });

    let receipt = gateway(server.base_url(), &["phone", "tablet"])
        .send_alert(&Alert::for_kind(AlertKind::Running, CONTROLLER))
        .expect("send succeeds");

    mock.assert();
    assert!(receipt.is_empty(), "informational sends carry no receipt");
}

#[test]
fn rejected_send_surfaces_service_errors() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/messages.json");
        then.status(400).json_body(json!({
            "status": 0,
            "request": "req-3",
            "errors": ["user identifier is invalid"]
        }));
    });

    let err = gateway(server.base_url(), &[])
        .send_alert(&Alert::for_kind(AlertKind::Stopped, CONTROLLER))
        .expect_err("service refused");

    assert_eq!(
        err,
        GatewayError::Protocol {
            status: 0,
            detail: "user identifier is invalid".to_string()
        }
    );
}

#[test]
fn poll_decodes_acknowledged_and_expired() {
    let server = MockServer::start();
    let acked = server.mock(|when, then| {
        when.method(GET)
            .path("/receipts/r-ack.json")
            .query_param("token", "app");
        then.status(200)
            .json_body(json!({"status": 1, "acknowledged": 1, "expired": 0}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/receipts/r-exp.json");
        then.status(200)
            .json_body(json!({"status": 1, "acknowledged": 0, "expired": 1}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/receipts/r-wait.json");
        then.status(200)
            .json_body(json!({"status": 1, "acknowledged": 0, "expired": 0}));
    });

    let gateway = gateway(server.base_url(), &[]);

    assert_eq!(
        gateway.poll_acknowledgment(&Receipt::new("r-ack")),
        Ok(AckState::Acknowledged)
    );
    assert_eq!(
        gateway.poll_acknowledgment(&Receipt::new("r-exp")),
        Ok(AckState::Expired)
    );
    assert_eq!(
        gateway.poll_acknowledgment(&Receipt::new("r-wait")),
        Ok(AckState::Pending)
    );
    acked.assert();
}

#[test]
fn cancel_posts_token_to_receipt_path() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/receipts/r123/cancel.json")
            .body_contains("token=app");
        then.status(200).json_body(json!({"status": 1, "request": "req-4"}));
    });

    gateway(server.base_url(), &[])
        .cancel_alert(&Receipt::new("r123"))
        .expect("cancel succeeds");

    mock.assert();
}

#[test]
fn non_json_reply_is_a_decode_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/receipts/r1.json");
        then.status(502).body("<html>bad gateway</html>");
    });

    let err = gateway(server.base_url(), &[])
        .poll_acknowledgment(&Receipt::new("r1"))
        .expect_err("body is not JSON");

    assert!(matches!(err, GatewayError::Decode(_)), "got {err:?}");
}

#[test]
fn unreachable_service_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);

    let err = gateway(format!("http://127.0.0.1:{port}"), &[])
        .send_alert(&Alert::for_kind(AlertKind::Disconnected, CONTROLLER))
        .expect_err("nothing listens there");

    assert!(matches!(err, GatewayError::Transport(_)), "got {err:?}");
}
