//! Integration tests for the delivery gateway.
//!
//! Each test spins up a fake Graph API on a random port and points a
//! `DeliveryGateway` at it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::time::timeout;

use wa_relay::config::WhatsAppConfig;
use wa_relay::error::DeliveryError;
use wa_relay::whatsapp::{DeliveryGateway, MessageSender};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// How the fake API answers.
#[derive(Clone, Copy)]
enum Mode {
    Accept,
    Reject,
    Stall,
}

/// A request the fake API received.
#[derive(Debug, Clone)]
struct Captured {
    phone_number_id: String,
    authorization: Option<String>,
    body: Value,
}

#[derive(Clone)]
struct FakeApi {
    mode: Mode,
    captured: Arc<Mutex<Vec<Captured>>>,
}

async fn messages(
    State(api): State<FakeApi>,
    Path(phone_number_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    api.captured.lock().unwrap().push(Captured {
        phone_number_id,
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body,
    });

    match api.mode {
        Mode::Accept => (
            StatusCode::OK,
            Json(serde_json::json!({
                "messaging_product": "whatsapp",
                "contacts": [{"input": "34600111222", "wa_id": "34600111222"}],
                "messages": [{"id": "wamid.TEST"}]
            })),
        ),
        Mode::Reject => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": {"message": "Invalid OAuth access token", "code": 190}
            })),
        ),
        Mode::Stall => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            (StatusCode::OK, Json(serde_json::json!({})))
        }
    }
}

/// Start the fake API, return a gateway aimed at it plus the capture log.
async fn start_fake_api(
    mode: Mode,
    send_timeout: Duration,
) -> (DeliveryGateway, Arc<Mutex<Vec<Captured>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/v18.0/{phone}/messages", post(messages))
        .with_state(FakeApi {
            mode,
            captured: Arc::clone(&captured),
        });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let mut config = WhatsAppConfig::new("test-token", "555000");
    config.base_url = format!("http://127.0.0.1:{port}");
    config.send_timeout = send_timeout;

    (DeliveryGateway::new(config), captured)
}

#[tokio::test]
async fn sends_text_payload_with_bearer_token() {
    timeout(TEST_TIMEOUT, async {
        let (gateway, captured) = start_fake_api(Mode::Accept, Duration::from_secs(2)).await;

        let receipt = gateway
            .send_text("34600111222", "Hola **Lucía** 【1†fuente】")
            .await
            .unwrap();

        assert_eq!(receipt.status, 200);
        assert_eq!(receipt.message_id.as_deref(), Some("wamid.TEST"));

        let captured = captured.lock().unwrap();
        assert_eq!(captured.len(), 1);
        let request = &captured[0];
        assert_eq!(request.phone_number_id, "555000");
        assert_eq!(request.authorization.as_deref(), Some("Bearer test-token"));
        assert_eq!(request.body["messaging_product"], "whatsapp");
        assert_eq!(request.body["recipient_type"], "individual");
        assert_eq!(request.body["to"], "34600111222");
        assert_eq!(request.body["type"], "text");
        assert_eq!(request.body["text"]["preview_url"], false);
        assert_eq!(request.body["text"]["body"], "Hola *Lucía*");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn non_2xx_is_transport_error() {
    timeout(TEST_TIMEOUT, async {
        let (gateway, captured) = start_fake_api(Mode::Reject, Duration::from_secs(2)).await;

        let err = gateway.send_text("34600111222", "hola").await.unwrap_err();

        match err {
            DeliveryError::Transport(reason) => assert!(reason.contains("401")),
            other => panic!("expected Transport, got {other:?}"),
        }
        // Exactly one attempt: the gateway never retries.
        assert_eq!(captured.lock().unwrap().len(), 1);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn slow_api_is_timeout_error() {
    timeout(TEST_TIMEOUT, async {
        let (gateway, _captured) = start_fake_api(Mode::Stall, Duration::from_millis(200)).await;

        let err = gateway.send_text("34600111222", "hola").await.unwrap_err();

        assert!(
            matches!(err, DeliveryError::Timeout(t) if t == Duration::from_millis(200)),
            "expected Timeout, got {err:?}"
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn reply_that_formats_to_nothing_never_reaches_api() {
    timeout(TEST_TIMEOUT, async {
        let (gateway, captured) = start_fake_api(Mode::Accept, Duration::from_secs(2)).await;

        let err = gateway.send_text("34600111222", "【HOLA】").await.unwrap_err();

        assert!(matches!(err, DeliveryError::Transport(_)), "got {err:?}");
        assert!(captured.lock().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}
