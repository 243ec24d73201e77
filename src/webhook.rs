//! HTTP boundary: WhatsApp webhook verification and message intake.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, info, warn};

use crate::config::WhatsAppConfig;
use crate::error::{DeliveryError, WebhookError};
use crate::routing::IntentRouter;
use crate::whatsapp::{MessageSender, is_status_update, is_valid_whatsapp_message, normalize};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying `sha256=<hex>` of the raw request body.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// State shared by the webhook handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<IntentRouter>,
    pub sender: Arc<dyn MessageSender>,
    /// Expected `hub.verify_token` for the subscription handshake.
    pub verify_token: String,
    /// Signature secret; requests are not signature-checked when `None`.
    pub app_secret: Option<SecretString>,
    /// Send all replies here instead of back to the sender.
    pub recipient_override: Option<String>,
}

impl AppState {
    pub fn new(
        router: Arc<IntentRouter>,
        sender: Arc<dyn MessageSender>,
        config: &WhatsAppConfig,
    ) -> Self {
        Self {
            router,
            sender,
            verify_token: config.verify_token.clone(),
            app_secret: config.app_secret.clone(),
            recipient_override: config.recipient_override.clone(),
        }
    }
}

/// Build the Axum router with the webhook and health routes.
pub fn webhook_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook", get(verify_subscription).post(receive_event))
        .with_state(state)
}

fn reply(status: StatusCode, message: &str) -> Response {
    let label = if status.is_success() { "ok" } else { "error" };
    (
        status,
        Json(serde_json::json!({ "status": label, "message": message })),
    )
        .into_response()
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "wa-relay"
    }))
}

// ── Subscription handshake ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

async fn verify_subscription(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    let (Some(mode), Some(token)) = (params.mode.as_deref(), params.token.as_deref()) else {
        info!("Webhook verification missing parameters");
        return reply(StatusCode::BAD_REQUEST, "Missing parameters");
    };

    if mode == "subscribe" && !state.verify_token.is_empty() && token == state.verify_token {
        info!("Webhook verified");
        (StatusCode::OK, params.challenge.unwrap_or_default()).into_response()
    } else {
        warn!(mode, "Webhook verification failed");
        reply(StatusCode::FORBIDDEN, "Verification failed")
    }
}

// ── Message intake ──────────────────────────────────────────────────────

async fn receive_event(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Some(secret) = &state.app_secret {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        let valid = signature
            .is_some_and(|sig| verify_signature(&body, sig, secret.expose_secret()));
        if !valid {
            warn!(error = %WebhookError::InvalidSignature, "Rejecting webhook");
            return reply(StatusCode::FORBIDDEN, "Invalid signature");
        }
    }

    let raw: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Failed to decode webhook JSON");
            return reply(StatusCode::BAD_REQUEST, "Invalid JSON provided");
        }
    };

    handle_event(&state, &raw).await
}

/// Normalize, route and answer one webhook event.
///
/// Every failure is turned into a status code here; nothing propagates.
pub async fn handle_event(state: &AppState, raw: &Value) -> Response {
    if is_status_update(raw) {
        debug!("Received WhatsApp status update");
        return reply(StatusCode::OK, "Status update received");
    }

    if !is_valid_whatsapp_message(raw) {
        return reply(StatusCode::NOT_FOUND, "Not a WhatsApp API event");
    }

    let message = match normalize(raw) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "Unexpected WhatsApp payload structure");
            return reply(webhook_error_status(&e), "Malformed message payload");
        }
    };

    let body = match message.text_body() {
        Ok(body) => body,
        Err(e) => {
            info!(sender = %message.sender_id, reason = %e, "Ignoring non-text message");
            return reply(webhook_error_status(&e), "Non-text message ignored");
        }
    };

    let routed = state
        .router
        .route(body, &message.sender_id, &message.sender_name);

    let recipient = state
        .recipient_override
        .as_deref()
        .unwrap_or(&message.sender_id);

    match state.sender.send_text(recipient, &routed.reply_text).await {
        Ok(_) => reply(StatusCode::OK, "OK"),
        Err(e) => {
            warn!(sender = %message.sender_id, error = %e, "Failed to deliver reply");
            let message = match e {
                DeliveryError::Timeout(_) => "Request timed out",
                DeliveryError::Transport(_) => "Failed to send message",
            };
            reply(delivery_error_status(&e), message)
        }
    }
}

/// HTTP status for an inbound payload problem.
pub fn webhook_error_status(e: &WebhookError) -> StatusCode {
    match e {
        WebhookError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
        WebhookError::UnsupportedMessageType(_) => StatusCode::OK,
        WebhookError::InvalidSignature => StatusCode::FORBIDDEN,
    }
}

/// HTTP status for an outbound delivery failure.
pub fn delivery_error_status(e: &DeliveryError) -> StatusCode {
    match e {
        DeliveryError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
        DeliveryError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Check `X-Hub-Signature-256` against the raw body.
pub fn verify_signature(body: &[u8], signature_header: &str, app_secret: &str) -> bool {
    let Some(hex_sig) = signature_header.strip_prefix("sha256=") else {
        warn!("Invalid signature header format (missing sha256= prefix)");
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(body: &[u8], secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn signature_valid() {
        let body = b"{\"object\":\"whatsapp_business_account\"}";
        assert!(verify_signature(body, &sign(body, "s3cret"), "s3cret"));
    }

    #[test]
    fn signature_wrong_secret() {
        let body = b"payload";
        assert!(!verify_signature(body, &sign(body, "other"), "s3cret"));
    }

    #[test]
    fn signature_bad_format() {
        assert!(!verify_signature(b"x", "md5=abc", "s"));
        assert!(!verify_signature(b"x", "sha256=not-hex", "s"));
        assert!(!verify_signature(b"x", "sha256=", "s"));
    }

    #[test]
    fn error_status_mapping() {
        assert_eq!(
            webhook_error_status(&WebhookError::MalformedPayload("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            webhook_error_status(&WebhookError::UnsupportedMessageType("image".into())),
            StatusCode::OK
        );
        assert_eq!(
            delivery_error_status(&DeliveryError::Timeout(std::time::Duration::from_secs(10))),
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(
            delivery_error_status(&DeliveryError::Transport("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
