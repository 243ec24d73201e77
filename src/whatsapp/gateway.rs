//! Outbound delivery through the WhatsApp Cloud API.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use secrecy::ExposeSecret;
use serde_json::Value;

use crate::config::WhatsAppConfig;
use crate::error::DeliveryError;
use crate::whatsapp::format::format_for_whatsapp;

/// Anything that can deliver a text message to a WhatsApp recipient.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Deliver `text` to `recipient`. One attempt, no retry.
    async fn send_text(&self, recipient: &str, text: &str) -> Result<SendReceipt, DeliveryError>;
}

/// What the API told us about an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub status: u16,
    /// `messages[0].id` from the response, when the API returned one.
    pub message_id: Option<String>,
}

/// Build the Cloud API body for a plain text message.
pub fn text_message_payload(recipient: &str, text: &str) -> Value {
    serde_json::json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": recipient,
        "type": "text",
        "text": {
            "preview_url": false,
            "body": text,
        },
    })
}

/// Graph API client for sending replies.
pub struct DeliveryGateway {
    config: WhatsAppConfig,
    client: reqwest::Client,
}

impl DeliveryGateway {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &WhatsAppConfig {
        &self.config
    }

    fn map_error(&self, e: reqwest::Error) -> DeliveryError {
        if e.is_timeout() {
            tracing::error!(timeout = ?self.config.send_timeout, "Timeout while sending WhatsApp message");
            DeliveryError::Timeout(self.config.send_timeout)
        } else {
            tracing::error!(error = %e, "WhatsApp send request failed");
            DeliveryError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl MessageSender for DeliveryGateway {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<SendReceipt, DeliveryError> {
        let formatted = format_for_whatsapp(text);
        if formatted.is_empty() {
            tracing::error!(recipient, "Refusing to send an empty WhatsApp message");
            return Err(DeliveryError::Transport("empty message body".to_string()));
        }
        let body = text_message_payload(recipient, &formatted);

        let resp = self
            .client
            .post(self.config.messages_url())
            .bearer_auth(self.config.access_token.expose_secret())
            .timeout(self.config.send_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let text = resp.text().await.map_err(|e| self.map_error(e))?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), body = %text, "WhatsApp API rejected message");
            return Err(DeliveryError::Transport(format!(
                "messaging API returned {status}: {text}"
            )));
        }

        tracing::info!(status = status.as_u16(), content_type = %content_type, body = %text, "WhatsApp message sent");

        let message_id = serde_json::from_str::<Value>(&text).ok().and_then(|v| {
            v.get("messages")?
                .get(0)?
                .get("id")?
                .as_str()
                .map(String::from)
        });

        Ok(SendReceipt {
            status: status.as_u16(),
            message_id,
        })
    }
}
