//! Inbound webhook payload types and normalization.
//!
//! Meta delivers one JSON document per webhook call:
//! `entry[].changes[].value.{contacts[], messages[], statuses[]}`. Only the
//! first entry/change/contact/message is relevant to the relay.

use serde_json::Value;

use crate::error::WebhookError;

// ── Normalized message ──────────────────────────────────────────────────

/// What the sender actually sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    /// Text message; body already trimmed.
    Text(String),
    /// Anything else (image, audio, reaction...). Carries the reported type.
    Other(String),
}

/// The minimal view of an inbound message the router needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender_id: String,
    pub sender_name: String,
    pub message_id: Option<String>,
    pub content: MessageContent,
}

impl InboundMessage {
    /// Text body, or `UnsupportedMessageType` for non-text messages.
    pub fn text_body(&self) -> Result<&str, WebhookError> {
        match &self.content {
            MessageContent::Text(body) => Ok(body),
            MessageContent::Other(kind) => Err(WebhookError::UnsupportedMessageType(kind.clone())),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.content, MessageContent::Text(_))
    }
}

/// Extract sender and message from a raw webhook document.
///
/// Only the `entry[0].changes[0].value.{contacts[0], messages[0]}` path is
/// inspected; a missing or mistyped segment on it is reported as
/// `MalformedPayload`, and everything else in the document is ignored.
/// Non-text messages are not an error: they come back with
/// `MessageContent::Other`.
pub fn normalize(raw: &Value) -> Result<InboundMessage, WebhookError> {
    let value = raw
        .get("entry")
        .and_then(|e| e.get(0))
        .ok_or_else(|| malformed("entry[0]"))?
        .get("changes")
        .and_then(|c| c.get(0))
        .ok_or_else(|| malformed("changes[0]"))?
        .get("value")
        .filter(|v| v.is_object())
        .ok_or_else(|| malformed("value"))?;

    let contact = value
        .get("contacts")
        .and_then(|c| c.get(0))
        .ok_or_else(|| malformed("contacts[0]"))?;
    let sender_id =
        string_at(contact, &["wa_id"]).ok_or_else(|| malformed("contacts[0].wa_id"))?;
    let sender_name = string_at(contact, &["profile", "name"])
        .ok_or_else(|| malformed("contacts[0].profile.name"))?;

    let message = value
        .get("messages")
        .and_then(|m| m.get(0))
        .filter(|m| m.is_object())
        .ok_or_else(|| malformed("messages[0]"))?;

    let content = match message.get("type") {
        Some(Value::String(kind)) if kind == "text" => {
            let body = string_at(message, &["text", "body"])
                .ok_or_else(|| malformed("messages[0].text.body"))?;
            MessageContent::Text(body.trim().to_string())
        }
        Some(Value::String(kind)) => MessageContent::Other(kind.clone()),
        _ => MessageContent::Other("unknown".to_string()),
    };

    Ok(InboundMessage {
        sender_id,
        sender_name,
        message_id: string_at(message, &["id"]),
        content,
    })
}

fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    path.iter()
        .try_fold(value, |v, key| v.get(key))?
        .as_str()
        .map(String::from)
}

fn malformed(path: &str) -> WebhookError {
    WebhookError::MalformedPayload(format!("missing {path}"))
}

/// Cheap structural check that a webhook carries a message at all.
///
/// Requires a truthy `object` and a non-empty
/// `entry[0].changes[0].value.messages[0]`. Never panics on odd shapes.
pub fn is_valid_whatsapp_message(raw: &Value) -> bool {
    if !truthy(raw.get("object")) {
        return false;
    }
    let Some(value) = first_change_value(raw) else {
        return false;
    };
    truthy(
        value
            .get("messages")
            .and_then(Value::as_array)
            .and_then(|m| m.first()),
    )
}

/// True when the webhook only reports delivery/read statuses.
pub fn is_status_update(raw: &Value) -> bool {
    first_change_value(raw)
        .and_then(|v| v.get("statuses"))
        .and_then(Value::as_array)
        .is_some_and(|s| !s.is_empty())
}

fn first_change_value(raw: &Value) -> Option<&Value> {
    let value = raw
        .get("entry")?
        .as_array()?
        .first()?
        .get("changes")?
        .as_array()?
        .first()?
        .get("value")?;
    truthy(Some(value)).then_some(value)
}

/// JSON truthiness: present, not null/false/zero/empty.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}
