//! Scheduled announcements: canned messages sent through the gateway.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Error;
use crate::scheduler::ScheduledTask;
use crate::whatsapp::MessageSender;

/// Sends a fixed text to a fixed recipient each time it fires.
///
/// The sender carries its own credentials, so nothing has to be looked up
/// from shared application state when the job runs.
pub struct Announcement {
    recipient: String,
    text: String,
    sender: Arc<dyn MessageSender>,
}

impl Announcement {
    pub fn new(
        recipient: impl Into<String>,
        text: impl Into<String>,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            text: text.into(),
            sender,
        }
    }
}

#[async_trait]
impl ScheduledTask for Announcement {
    async fn run(&self) -> Result<(), Error> {
        tracing::info!(recipient = %self.recipient, "Sending scheduled announcement");
        let receipt = self.sender.send_text(&self.recipient, &self.text).await?;
        tracing::debug!(message_id = ?receipt.message_id, "Scheduled announcement delivered");
        Ok(())
    }
}
