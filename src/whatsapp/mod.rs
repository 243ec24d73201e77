//! WhatsApp Cloud API: inbound payloads, markup and outbound delivery.

pub mod format;
pub mod gateway;
pub mod payload;

pub use format::format_for_whatsapp;
pub use gateway::{DeliveryGateway, MessageSender, SendReceipt, text_message_payload};
pub use payload::{
    InboundMessage, MessageContent, is_status_update, is_valid_whatsapp_message, normalize,
};
