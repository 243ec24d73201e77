//! wa-relay: WhatsApp webhook relay with prefix-routed lookups and
//! scheduled announcements.

pub mod config;
pub mod error;
pub mod routing;
pub mod scheduler;
pub mod webhook;
pub mod whatsapp;
