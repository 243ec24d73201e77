//! Error types for the relay.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    #[error("Launch error: {0}")]
    Launch(#[from] LaunchError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Inbound webhook errors.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Malformed WhatsApp payload: {0}")]
    MalformedPayload(String),

    #[error("Unsupported message type: {0}")]
    UnsupportedMessageType(String),

    #[error("Webhook signature verification failed")]
    InvalidSignature,
}

/// External lookup launch errors.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Failed to spawn {program} {script}: {reason}")]
    Spawn {
        program: String,
        script: String,
        reason: String,
    },

    #[error("No async runtime available to supervise the lookup process")]
    NoRuntime,

    #[error("Failed to wait for lookup process: {0}")]
    Wait(String),
}

/// Outbound delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Request to messaging API timed out after {0:?}")]
    Timeout(Duration),

    #[error("Messaging API request failed: {0}")]
    Transport(String),
}

/// Category registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Prefix '{0}' is already registered")]
    DuplicatePrefix(String),

    #[error("Category prefix must not be empty")]
    EmptyPrefix,
}

/// Scheduler errors.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Invalid trigger '{trigger}': {reason}")]
    InvalidTrigger { trigger: String, reason: String },

    #[error("Scheduler already started")]
    AlreadyStarted,

    #[error("Scheduler has been shut down")]
    Stopped,
}

/// Result type alias for the relay.
pub type Result<T> = std::result::Result<T, Error>;
