//! Configuration types.
//!
//! Everything is read from environment variables once at startup and then
//! passed explicitly to the components that need it.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default Graph API host.
pub const DEFAULT_API_BASE_URL: &str = "https://graph.facebook.com";

/// Default Graph API version.
pub const DEFAULT_API_VERSION: &str = "v18.0";

/// Default outbound request timeout.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// WhatsApp Cloud API credentials and delivery settings.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Bearer token for the Graph API.
    pub access_token: SecretString,
    /// Phone-number id messages are sent from.
    pub phone_number_id: String,
    /// Graph API version path segment (e.g. "v18.0").
    pub api_version: String,
    /// Graph API base URL, overridable for tests.
    pub base_url: String,
    /// Token expected in the webhook subscription handshake.
    pub verify_token: String,
    /// App secret used to check `X-Hub-Signature-256`. No check when unset.
    pub app_secret: Option<SecretString>,
    /// When set, every reply goes to this recipient instead of the sender.
    pub recipient_override: Option<String>,
    /// Upper bound for a single outbound call.
    pub send_timeout: Duration,
}

impl WhatsAppConfig {
    /// Minimal config for the given credentials, everything else defaulted.
    pub fn new(access_token: impl Into<String>, phone_number_id: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            phone_number_id: phone_number_id.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            base_url: DEFAULT_API_BASE_URL.to_string(),
            verify_token: String::new(),
            app_secret: None,
            recipient_override: None,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Full URL of the messages endpoint.
    pub fn messages_url(&self) -> String {
        format!(
            "{}/{}/{}/messages",
            self.base_url.trim_end_matches('/'),
            self.api_version,
            self.phone_number_id
        )
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Where the category lookup scripts live and what runs them.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Interpreter invoked as `program <script> <item name>`.
    pub program: String,
    pub serie_script: PathBuf,
    pub pelicula_script: PathBuf,
    pub libro_script: PathBuf,
    pub juego_script: PathBuf,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            serie_script: PathBuf::from("scripts/serie.py"),
            pelicula_script: PathBuf::from("scripts/pelicula.py"),
            libro_script: PathBuf::from("scripts/libro.py"),
            juego_script: PathBuf::from("scripts/juego.py"),
        }
    }
}

/// A canned message sent every day at a fixed local time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementConfig {
    pub recipient: String,
    pub text: String,
    pub hour: u32,
    pub minute: u32,
}

/// Complete relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub whatsapp: WhatsAppConfig,
    pub server: ServerConfig,
    pub launch: LaunchConfig,
    /// Daily announcement, only when both recipient and text are configured.
    pub announcement: Option<AnnouncementConfig>,
    /// How often the scheduler checks for due jobs.
    pub scheduler_tick: Duration,
}

impl RelayConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        let require =
            |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));

        let send_timeout = match get("WHATSAPP_SEND_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_num(&raw, "WHATSAPP_SEND_TIMEOUT_SECS")?),
            None => DEFAULT_SEND_TIMEOUT,
        };

        let whatsapp = WhatsAppConfig {
            access_token: SecretString::from(require("WHATSAPP_ACCESS_TOKEN")?),
            phone_number_id: require("WHATSAPP_PHONE_NUMBER_ID")?,
            api_version: get("WHATSAPP_API_VERSION")
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            base_url: get("WHATSAPP_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            verify_token: get("WHATSAPP_VERIFY_TOKEN").unwrap_or_default(),
            app_secret: get("WHATSAPP_APP_SECRET").map(SecretString::from),
            recipient_override: get("WHATSAPP_RECIPIENT_WAID"),
            send_timeout,
        };

        let defaults = ServerConfig::default();
        let server = ServerConfig {
            host: get("RELAY_HOST").unwrap_or(defaults.host),
            port: match get("RELAY_PORT") {
                Some(raw) => parse_num(&raw, "RELAY_PORT")?,
                None => defaults.port,
            },
        };

        let defaults = LaunchConfig::default();
        let launch = LaunchConfig {
            program: get("RELAY_LAUNCH_PROGRAM").unwrap_or(defaults.program),
            serie_script: get("RELAY_SCRIPT_SERIE")
                .map(PathBuf::from)
                .unwrap_or(defaults.serie_script),
            pelicula_script: get("RELAY_SCRIPT_PELICULA")
                .map(PathBuf::from)
                .unwrap_or(defaults.pelicula_script),
            libro_script: get("RELAY_SCRIPT_LIBRO")
                .map(PathBuf::from)
                .unwrap_or(defaults.libro_script),
            juego_script: get("RELAY_SCRIPT_JUEGO")
                .map(PathBuf::from)
                .unwrap_or(defaults.juego_script),
        };

        let announcement = match (get("RELAY_ANNOUNCE_TO"), get("RELAY_ANNOUNCE_TEXT")) {
            (Some(recipient), Some(text)) => {
                let (hour, minute) = match get("RELAY_ANNOUNCE_AT") {
                    Some(raw) => parse_time_of_day(&raw)?,
                    None => (11, 0),
                };
                Some(AnnouncementConfig {
                    recipient,
                    text,
                    hour,
                    minute,
                })
            }
            _ => None,
        };

        let scheduler_tick = match get("RELAY_SCHEDULER_TICK_SECS") {
            Some(raw) => {
                let secs: u64 = parse_num(&raw, "RELAY_SCHEDULER_TICK_SECS")?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "RELAY_SCHEDULER_TICK_SECS".to_string(),
                        message: "must be at least 1".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(1),
        };

        Ok(Self {
            whatsapp,
            server,
            launch,
            announcement,
            scheduler_tick,
        })
    }
}

fn parse_num<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{raw}' is not a valid number"),
    })
}

/// Parse `HH:MM` (24h) into hour and minute.
pub fn parse_time_of_day(raw: &str) -> Result<(u32, u32), ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: "RELAY_ANNOUNCE_AT".to_string(),
        message: format!("'{raw}' is not a HH:MM time"),
    };

    let (h, m) = raw.trim().split_once(':').ok_or_else(invalid)?;
    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok((hour, minute))
}
