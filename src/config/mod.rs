use std::env;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Default sender identity used in production mode when none is configured.
pub const DEFAULT_FROM_ADDRESS: &str = "Portfolio Contact <no-reply@portfolio.example>";

/// Default provider endpoint for the Resend HTTP API.
pub const DEFAULT_RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Default local-development origin allowed by CORS.
pub const DEFAULT_DEV_ORIGIN: &str = "http://localhost:3000";

/// Runtime mode switching sender/recipient behavior on the dispatch path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Sender and recipient are forced to the provider's verified sandbox
    /// identities and the subject is prefixed `[TEST]`.
    Development,
    /// Sender is the configured public identity, recipient the configured
    /// destination mailbox.
    Production,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Mode::Development),
            "production" | "prod" => Ok(Mode::Production),
            other => Err(anyhow!(
                "'{}' is not a valid mode (expected 'development' or 'production')",
                other
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Development => write!(f, "development"),
            Mode::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The public site origin allowed to call the endpoint cross-origin
    pub site_origin: String,

    /// The local-development origin also allowed by CORS
    pub dev_origin: String,

    /// The provider API key; absence keeps the service running in a
    /// degraded "not initialized" state rather than aborting startup
    pub resend_api_key: Option<String>,

    /// The destination mailbox for contact submissions
    pub recipient_email: Option<String>,

    /// The sender identity used in production mode
    pub from_address: String,

    /// The provider endpoint to POST outgoing email to
    pub resend_api_url: String,

    /// The address to bind the HTTP server to
    pub bind_address: String,

    /// The port to bind the HTTP server to
    pub port: u16,

    /// Development or production behavior on the dispatch path
    pub mode: Mode,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (optional)
        let _ = dotenv::dotenv();

        let site_origin = match env::var("CONTACT_RELAY_SITE_ORIGIN") {
            Ok(val) => val,
            Err(e) => {
                let err_msg = "CONTACT_RELAY_SITE_ORIGIN environment variable must be set";
                log::error!("{}: {}", err_msg, e);
                return Err(anyhow!(e).context(err_msg));
            }
        };
        log::info!("Config: Using site_origin: {}", site_origin);

        let dev_origin = env::var("CONTACT_RELAY_DEV_ORIGIN")
            .map(|val| {
                log::info!("Config: Using dev_origin from env: {}", val);
                val
            })
            .unwrap_or_else(|_| {
                log::info!("Config: Using default dev_origin: {}", DEFAULT_DEV_ORIGIN);
                DEFAULT_DEV_ORIGIN.to_string()
            });

        // The key itself is never logged, only its presence.
        let resend_api_key = env::var("CONTACT_RELAY_RESEND_API_KEY").ok();
        match &resend_api_key {
            Some(_) => log::info!("Config: Resend API key is set"),
            None => log::warn!(
                "Config: CONTACT_RELAY_RESEND_API_KEY is not set; email dispatch will be unavailable"
            ),
        }

        let recipient_email = env::var("CONTACT_RELAY_RECIPIENT_EMAIL").ok();
        match &recipient_email {
            Some(val) => log::info!("Config: Using recipient_email: {}", val),
            None => log::warn!(
                "Config: CONTACT_RELAY_RECIPIENT_EMAIL is not set; dispatch requests will fail"
            ),
        }

        let from_address = env::var("CONTACT_RELAY_FROM_ADDRESS")
            .map(|val| {
                log::info!("Config: Using from_address from env: {}", val);
                val
            })
            .unwrap_or_else(|_| {
                log::info!(
                    "Config: Using default from_address: {}",
                    DEFAULT_FROM_ADDRESS
                );
                DEFAULT_FROM_ADDRESS.to_string()
            });

        let resend_api_url = env::var("CONTACT_RELAY_RESEND_API_URL")
            .map(|val| {
                log::info!("Config: Using resend_api_url from env: {}", val);
                val
            })
            .unwrap_or_else(|_| {
                log::info!(
                    "Config: Using default resend_api_url: {}",
                    DEFAULT_RESEND_API_URL
                );
                DEFAULT_RESEND_API_URL.to_string()
            });

        let bind_address = env::var("CONTACT_RELAY_BIND_ADDRESS")
            .map(|val| {
                log::info!("Config: Using bind_address from env: {}", val);
                val
            })
            .unwrap_or_else(|_| {
                let default_val = "0.0.0.0".to_string();
                log::info!("Config: Using default bind_address: {}", default_val);
                default_val
            });

        let port_str = env::var("CONTACT_RELAY_PORT").unwrap_or_else(|_| "8080".to_string());
        let port = match port_str.parse::<u16>() {
            Ok(port) => port,
            Err(e) => {
                let err_msg = format!(
                    "CONTACT_RELAY_PORT ('{}') must be a valid port number",
                    port_str
                );
                log::error!("{}: {}", err_msg, e);
                return Err(anyhow!(e).context(err_msg));
            }
        };
        log::info!("Config: Using port: {}", port);

        let mode_str = env::var("CONTACT_RELAY_MODE").unwrap_or_else(|_| "production".to_string());
        let mode = match mode_str.parse::<Mode>() {
            Ok(mode) => mode,
            Err(e) => {
                let err_msg = format!("CONTACT_RELAY_MODE ('{}') is not valid", mode_str);
                log::error!("{}: {}", err_msg, e);
                return Err(e.context(err_msg));
            }
        };
        log::info!("Config: Using mode: {}", mode);

        Ok(Config {
            site_origin,
            dev_origin,
            resend_api_key,
            recipient_email,
            from_address,
            resend_api_url,
            bind_address,
            port,
            mode,
        })
    }
}
