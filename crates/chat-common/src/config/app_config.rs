//! Client configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use chat_core::Intents;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::str::FromStr;

/// Main client configuration
#[derive(Clone, Deserialize)]
pub struct ClientConfig {
    pub app: AppSettings,
    /// Bot token, sent as `Bot <token>` and inside Identify/Resume
    pub token: String,
    pub intents: Intents,
    pub rest: RestConfig,
    pub gateway: GatewayConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// REST client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RestConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Transport failures tolerated per request before it is failed
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// Gateway session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_version")]
    pub version: u8,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_hello_timeout_secs")]
    pub hello_timeout_secs: u64,
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,
    #[serde(default = "default_backoff_floor_ms")]
    pub backoff_floor_ms: u64,
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
    #[serde(default = "default_backoff_reset_secs")]
    pub backoff_reset_secs: u64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: default_gateway_version(),
            connect_timeout_secs: default_connect_timeout_secs(),
            hello_timeout_secs: default_hello_timeout_secs(),
            close_timeout_ms: default_close_timeout_ms(),
            backoff_floor_ms: default_backoff_floor_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            backoff_reset_secs: default_backoff_reset_secs(),
        }
    }
}

// The token must never reach a log line
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("app", &self.app)
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("rest", &self.rest)
            .field("gateway", &self.gateway)
            .finish()
    }
}

// Default value functions
fn default_app_name() -> String {
    "chat-client".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_api_base_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_user_agent() -> String {
    format!(
        "DiscordBot (chat-client, {})",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

fn default_gateway_version() -> u8 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_hello_timeout_secs() -> u64 {
    30
}

fn default_close_timeout_ms() -> u64 {
    1000
}

fn default_backoff_floor_ms() -> u64 {
    1000
}

fn default_backoff_cap_ms() -> u64 {
    300_000 // 5 minutes
}

fn default_backoff_reset_secs() -> u64 {
    60
}

/// Read an optional variable, failing only when it is set but unparsable
fn parse_var<T: FromStr>(
    name: &'static str,
    default: impl FnOnce() -> T,
) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        Err(_) => Ok(default()),
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `BOT_TOKEN` is missing or any set variable fails to parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let token = env::var("BOT_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingVar("BOT_TOKEN"))?;

        let intents = match env::var("GATEWAY_INTENTS") {
            Ok(raw) => Intents::parse(&raw)
                .map_err(|_| ConfigError::InvalidValue("GATEWAY_INTENTS", raw))?,
            Err(_) => Intents::default(),
        };

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: env::var("APP_ENV")
                    .ok()
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            token,
            intents,
            rest: RestConfig {
                api_base_url: env::var("API_BASE_URL")
                    .map(|s| s.trim_end_matches('/').to_string())
                    .unwrap_or_else(|_| default_api_base_url()),
                user_agent: env::var("USER_AGENT").unwrap_or_else(|_| default_user_agent()),
                request_timeout_secs: parse_var(
                    "REST_REQUEST_TIMEOUT_SECS",
                    default_request_timeout_secs,
                )?,
                max_retries: parse_var("REST_MAX_RETRIES", default_max_retries)?,
                retry_base_delay_ms: parse_var(
                    "REST_RETRY_BASE_DELAY_MS",
                    default_retry_base_delay_ms,
                )?,
                retry_max_delay_ms: parse_var(
                    "REST_RETRY_MAX_DELAY_MS",
                    default_retry_max_delay_ms,
                )?,
            },
            gateway: GatewayConfig {
                version: parse_var("GATEWAY_VERSION", default_gateway_version)?,
                connect_timeout_secs: parse_var(
                    "GATEWAY_CONNECT_TIMEOUT_SECS",
                    default_connect_timeout_secs,
                )?,
                hello_timeout_secs: parse_var(
                    "GATEWAY_HELLO_TIMEOUT_SECS",
                    default_hello_timeout_secs,
                )?,
                close_timeout_ms: parse_var("GATEWAY_CLOSE_TIMEOUT_MS", default_close_timeout_ms)?,
                backoff_floor_ms: parse_var("GATEWAY_BACKOFF_FLOOR_MS", default_backoff_floor_ms)?,
                backoff_cap_ms: parse_var("GATEWAY_BACKOFF_CAP_MS", default_backoff_cap_ms)?,
                backoff_reset_secs: parse_var(
                    "GATEWAY_BACKOFF_RESET_SECS",
                    default_backoff_reset_secs,
                )?,
            },
        })
    }

    /// Build a configuration with defaults for everything but the token
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            app: AppSettings {
                name: default_app_name(),
                env: default_env(),
            },
            token: token.into(),
            intents: Intents::default(),
            rest: RestConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
