//! Gateway session entities
//!
//! The handful of payload shapes the session engine itself reads: the
//! endpoint discovery response and the session-ready event.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::User;
use crate::value_objects::Snowflake;

/// Response of the gateway endpoint discovery route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayBotInfo {
    /// WebSocket URL to connect to
    pub url: String,
    /// Recommended shard count
    #[serde(default = "default_shards")]
    pub shards: u32,
    #[serde(default)]
    pub session_start_limit: SessionStartLimit,
}

/// Identify quota attached to the discovery response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    /// Milliseconds until `remaining` resets
    pub reset_after: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,
}

impl SessionStartLimit {
    /// Time until the identify quota resets
    #[must_use]
    pub fn reset_after(&self) -> Duration {
        Duration::from_millis(self.reset_after)
    }

    /// Whether a fresh Identify would be refused
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

impl Default for SessionStartLimit {
    fn default() -> Self {
        Self {
            total: 1000,
            remaining: 1000,
            reset_after: 0,
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_shards() -> u32 {
    1
}

fn default_max_concurrency() -> u32 {
    1
}

/// READY dispatch payload
///
/// Only `session_id` is required; everything else is informational.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyEvent {
    /// Gateway protocol version
    #[serde(default)]
    pub v: Option<u8>,

    /// Current user
    #[serde(default)]
    pub user: Option<User>,

    /// Guilds the user is in (initially unavailable)
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,

    /// Session ID for resuming
    pub session_id: String,

    /// Gateway URL to use when resuming this session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_gateway_url: Option<String>,
}

/// Unavailable guild in READY event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}
