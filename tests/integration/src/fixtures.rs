//! Payloads and handlers shared by the integration tests

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chat_gateway::connection::BackoffConfig;
use chat_gateway::{handler_fn, EventHandler, GatewayMessage, GatewayOptions};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::helpers::WAIT;

/// Options with short timeouts and a fast backoff
pub fn test_options() -> GatewayOptions {
    GatewayOptions {
        connect_timeout: Duration::from_secs(2),
        hello_timeout: Duration::from_secs(2),
        close_timeout: Duration::from_secs(1),
        backoff: BackoffConfig {
            floor: Duration::from_millis(10),
            cap: Duration::from_millis(50),
            reset_after: Duration::from_secs(60),
        },
        ..GatewayOptions::default()
    }
}

pub fn ready(seq: u64, session_id: &str, resume_url: Option<&str>) -> GatewayMessage {
    GatewayMessage::dispatch(
        "READY",
        seq,
        json!({
            "v": 10,
            "user": {"id": "80351110224678912", "username": "testbot", "bot": true},
            "guilds": [{"id": "41771983423143937", "unavailable": true}],
            "session_id": session_id,
            "resume_gateway_url": resume_url,
        }),
    )
}

pub fn message_create(seq: u64, content: &str) -> GatewayMessage {
    GatewayMessage::dispatch(
        "MESSAGE_CREATE",
        seq,
        json!({
            "id": "1100000000000000001",
            "channel_id": "1000000000000000001",
            "author": {"id": "2000000000000000001", "username": "alice"},
            "content": content,
            "timestamp": "2024-05-01T12:00:00+00:00",
        }),
    )
}

/// Receives the events a recording handler saw
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<(String, Value)>,
}

impl EventStream {
    /// Wait for the next event with this name, skipping others
    pub async fn next_named(&mut self, name: &str) -> Result<Value> {
        loop {
            let (event, data) = timeout(WAIT, self.rx.recv())
                .await
                .with_context(|| format!("no {name} event arrived"))?
                .context("handler dropped")?;
            if event == name {
                return Ok(data);
            }
        }
    }
}

/// Handler that forwards every dispatch to an [`EventStream`]
pub fn recorder() -> (Arc<dyn EventHandler>, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler = handler_fn(move |event, data| {
        let _ = tx.send((event.to_string(), data.clone()));
    });
    (Arc::new(handler), EventStream { rx })
}
